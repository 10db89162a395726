//! Proc-macro sugar over celerity-core's hand-constructible builder APIs
//! (`ModuleDescriptor`, `ControllerDescriptor`, `FunctionHandlerDescriptor`).
//! None of these macros are load-bearing: everything they generate could
//! be written by hand against the builders in `celerity_core::contracts`.
//! They exist to spare the declarative boilerplate the same way the
//! source framework's decorators do.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{
    parse_macro_input, Attribute, Expr, ExprLit, ImplItem, ItemFn, ItemImpl, ItemStruct, Lit, Meta, Token,
};

/// `name = "..."` style attribute argument list, shared by `#[module(...)]`
/// and `#[controller(...)]`.
struct AttrArgs {
    metas: Punctuated<Meta, Token![,]>,
}

impl Parse for AttrArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        Ok(AttrArgs {
            metas: Punctuated::parse_terminated(input)?,
        })
    }
}

fn string_value(meta: &Meta, attr_name: &str) -> syn::Result<String> {
    match meta {
        Meta::NameValue(nv) => match &nv.value {
            Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) => Ok(s.value()),
            other => Err(syn::Error::new_spanned(other, format!("`{attr_name}` expects a string literal"))),
        },
        other => Err(syn::Error::new_spanned(other, format!("expected `{attr_name} = \"...\"`"))),
    }
}

/// `#[injectable]`: marks a type as eligible for implicit construction
/// by the container when it appears as a multi-dependency class provider
/// (spec.md §4.D). Expands to nothing but a marker trait impl.
#[proc_macro_attribute]
pub fn injectable(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let expanded = quote! {
        #input

        impl #impl_generics ::celerity_core::contracts::Injectable for #ident #ty_generics #where_clause {}
    };
    expanded.into()
}

/// `#[module(name = "widgets")]` on a zero-argument function returning a
/// `ModuleDescriptor`. Registers the function with `inventory` so it is
/// picked up by whole-application discovery without being named anywhere
/// else, mirroring the registrator pattern the host framework's own
/// `#[module(...)]` macro generates.
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttrArgs);
    let input_fn = parse_macro_input!(item as ItemFn);

    let mut name: Option<String> = None;
    for meta in &args.metas {
        if meta.path().is_ident("name") {
            match string_value(meta, "name") {
                Ok(v) => name = Some(v),
                Err(e) => return e.to_compile_error().into(),
            }
        }
    }
    if name.is_none() {
        return syn::Error::new_spanned(&input_fn.sig.ident, "#[module(...)] requires `name = \"...\"`")
            .to_compile_error()
            .into();
    }

    let fn_name = &input_fn.sig.ident;
    let registrator_name = format_ident!("__celerity_register_module_{}", fn_name);

    let expanded = quote! {
        #input_fn

        #[allow(non_snake_case)]
        fn #registrator_name() -> ::celerity_core::ModuleDescriptor {
            #fn_name().with_source_file(::std::file!())
        }

        ::celerity_core::inventory::submit! {
            ::celerity_core::bootstrap::ModuleRegistration(#registrator_name)
        }
    };
    expanded.into()
}

struct RouteAttr {
    verb: &'static str,
    path: String,
}

fn extract_route(attrs: &[Attribute]) -> syn::Result<Option<RouteAttr>> {
    for attr in attrs {
        let verb = if attr.path().is_ident("get") {
            "Get"
        } else if attr.path().is_ident("post") {
            "Post"
        } else if attr.path().is_ident("put") {
            "Put"
        } else if attr.path().is_ident("patch") {
            "Patch"
        } else if attr.path().is_ident("delete") {
            "Delete"
        } else {
            continue;
        };
        let path: syn::LitStr = attr.parse_args()?;
        return Ok(Some(RouteAttr { verb, path: path.value() }));
    }
    Ok(None)
}

fn is_celerity_method_attr(attr: &Attribute) -> bool {
    for ident in ["get", "post", "put", "patch", "delete", "guard", "meta", "public"] {
        if attr.path().is_ident(ident) {
            return true;
        }
    }
    false
}

fn extract_guards(attrs: &[Attribute]) -> syn::Result<Vec<syn::Path>> {
    let mut guards = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("guard") {
            let path: syn::Path = attr.parse_args()?;
            guards.push(path);
        }
    }
    Ok(guards)
}

fn has_public(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|a| a.path().is_ident("public"))
}

fn extract_meta(attrs: &[Attribute]) -> syn::Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("meta") {
            let args: AttrArgs = attr.parse_args()?;
            for meta in &args.metas {
                let key = meta
                    .path()
                    .get_ident()
                    .map(|i| i.to_string())
                    .ok_or_else(|| syn::Error::new_spanned(meta, "expected `key = \"value\"`"))?;
                let value = string_value(meta, &key)?;
                out.push((key, value));
            }
        }
    }
    Ok(out)
}

fn meta_tokens(entries: &[(String, String)]) -> TokenStream2 {
    let inserts = entries.iter().map(|(k, v)| {
        quote! { __meta.insert(#k.to_string(), ::celerity_core::contracts::Value::String(#v.to_string())); }
    });
    quote! {
        {
            #[allow(unused_mut)]
            let mut __meta = ::std::collections::HashMap::new();
            #(#inserts)*
            __meta
        }
    }
}

/// `#[controller(prefix = "/widgets")]` on an `impl SomeType { ... }`
/// block. Each method carrying `#[get("...")]`/`#[post("...")]`/etc is
/// lifted into a `ControllerMethodSpec`; `#[guard(Token)]`, `#[meta(k =
/// "v")]` and `#[public]` refine it the same way the chained builder
/// methods would. Generates `SomeType::celerity_descriptor(deps,
/// injectable, construct)` alongside the original, untouched impl block.
#[proc_macro_attribute]
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttrArgs);
    let input = parse_macro_input!(item as ItemImpl);

    let mut prefix: Option<String> = None;
    for meta in &args.metas {
        if meta.path().is_ident("prefix") {
            match string_value(meta, "prefix") {
                Ok(v) => prefix = Some(v),
                Err(e) => return e.to_compile_error().into(),
            }
        }
    }
    let prefix = prefix.unwrap_or_default();

    let self_ty = input.self_ty.clone();

    let mut method_specs = Vec::new();
    let mut cleaned_items = Vec::new();

    for item in &input.items {
        if let ImplItem::Fn(method) = item {
            match extract_route(&method.attrs) {
                Ok(Some(route)) => {
                    let guards = match extract_guards(&method.attrs) {
                        Ok(g) => g,
                        Err(e) => return e.to_compile_error().into(),
                    };
                    let meta_entries = match extract_meta(&method.attrs) {
                        Ok(m) => m,
                        Err(e) => return e.to_compile_error().into(),
                    };
                    let public = has_public(&method.attrs);
                    let verb_ident = format_ident!("{}", route.verb);
                    let path = &route.path;
                    let method_name = method.sig.ident.to_string();
                    let method_ident = &method.sig.ident;
                    let meta_tokens = meta_tokens(&meta_entries);
                    let guard_tokens = guards.iter().map(|g| {
                        quote! { .guarded_by(::celerity_core::InjectionToken::of::<#g>()) }
                    });
                    let public_token = if public { quote! { .public() } } else { quote! {} };

                    method_specs.push(quote! {
                        ::celerity_core::ControllerMethodSpec::new(
                            #method_name,
                            ::celerity_core::HttpVerb::#verb_ident,
                            #path,
                            ::std::sync::Arc::new(move |__owner: ::celerity_core::provider::Instance, _deps, __ctx: ::celerity_core::HandlerContext| {
                                Box::pin(async move {
                                    let __instance = __owner
                                        .downcast::<#self_ty>()
                                        .map_err(|_| ::celerity_core::HttpException::internal_server_error("controller instance downcast failed"))?;
                                    #self_ty::#method_ident(&__instance, __ctx).await
                                })
                            }),
                        )
                        #(#guard_tokens)*
                        #public_token
                        .with_metadata(#meta_tokens)
                    });

                    let mut kept = method.clone();
                    kept.attrs.retain(|a| !is_celerity_method_attr(a));
                    cleaned_items.push(ImplItem::Fn(kept));
                    continue;
                }
                Ok(None) => {}
                Err(e) => return e.to_compile_error().into(),
            }
        }
        cleaned_items.push(item.clone());
    }

    let mut cleaned_impl = input.clone();
    cleaned_impl.items = cleaned_items;

    let expanded = quote! {
        #cleaned_impl

        impl #self_ty {
            pub fn celerity_descriptor(
                deps: ::std::vec::Vec<::celerity_core::InjectionToken>,
                injectable: bool,
                construct: ::celerity_core::provider::ConstructFn,
            ) -> ::celerity_core::ControllerDescriptor {
                ::celerity_core::ControllerDescriptor::new::<#self_ty>(#prefix, deps, injectable, construct)
                    #(.add_method(#method_specs))*
            }
        }
    };
    expanded.into()
}

/// `#[handler(id = "ping", verb = "GET", path = "/ping")]` on a free async
/// function `async fn(ctx: HandlerContext, dep: &Dep, ...) -> Result<Value,
/// HttpException>`. The context is always the first parameter; any
/// trailing parameters are the handler's resolved `inject` list, in
/// declaration order, each written as a reference to its concrete type
/// (spec.md: resolved dependency tokens are passed "as extra trailing
/// arguments after request and context"). Generates a sibling function
/// building the matching `FunctionHandlerDescriptor`; the caller still
/// chains `.inject(InjectionToken::of::<Dep>())` once per trailing
/// parameter, in the same order, so the container knows what to resolve.
#[proc_macro_attribute]
pub fn handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttrArgs);
    let input_fn = parse_macro_input!(item as ItemFn);

    let mut id: Option<String> = None;
    let mut verb: Option<String> = None;
    let mut path: Option<String> = None;
    for meta in &args.metas {
        if meta.path().is_ident("id") {
            match string_value(meta, "id") {
                Ok(v) => id = Some(v),
                Err(e) => return e.to_compile_error().into(),
            }
        } else if meta.path().is_ident("verb") {
            match string_value(meta, "verb") {
                Ok(v) => verb = Some(v),
                Err(e) => return e.to_compile_error().into(),
            }
        } else if meta.path().is_ident("path") {
            match string_value(meta, "path") {
                Ok(v) => path = Some(v),
                Err(e) => return e.to_compile_error().into(),
            }
        }
    }

    let (id, verb, path) = match (id, verb, path) {
        (Some(i), Some(v), Some(p)) => (i, v, p),
        _ => {
            return syn::Error::new_spanned(
                &input_fn.sig.ident,
                "#[handler(...)] requires `id`, `verb` and `path`",
            )
            .to_compile_error()
            .into();
        }
    };
    let verb_ident = format_ident!("{}", verb);
    let fn_name = &input_fn.sig.ident;

    // At least the context parameter is required; trailing parameters are
    // the handler's resolved dependencies, threaded through by position.
    if input_fn.sig.inputs.is_empty() {
        return syn::Error::new_spanned(
            &input_fn.sig,
            "#[handler(...)] functions take an `HandlerContext` parameter followed by zero or more dependency parameters",
        )
        .to_compile_error()
        .into();
    }

    let mut dep_types = Vec::new();
    for arg in input_fn.sig.inputs.iter().skip(1) {
        let pat_type = match arg {
            syn::FnArg::Typed(pat_type) => pat_type,
            syn::FnArg::Receiver(_) => {
                return syn::Error::new_spanned(arg, "#[handler(...)] functions may not take `self`")
                    .to_compile_error()
                    .into();
            }
        };
        let ty = match &*pat_type.ty {
            syn::Type::Reference(reference) => (*reference.elem).clone(),
            other => other.clone(),
        };
        dep_types.push(ty);
    }

    let dep_idents: Vec<_> = (0..dep_types.len()).map(|i| format_ident!("__dep_{}", i)).collect();
    let dep_downcasts = dep_types.iter().zip(dep_idents.iter()).enumerate().map(|(i, (ty, ident))| {
        quote! {
            let #ident = __deps[#i]
                .clone()
                .downcast::<#ty>()
                .map_err(|_| ::celerity_core::HttpException::internal_server_error("handler dependency downcast failed"))?;
        }
    });

    let descriptor_fn = format_ident!("{}_descriptor", fn_name);

    let expanded = quote! {
        #input_fn

        #[allow(non_snake_case)]
        pub fn #descriptor_fn() -> ::celerity_core::FunctionHandlerDescriptor {
            ::celerity_core::FunctionHandlerDescriptor::new(
                #id,
                ::celerity_core::HttpVerb::#verb_ident,
                #path,
                ::std::sync::Arc::new(move |_owner: ::celerity_core::provider::Instance, __deps: ::std::vec::Vec<::celerity_core::provider::Instance>, __ctx: ::celerity_core::HandlerContext| {
                    Box::pin(async move {
                        #(#dep_downcasts)*
                        #fn_name(__ctx, #(&#dep_idents),*).await
                    })
                }),
            )
        }
    };
    expanded.into()
}
