//! Declarative descriptors: the metadata a `#[module]`/`#[controller]`/
//! `#[handler]`-decorated item (or its hand-built equivalent) produces,
//! consumed by the graph builder, the handler registry and the manifest
//! extractor (spec.md §3, §4.B, §4.E, §6).
//!
//! Shaped like the builder-style descriptors found elsewhere in the
//! example corpus: identity carried as a `TypeId`-backed `ClassId`,
//! fields populated through chained `with_*`/`add_*` methods rather than
//! struct-literal construction, so generated macro code reads as a
//! sequence of statements instead of one large literal.

use std::collections::HashMap;
use std::sync::Arc;

pub use serde_json::Value;

use crate::context::HandlerContext;
use crate::error::HttpException;
use crate::pipeline::{BoxFuture, LayerRef};
use crate::provider::{ConstructFn, Instance, Provider};
use crate::token::{ClassId, InjectionToken};
use crate::validation::RequestSchema;

/// Invokes a single controller method or function handler. `owner` is the
/// resolved controller instance (an inert placeholder for a function
/// handler, which has no owning class); `deps` are the handler's own
/// resolved `inject` list, already in declaration order (empty for
/// controller methods, whose dependencies are baked into `owner` at
/// construction time). Returns the raw value the dispatcher normalises
/// into a response (spec.md §4.G).
pub type HandlerInvokeFn = Arc<
    dyn Fn(Instance, Vec<Instance>, HandlerContext) -> BoxFuture<'static, Result<Value, HttpException>>
        + Send
        + Sync,
>;

/// Marker for types the container is allowed to construct implicitly when
/// resolving a class provider with declared dependencies (spec.md §4.D).
/// Types without this marker still work as providers when registered
/// explicitly with a zero-dependency constructor or as factory/value
/// providers; only multi-dependency implicit construction is gated.
pub trait Injectable: Send + Sync + 'static {}

fn empty_metadata() -> Arc<HashMap<String, Value>> {
    Arc::new(HashMap::new())
}

/// HTTP verb a controller method answers to. Kept distinct from `http::Method`
/// because route declarations are data, not an active request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpVerb {
    pub fn as_method(self) -> http::Method {
        match self {
            HttpVerb::Get => http::Method::GET,
            HttpVerb::Post => http::Method::POST,
            HttpVerb::Put => http::Method::PUT,
            HttpVerb::Patch => http::Method::PATCH,
            HttpVerb::Delete => http::Method::DELETE,
            HttpVerb::Head => http::Method::HEAD,
            HttpVerb::Options => http::Method::OPTIONS,
        }
    }
}

/// Where a single positional controller-method argument is extracted from
/// (spec.md §3 "Controller" per-method parameter-extraction descriptors,
/// §4.G step 3). A `key` of `None` extracts the whole body/query/params/
/// headers bag; `Some(name)` extracts one named field of it. Body/query/
/// params/headers descriptors may carry a validation schema, which the
/// handler registry inspects to decide whether a `ValidationLayer` needs
/// to be prepended (spec.md §4.E operation 4); the remaining sources are
/// always read straight off the request and are never subject to
/// validation.
#[derive(Clone)]
pub enum ParamSource {
    Body {
        key: Option<String>,
        schema: Option<Arc<dyn RequestSchema>>,
    },
    Query {
        key: Option<String>,
        schema: Option<Arc<dyn RequestSchema>>,
    },
    Params {
        key: Option<String>,
        schema: Option<Arc<dyn RequestSchema>>,
    },
    Headers {
        key: Option<String>,
        schema: Option<Arc<dyn RequestSchema>>,
    },
    /// The request's auth map, read directly -- never validated.
    Auth,
    /// The request id, read directly -- never validated.
    RequestId,
    /// The request's cookie map, read directly -- never validated.
    Cookies,
    /// The whole neutral request, read directly -- never validated.
    Request,
}

impl ParamSource {
    pub fn body(key: Option<&str>) -> Self {
        ParamSource::Body {
            key: key.map(str::to_string),
            schema: None,
        }
    }
    pub fn body_validated(key: Option<&str>, schema: Arc<dyn RequestSchema>) -> Self {
        ParamSource::Body {
            key: key.map(str::to_string),
            schema: Some(schema),
        }
    }
    pub fn query(key: Option<&str>) -> Self {
        ParamSource::Query {
            key: key.map(str::to_string),
            schema: None,
        }
    }
    pub fn query_validated(key: Option<&str>, schema: Arc<dyn RequestSchema>) -> Self {
        ParamSource::Query {
            key: key.map(str::to_string),
            schema: Some(schema),
        }
    }
    pub fn params(key: Option<&str>) -> Self {
        ParamSource::Params {
            key: key.map(str::to_string),
            schema: None,
        }
    }
    pub fn params_validated(key: Option<&str>, schema: Arc<dyn RequestSchema>) -> Self {
        ParamSource::Params {
            key: key.map(str::to_string),
            schema: Some(schema),
        }
    }
    pub fn headers(key: Option<&str>) -> Self {
        ParamSource::Headers {
            key: key.map(str::to_string),
            schema: None,
        }
    }
    pub fn headers_validated(key: Option<&str>, schema: Arc<dyn RequestSchema>) -> Self {
        ParamSource::Headers {
            key: key.map(str::to_string),
            schema: Some(schema),
        }
    }

    /// The schema carried by this descriptor, if any (spec.md §4.E op 4).
    pub fn schema(&self) -> Option<&Arc<dyn RequestSchema>> {
        match self {
            ParamSource::Body { schema, .. }
            | ParamSource::Query { schema, .. }
            | ParamSource::Params { schema, .. }
            | ParamSource::Headers { schema, .. } => schema.as_ref(),
            ParamSource::Auth | ParamSource::RequestId | ParamSource::Cookies | ParamSource::Request => None,
        }
    }
}

/// One route on a controller: method + path fragment, joined with the
/// controller's prefix at registry-flattening time (spec.md §4.E).
#[derive(Clone)]
pub struct ControllerMethodSpec {
    pub method_name: String,
    pub verb: HttpVerb,
    pub path: String,
    pub protected_by: Vec<InjectionToken>,
    pub layers: Vec<LayerRef>,
    pub custom_metadata: Arc<HashMap<String, Value>>,
    pub public: bool,
    pub invoke: HandlerInvokeFn,
    /// Positional parameter-extraction descriptors, consumed by the
    /// dispatcher's controller argument-assembly algorithm (spec.md §4.G
    /// step 3).
    pub param_descriptors: Vec<ParamSource>,
}

impl ControllerMethodSpec {
    pub fn new(method_name: impl Into<String>, verb: HttpVerb, path: impl Into<String>, invoke: HandlerInvokeFn) -> Self {
        Self {
            method_name: method_name.into(),
            verb,
            path: path.into(),
            protected_by: Vec::new(),
            layers: Vec::new(),
            custom_metadata: empty_metadata(),
            public: false,
            invoke,
            param_descriptors: Vec::new(),
        }
    }

    pub fn guarded_by(mut self, token: InjectionToken) -> Self {
        self.protected_by.push(token);
        self
    }

    pub fn with_layer(mut self, layer: LayerRef) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.custom_metadata = Arc::new(metadata);
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn with_param(mut self, source: ParamSource) -> Self {
        self.param_descriptors.push(source);
        self
    }
}

/// A class-shaped handler grouping: an injectable controller class plus
/// the methods it exposes as routes (spec.md §3 "Controller").
#[derive(Clone)]
pub struct ControllerDescriptor {
    pub class: ClassId,
    pub prefix: String,
    pub deps: Vec<InjectionToken>,
    pub injectable: bool,
    pub construct: ConstructFn,
    pub methods: Vec<ControllerMethodSpec>,
    pub protected_by: Vec<InjectionToken>,
    pub layers: Vec<LayerRef>,
    pub custom_metadata: Arc<HashMap<String, Value>>,
}

impl ControllerDescriptor {
    pub fn new<T: 'static>(
        prefix: impl Into<String>,
        deps: Vec<InjectionToken>,
        injectable: bool,
        construct: ConstructFn,
    ) -> Self {
        Self {
            class: ClassId::of::<T>(),
            prefix: prefix.into(),
            deps,
            injectable,
            construct,
            methods: Vec::new(),
            protected_by: Vec::new(),
            layers: Vec::new(),
            custom_metadata: empty_metadata(),
        }
    }

    pub fn add_method(mut self, method: ControllerMethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn guarded_by(mut self, token: InjectionToken) -> Self {
        self.protected_by.push(token);
        self
    }

    pub fn with_layer(mut self, layer: LayerRef) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.custom_metadata = Arc::new(metadata);
        self
    }

    /// Token this controller is constructed and resolved under in the
    /// container -- its own class identity.
    pub fn token(&self) -> InjectionToken {
        InjectionToken::Class(self.class)
    }
}

/// A standalone function handler, registered directly under a route
/// without an owning controller class (spec.md §3 "Function handler").
#[derive(Clone)]
pub struct FunctionHandlerDescriptor {
    pub id: String,
    pub verb: HttpVerb,
    pub path: String,
    pub inject: Vec<InjectionToken>,
    pub protected_by: Vec<InjectionToken>,
    pub layers: Vec<LayerRef>,
    pub custom_metadata: Arc<HashMap<String, Value>>,
    pub public: bool,
    pub invoke: HandlerInvokeFn,
    /// Per-location validation schemas (spec.md §3 "Function handler"
    /// `schema.{body,query,params,headers}`, §4.E operation 4).
    pub body_schema: Option<Arc<dyn RequestSchema>>,
    pub query_schema: Option<Arc<dyn RequestSchema>>,
    pub params_schema: Option<Arc<dyn RequestSchema>>,
    pub headers_schema: Option<Arc<dyn RequestSchema>>,
}

impl FunctionHandlerDescriptor {
    pub fn new(id: impl Into<String>, verb: HttpVerb, path: impl Into<String>, invoke: HandlerInvokeFn) -> Self {
        Self {
            id: id.into(),
            verb,
            path: path.into(),
            inject: Vec::new(),
            protected_by: Vec::new(),
            layers: Vec::new(),
            custom_metadata: empty_metadata(),
            public: false,
            invoke,
            body_schema: None,
            query_schema: None,
            params_schema: None,
            headers_schema: None,
        }
    }

    pub fn inject(mut self, token: InjectionToken) -> Self {
        self.inject.push(token);
        self
    }

    pub fn validate_body(mut self, schema: Arc<dyn RequestSchema>) -> Self {
        self.body_schema = Some(schema);
        self
    }

    pub fn validate_query(mut self, schema: Arc<dyn RequestSchema>) -> Self {
        self.query_schema = Some(schema);
        self
    }

    pub fn validate_params(mut self, schema: Arc<dyn RequestSchema>) -> Self {
        self.params_schema = Some(schema);
        self
    }

    pub fn validate_headers(mut self, schema: Arc<dyn RequestSchema>) -> Self {
        self.headers_schema = Some(schema);
        self
    }

    pub fn guarded_by(mut self, token: InjectionToken) -> Self {
        self.protected_by.push(token);
        self
    }

    pub fn with_layer(mut self, layer: LayerRef) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.custom_metadata = Arc::new(metadata);
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }
}

/// One `token -> provider` registration owned by a module (spec.md §4.A).
#[derive(Clone)]
pub struct ProviderRegistration {
    pub token: InjectionToken,
    pub provider: Provider,
}

impl ProviderRegistration {
    pub fn new(token: InjectionToken, provider: Provider) -> Self {
        Self { token, provider }
    }
}

/// A module: the unit the graph builder/validator walk (spec.md §3
/// "Module", §4.B, §4.C). `imports` names sibling modules by their
/// `name` rather than by dynamic reference -- see DESIGN.md for why tier
/// 2 of the handler resolver is dropped for the same reason.
#[derive(Clone)]
pub struct ModuleDescriptor {
    pub name: String,
    pub imports: Vec<String>,
    pub providers: Vec<ProviderRegistration>,
    pub controllers: Vec<ControllerDescriptor>,
    pub function_handlers: Vec<FunctionHandlerDescriptor>,
    pub exports: Vec<InjectionToken>,
    pub layers: Vec<LayerRef>,
    pub custom_metadata: Arc<HashMap<String, Value>>,
    /// Project-root-relative source file for this module's declaration,
    /// used by the manifest extractor to derive `sourceFile`/`codeLocation`
    /// (spec.md §6). `None` when a module was built up by hand rather than
    /// through `#[module(...)]` over a file with a stable path.
    pub source_file: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            imports: Vec::new(),
            providers: Vec::new(),
            controllers: Vec::new(),
            function_handlers: Vec::new(),
            exports: Vec::new(),
            layers: Vec::new(),
            custom_metadata: empty_metadata(),
            source_file: None,
        }
    }

    pub fn with_source_file(mut self, path: impl Into<String>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    pub fn import(mut self, module_name: impl Into<String>) -> Self {
        self.imports.push(module_name.into());
        self
    }

    pub fn provide(mut self, token: InjectionToken, provider: Provider) -> Self {
        self.providers.push(ProviderRegistration::new(token, provider));
        self
    }

    pub fn controller(mut self, controller: ControllerDescriptor) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn function_handler(mut self, handler: FunctionHandlerDescriptor) -> Self {
        self.function_handlers.push(handler);
        self
    }

    pub fn export(mut self, token: InjectionToken) -> Self {
        self.exports.push(token);
        self
    }

    pub fn with_layer(mut self, layer: LayerRef) -> Self {
        self.layers.push(layer);
        self
    }

    /// Every token this module provides directly, including controllers
    /// (each resolvable under its own class token) but not imports.
    pub fn owned_tokens(&self) -> Vec<InjectionToken> {
        let mut tokens: Vec<InjectionToken> = self.providers.iter().map(|p| p.token.clone()).collect();
        tokens.extend(self.controllers.iter().map(|c| c.token()));
        tokens
    }
}
