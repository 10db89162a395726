//! Manifest Extractor (spec.md §4.I): walks a module graph without
//! instantiating anything and produces a JSON-serialisable deployment
//! descriptor -- the static shape of the application, derived entirely
//! from declarative metadata (spec.md §6 "Core -> host (manifest)").

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::contracts::HttpVerb;
use crate::graph::ModuleGraph;
use crate::handler::join_paths;
use crate::token::InjectionToken;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// One entry in the manifest's flattened dependency graph: a token plus
/// its provider shape and its own (already-rendered) dependency tokens
/// (spec.md §6 `DependencyNode`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyNode {
    pub token: String,
    pub token_type: &'static str,
    pub provider_type: &'static str,
    pub dependencies: Vec<String>,
}

/// Every `celerity.*` annotation key this crate emits (spec.md §6). Kept
/// as named constants rather than inline literals so the extractor and a
/// host's manifest consumer can agree on spelling without copying strings
/// by hand.
pub mod annotation_keys {
    pub const HANDLER_HTTP: &str = "celerity.handler.http";
    pub const HTTP_METHOD: &str = "celerity.handler.http.method";
    pub const HTTP_PATH: &str = "celerity.handler.http.path";
    pub const GUARD_PROTECTED_BY: &str = "celerity.guard.protectedBy";
    pub const GUARD_CUSTOM: &str = "celerity.guard.custom";
    pub const PUBLIC: &str = "celerity.public";
    pub fn metadata(user_key: &str) -> String {
        format!("celerity.metadata.{user_key}")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerSpec {
    pub handler_name: String,
    pub code_location: Option<String>,
    pub handler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassHandlerEntry {
    pub resource_name: String,
    pub class_name: String,
    pub method_name: String,
    pub source_file: Option<String>,
    /// One of `http`/`websocket`/`consumer`/`schedule` (spec.md §6); this
    /// crate only produces `http` handlers, per spec.md §1's explicit
    /// `http`-only scope.
    pub handler_type: &'static str,
    pub annotations: HashMap<String, Value>,
    pub spec: HandlerSpec,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionHandlerEntry {
    pub resource_name: String,
    pub export_name: String,
    pub source_file: Option<String>,
    pub annotations: HashMap<String, Value>,
    pub spec: HandlerSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyGraph {
    pub nodes: Vec<DependencyNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub handlers: Vec<ClassHandlerEntry>,
    pub function_handlers: Vec<FunctionHandlerEntry>,
    pub dependency_graph: DependencyGraph,
}

/// `camel(className)_methodName` (spec.md §6 "derived resource name").
/// Class names here are Rust type identifiers, already `PascalCase`, so
/// "camel-casing" is just lower-casing the leading character.
fn camel_resource_name(class_name: &str, method_name: &str) -> String {
    let mut chars = class_name.chars();
    let camel_class = match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    format!("{camel_class}_{method_name}")
}

/// `./<directory containing source_file>`, or `None` when the module
/// carries no source file (spec.md §6 "derived code location").
fn code_location(source_file: &Option<String>) -> Option<String> {
    let path = source_file.as_ref()?;
    let dir = match path.rsplit_once('/') {
        Some((dir, _file)) => dir,
        None => "",
    };
    Some(format!("./{dir}"))
}

/// `moduleBaseName` is the source file's stem (spec.md §6), falling back
/// to the module's own name when no source file is recorded.
fn module_base_name(module_name: &str, source_file: &Option<String>) -> String {
    match source_file {
        Some(path) => {
            let file = path.rsplit('/').next().unwrap_or(path);
            file.strip_suffix(".rs").unwrap_or(file).to_string()
        }
        None => module_name.to_string(),
    }
}

fn verb_name(verb: HttpVerb) -> &'static str {
    match verb {
        HttpVerb::Get => "GET",
        HttpVerb::Post => "POST",
        HttpVerb::Put => "PUT",
        HttpVerb::Patch => "PATCH",
        HttpVerb::Delete => "DELETE",
        HttpVerb::Head => "HEAD",
        HttpVerb::Options => "OPTIONS",
    }
}

/// Flattens protectedBy tokens, custom metadata and the http method/path
/// into the flat `celerity.*` annotation map spec.md §6 requires.
fn build_annotations(
    verb: HttpVerb,
    path: &str,
    protected_by: &[InjectionToken],
    public: bool,
    custom_metadata: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    let mut annotations = HashMap::new();
    annotations.insert(annotation_keys::HANDLER_HTTP.to_string(), Value::Bool(true));
    annotations.insert(
        annotation_keys::HTTP_METHOD.to_string(),
        Value::String(verb_name(verb).to_string()),
    );
    annotations.insert(annotation_keys::HTTP_PATH.to_string(), Value::String(path.to_string()));
    if !protected_by.is_empty() {
        let names: Vec<Value> = protected_by.iter().map(|t| Value::String(t.render())).collect();
        annotations.insert(annotation_keys::GUARD_PROTECTED_BY.to_string(), Value::Array(names));
    }
    annotations.insert(annotation_keys::PUBLIC.to_string(), Value::Bool(public));
    for (key, value) in custom_metadata {
        let rendered = match value {
            Value::String(_) | Value::Bool(_) => value.clone(),
            Value::Array(items) if items.iter().all(Value::is_string) => value.clone(),
            other => Value::String(other.to_string()),
        };
        annotations.insert(annotation_keys::metadata(key), rendered);
    }
    if !custom_metadata.is_empty() {
        annotations.insert(
            annotation_keys::GUARD_CUSTOM.to_string(),
            Value::Bool(!protected_by.is_empty()),
        );
    }
    annotations
}

pub struct ManifestExtractor;

impl ManifestExtractor {
    pub fn extract(graph: &ModuleGraph) -> Manifest {
        let mut handlers = Vec::new();
        let mut function_handlers = Vec::new();
        let mut nodes = Vec::new();

        for node in &graph.nodes {
            let module = &node.descriptor;
            let base_name = module_base_name(&module.name, &module.source_file);
            let location = code_location(&module.source_file);

            for provider in &module.providers {
                nodes.push(DependencyNode {
                    token: provider.token.render(),
                    token_type: provider.token.token_type(),
                    provider_type: provider.provider.provider_type(),
                    dependencies: provider.provider.dependencies().iter().map(|t| t.render()).collect(),
                });
            }

            for controller in &module.controllers {
                nodes.push(DependencyNode {
                    token: controller.token().render(),
                    token_type: controller.token().token_type(),
                    provider_type: "class",
                    dependencies: controller.deps.iter().map(|t| t.render()).collect(),
                });

                let class_name = controller.class.short_name().to_string();
                for method in &controller.methods {
                    let path = join_paths(&controller.prefix, &method.path);
                    let mut merged_protected = controller.protected_by.clone();
                    merged_protected.extend(method.protected_by.clone());
                    let mut merged_meta = (*controller.custom_metadata).clone();
                    merged_meta.extend((*method.custom_metadata).clone());

                    let resource_name = camel_resource_name(&class_name, &method.method_name);
                    let handler_name = format!("{class_name}-{}", method.method_name);
                    let handler_ref = format!("{base_name}.{class_name}.{}", method.method_name);

                    handlers.push(ClassHandlerEntry {
                        resource_name,
                        class_name: class_name.clone(),
                        method_name: method.method_name.clone(),
                        source_file: module.source_file.clone(),
                        handler_type: "http",
                        annotations: build_annotations(
                            method.verb,
                            &path,
                            &merged_protected,
                            method.public,
                            &merged_meta,
                        ),
                        spec: HandlerSpec {
                            handler_name,
                            code_location: location.clone(),
                            handler: handler_ref,
                            timeout: None,
                        },
                    });
                }
            }

            for handler in &module.function_handlers {
                nodes.push(DependencyNode {
                    token: InjectionToken::name(handler.id.clone()).render(),
                    token_type: "string",
                    provider_type: "factory",
                    dependencies: handler.inject.iter().map(|t| t.render()).collect(),
                });

                let path = join_paths("", &handler.path);
                let export_name = handler.id.clone();
                let handler_ref = format!("{base_name}.{export_name}");

                function_handlers.push(FunctionHandlerEntry {
                    resource_name: export_name.clone(),
                    export_name: export_name.clone(),
                    source_file: module.source_file.clone(),
                    annotations: build_annotations(
                        handler.verb,
                        &path,
                        &handler.protected_by,
                        handler.public,
                        &handler.custom_metadata,
                    ),
                    spec: HandlerSpec {
                        handler_name: export_name,
                        code_location: location.clone(),
                        handler: handler_ref,
                        timeout: None,
                    },
                });
            }
        }

        Manifest {
            version: SCHEMA_VERSION.to_string(),
            handlers,
            function_handlers,
            dependency_graph: DependencyGraph { nodes },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ControllerDescriptor, ControllerMethodSpec, ModuleDescriptor};
    use crate::graph::ModuleGraphBuilder;
    use crate::provider::Instance;
    use std::sync::Arc;

    struct Widgets;

    fn construct() -> crate::provider::ConstructFn {
        Arc::new(|_deps| Box::pin(async { Ok(Arc::new(Widgets) as Instance) }))
    }

    fn invoke() -> crate::contracts::HandlerInvokeFn {
        Arc::new(|_owner, _deps, _ctx| Box::pin(async { Ok(Value::Null) }))
    }

    #[test]
    fn extracts_schema_version_and_handler_shape() {
        let controller = ControllerDescriptor::new::<Widgets>("/widgets", vec![], true, construct())
            .add_method(ControllerMethodSpec::new("list", HttpVerb::Get, "", invoke()));
        let module = ModuleDescriptor::new("widgets")
            .controller(controller)
            .with_source_file("modules/widgets/mod.rs");
        let graph = ModuleGraphBuilder::new(&[module]).build("widgets").unwrap();

        let manifest = ManifestExtractor::extract(&graph);
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.handlers.len(), 1);

        let entry = &manifest.handlers[0];
        assert_eq!(entry.class_name, "Widgets");
        assert_eq!(entry.method_name, "list");
        assert_eq!(entry.resource_name, "widgets_list");
        assert_eq!(entry.spec.handler_name, "Widgets-list");
        assert_eq!(entry.spec.handler, "mod.Widgets.list");
        assert_eq!(entry.spec.code_location.as_deref(), Some("./modules/widgets"));
        assert_eq!(
            entry.annotations.get(annotation_keys::HTTP_METHOD),
            Some(&Value::String("GET".to_string()))
        );
        assert_eq!(entry.annotations.get(annotation_keys::HTTP_PATH), Some(&Value::String("/widgets".to_string())));
        assert_eq!(entry.annotations.get(annotation_keys::PUBLIC), Some(&Value::Bool(false)));
    }

    #[test]
    fn function_handler_uses_the_export_name_verbatim() {
        let handler = crate::contracts::FunctionHandlerDescriptor::new(
            "createWidget",
            HttpVerb::Post,
            "/widgets",
            invoke(),
        );
        let module = ModuleDescriptor::new("widgets").function_handler(handler);
        let graph = ModuleGraphBuilder::new(&[module]).build("widgets").unwrap();

        let manifest = ManifestExtractor::extract(&graph);
        assert_eq!(manifest.function_handlers.len(), 1);
        let entry = &manifest.function_handlers[0];
        assert_eq!(entry.resource_name, "createWidget");
        assert_eq!(entry.export_name, "createWidget");
        assert_eq!(entry.spec.handler, "widgets.createWidget");
    }
}
