//! Handler Registry (spec.md §4.E): flattens every controller method and
//! function handler reachable in a validated module graph into a single
//! list of `ResolvedHandler`s -- path-normalised, with module/controller/
//! method-level `protectedBy`, layers and `customMetadata` merged
//! outer-to-inner.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::contracts::{FunctionHandlerDescriptor, HandlerInvokeFn, HttpVerb, ParamSource};
use crate::graph::ModuleGraph;
use crate::pipeline::LayerRef;
use crate::router::match_route;
use crate::token::InjectionToken;
use crate::validation::ValidationLayer;

/// A fully flattened, dispatch-ready handler.
#[derive(Clone)]
pub struct ResolvedHandler {
    pub id: String,
    pub module_name: String,
    pub verb: HttpVerb,
    pub path: String,
    /// `Some` for a controller method: the token its owning controller is
    /// resolved under. `None` for a function handler.
    pub owner_token: Option<InjectionToken>,
    pub method_name: Option<String>,
    pub invoke: HandlerInvokeFn,
    /// Resolved per-call for a function handler (empty for a controller
    /// method, whose dependencies are already baked into `owner_token`'s
    /// instance).
    pub inject: Vec<InjectionToken>,
    pub protected_by: Vec<InjectionToken>,
    pub layers: Vec<LayerRef>,
    pub custom_metadata: Arc<HashMap<String, Value>>,
    pub public: bool,
    /// Positional parameter-extraction descriptors for a controller method
    /// (empty for a function handler, which reads `ctx.request` directly);
    /// consumed by the dispatcher's controller argument-assembly algorithm
    /// (spec.md §4.G step 3).
    pub param_descriptors: Vec<ParamSource>,
}

/// Builds a `ValidationLayer` from whichever of a controller method's
/// per-parameter schemas are present, one layer per location (spec.md
/// §4.E operation 4). Returns `None` when none of the descriptors carry a
/// schema, so nothing is prepended.
fn validation_layer_from_params(params: &[ParamSource]) -> Option<ValidationLayer> {
    let mut layer = ValidationLayer::new();
    let mut any = false;
    for param in params {
        let schema = match param.schema() {
            Some(schema) => schema.clone(),
            None => continue,
        };
        any = true;
        layer = match param {
            ParamSource::Body { .. } => layer.with_body(schema),
            ParamSource::Query { .. } => layer.with_query(schema),
            ParamSource::Params { .. } => layer.with_params(schema),
            ParamSource::Headers { .. } => layer.with_headers(schema),
            ParamSource::Auth | ParamSource::RequestId | ParamSource::Cookies | ParamSource::Request => layer,
        };
    }
    any.then_some(layer)
}

/// Builds a `ValidationLayer` from a function handler's `schema.{body,
/// query,params,headers}` bag (spec.md §3 "Function handler", §4.E
/// operation 4).
fn validation_layer_from_function_handler(handler: &FunctionHandlerDescriptor) -> Option<ValidationLayer> {
    let any = handler.body_schema.is_some()
        || handler.query_schema.is_some()
        || handler.params_schema.is_some()
        || handler.headers_schema.is_some();
    if !any {
        return None;
    }
    let mut layer = ValidationLayer::new();
    if let Some(schema) = &handler.body_schema {
        layer = layer.with_body(schema.clone());
    }
    if let Some(schema) = &handler.query_schema {
        layer = layer.with_query(schema.clone());
    }
    if let Some(schema) = &handler.params_schema {
        layer = layer.with_params(schema.clone());
    }
    if let Some(schema) = &handler.headers_schema {
        layer = layer.with_headers(schema.clone());
    }
    Some(layer)
}

/// Joins a controller/module prefix with a method's own path fragment,
/// collapsing repeated separators anywhere in either half and
/// guaranteeing exactly one leading slash and no trailing one (spec.md
/// §4.E).
pub fn join_paths(prefix: &str, suffix: &str) -> String {
    let segments: Vec<&str> = prefix
        .split('/')
        .chain(suffix.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn merge_metadata(
    base: &Arc<HashMap<String, Value>>,
    override_: &Arc<HashMap<String, Value>>,
) -> Arc<HashMap<String, Value>> {
    if override_.is_empty() {
        return base.clone();
    }
    let mut merged = (**base).clone();
    for (k, v) in override_.iter() {
        merged.insert(k.clone(), v.clone());
    }
    Arc::new(merged)
}

pub struct HandlerRegistry {
    handlers: Vec<ResolvedHandler>,
}

impl HandlerRegistry {
    pub fn build(graph: &ModuleGraph) -> Self {
        let mut handlers = Vec::new();

        for node in &graph.nodes {
            let module = &node.descriptor;

            for controller in &module.controllers {
                for method in &controller.methods {
                    let mut merged_protected = controller.protected_by.clone();
                    merged_protected.extend(method.protected_by.clone());

                    let mut merged_layers = module.layers.clone();
                    merged_layers.extend(controller.layers.clone());
                    merged_layers.extend(method.layers.clone());
                    if let Some(validation) = validation_layer_from_params(&method.param_descriptors) {
                        merged_layers.insert(0, Arc::new(validation));
                    }

                    let metadata = merge_metadata(&controller.custom_metadata, &method.custom_metadata);

                    let id = format!("{}.{}", controller.class.short_name(), method.method_name);

                    handlers.push(ResolvedHandler {
                        id,
                        module_name: module.name.clone(),
                        verb: method.verb,
                        path: join_paths(&controller.prefix, &method.path),
                        owner_token: Some(controller.token()),
                        method_name: Some(method.method_name.clone()),
                        invoke: method.invoke.clone(),
                        inject: Vec::new(),
                        protected_by: merged_protected,
                        layers: merged_layers,
                        custom_metadata: metadata,
                        public: method.public,
                        param_descriptors: method.param_descriptors.clone(),
                    });
                }
            }

            for handler in &module.function_handlers {
                let mut merged_layers = module.layers.clone();
                merged_layers.extend(handler.layers.clone());
                if let Some(validation) = validation_layer_from_function_handler(handler) {
                    merged_layers.insert(0, Arc::new(validation));
                }

                handlers.push(ResolvedHandler {
                    id: handler.id.clone(),
                    module_name: module.name.clone(),
                    verb: handler.verb,
                    path: join_paths("", &handler.path),
                    owner_token: None,
                    method_name: None,
                    invoke: handler.invoke.clone(),
                    inject: handler.inject.clone(),
                    protected_by: handler.protected_by.clone(),
                    layers: merged_layers,
                    custom_metadata: handler.custom_metadata.clone(),
                    public: handler.public,
                    param_descriptors: Vec::new(),
                });
            }
        }

        Self { handlers }
    }

    pub fn all(&self) -> &[ResolvedHandler] {
        &self.handlers
    }

    pub fn by_id(&self, id: &str) -> Option<&ResolvedHandler> {
        self.handlers.iter().find(|h| h.id == id)
    }

    /// Matches a concrete request path against every handler's `{name}`
    /// path template (spec.md §8 "Route matching"), returning the handler
    /// and its extracted path parameters.
    pub fn by_route(&self, verb: HttpVerb, path: &str) -> Option<(&ResolvedHandler, HashMap<String, String>)> {
        self.handlers
            .iter()
            .filter(|h| h.verb == verb)
            .find_map(|h| match_route(&h.path, path).map(|params| (h, params)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ControllerDescriptor, ControllerMethodSpec, ModuleDescriptor};
    use crate::graph::ModuleGraphBuilder;
    use crate::provider::Instance;
    use crate::validation::{RequestSchema, SchemaIssue};

    #[test]
    fn join_paths_normalises_slashes() {
        assert_eq!(join_paths("/users/", "/{id}/"), "/users/{id}");
        assert_eq!(join_paths("", "/health"), "/health");
        assert_eq!(join_paths("/users", ""), "/users");
        assert_eq!(join_paths("", ""), "/");
    }

    #[test]
    fn join_paths_collapses_internal_repeated_separators() {
        assert_eq!(join_paths("/widgets//", "/{id}//sub"), "/widgets/{id}/sub");
        assert_eq!(join_paths("//a//b//", "//c//"), "/a/b/c");
    }

    struct AlwaysOk;
    impl RequestSchema for AlwaysOk {
        fn parse(&self, value: &Value) -> Result<Value, Vec<SchemaIssue>> {
            Ok(value.clone())
        }
    }

    struct Widgets;

    fn construct() -> crate::provider::ConstructFn {
        Arc::new(|_deps| Box::pin(async { Ok(Arc::new(Widgets) as Instance) }))
    }

    #[test]
    fn a_validated_param_descriptor_auto_prepends_a_validation_layer() {
        let invoke: HandlerInvokeFn = Arc::new(|_owner, _deps, _ctx| Box::pin(async { Ok(Value::Null) }));
        let method = ControllerMethodSpec::new("create", HttpVerb::Post, "/", invoke)
            .with_param(ParamSource::body_validated(None, Arc::new(AlwaysOk)));
        let controller = ControllerDescriptor::new::<Widgets>("/widgets", vec![], true, construct()).add_method(method);
        let module = ModuleDescriptor::new("widgets").controller(controller);
        let graph = ModuleGraphBuilder::new(&[module]).build("widgets").unwrap();

        let registry = HandlerRegistry::build(&graph);
        let handler = registry.by_id("Widgets.create").unwrap();
        assert_eq!(handler.layers.first().unwrap().name(), "validation");
    }

    #[test]
    fn a_method_with_no_validated_params_gets_no_validation_layer() {
        let invoke: HandlerInvokeFn = Arc::new(|_owner, _deps, _ctx| Box::pin(async { Ok(Value::Null) }));
        let method =
            ControllerMethodSpec::new("list", HttpVerb::Get, "/", invoke).with_param(ParamSource::params(Some("id")));
        let controller = ControllerDescriptor::new::<Widgets>("/widgets", vec![], true, construct()).add_method(method);
        let module = ModuleDescriptor::new("widgets").controller(controller);
        let graph = ModuleGraphBuilder::new(&[module]).build("widgets").unwrap();

        let registry = HandlerRegistry::build(&graph);
        let handler = registry.by_id("Widgets.list").unwrap();
        assert!(handler.layers.iter().all(|l| l.name() != "validation"));
    }
}
