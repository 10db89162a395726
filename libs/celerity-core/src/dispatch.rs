//! Request Dispatcher (spec.md §4.G): the per-request glue between a
//! resolved handler, the DI container, and the layer pipeline.
//!
//! Concatenates system layers (cross-cutting, applied to every request),
//! application layers (registered once for the whole app) and the
//! handler's own merged layers, in that order, then runs the pipeline
//! with the controller method or function handler as the terminal step.
//! The terminal's raw return value is normalised into an `HttpResponse`;
//! an `HttpException` thrown anywhere in the chain is translated instead
//! of falling through to the 500 handler.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::container::Container;
use crate::context::HandlerContext;
use crate::contracts::ParamSource;
use crate::error::{DispatchError, HttpException};
use crate::handler::ResolvedHandler;
use crate::http::{multi_map_to_value, single_map_to_value, HttpRequest, HttpResponse};
use crate::pipeline::{run_pipeline, LayerRef};
use crate::provider::Instance;
use crate::validation::{VALIDATED_BODY, VALIDATED_HEADERS, VALIDATED_PARAMS, VALIDATED_QUERY};

pub struct Dispatcher {
    pub container: Arc<Container>,
    pub system_layers: Vec<LayerRef>,
    pub app_layers: Vec<LayerRef>,
}

impl Dispatcher {
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            container,
            system_layers: Vec::new(),
            app_layers: Vec::new(),
        }
    }

    pub fn with_system_layers(mut self, layers: Vec<LayerRef>) -> Self {
        self.system_layers = layers;
        self
    }

    pub fn with_app_layers(mut self, layers: Vec<LayerRef>) -> Self {
        self.app_layers = layers;
        self
    }

    /// Dispatches a request already resolved to `handler` (typically via
    /// `HandlerResolver::by_route`), merging in any path parameters the
    /// caller extracted during resolution.
    pub async fn dispatch(&self, handler: &ResolvedHandler, mut request: HttpRequest) -> HttpResponse {
        if let Some(params) = crate::router::match_route(&handler.path, &request.path) {
            request.params.extend(params);
        }
        if request.request_id.is_none() {
            request.request_id = Some(Uuid::new_v4().to_string());
        }
        if request.request_time.is_none() {
            request.request_time = Some(Utc::now());
        }
        request.matched_route = Some(handler.path.clone());
        let span = tracing::info_span!("dispatch", handler_id = %handler.id, path = %request.path);
        match self.dispatch_inner(handler, request).instrument(span.clone()).await {
            Ok(response) => response,
            Err(DispatchError::HttpException(exc)) => exception_response(exc),
            Err(err) => {
                let _enter = span.enter();
                tracing::error!(error = %err, "unhandled dispatch failure");
                HttpResponse::json(
                    500,
                    serde_json::json!({ "statusCode": 500, "message": "Internal Server Error" }),
                )
            }
        }
    }

    async fn dispatch_inner(&self, handler: &ResolvedHandler, request: HttpRequest) -> Result<HttpResponse, DispatchError> {
        let ctx = HandlerContext::new(
            request,
            handler.id.clone(),
            handler.custom_metadata.clone(),
            tracing::Span::current(),
        );

        let mut layers = Vec::with_capacity(self.system_layers.len() + self.app_layers.len() + handler.layers.len());
        layers.extend(self.system_layers.clone());
        layers.extend(self.app_layers.clone());
        layers.extend(handler.layers.clone());

        let owner = match &handler.owner_token {
            Some(token) => self.container.resolve(token).await?,
            None => Arc::new(()) as Instance,
        };

        let mut deps = Vec::with_capacity(handler.inject.len());
        for token in &handler.inject {
            deps.push(self.container.resolve(token).await?);
        }

        let invoke = handler.invoke.clone();
        let param_descriptors = handler.param_descriptors.clone();
        let terminal: crate::pipeline::Terminal = Arc::new(move |mut ctx: HandlerContext| {
            let owner = owner.clone();
            let deps = deps.clone();
            let invoke = invoke.clone();
            let param_descriptors = param_descriptors.clone();
            Box::pin(async move {
                if let Some(resp) = ctx.short_circuit.clone() {
                    return Ok((ctx, resp));
                }
                ctx.assembled_args = assemble_controller_args(&param_descriptors, &ctx);
                match invoke(owner, deps, ctx.clone()).await {
                    Ok(value) => Ok((ctx, normalize_response(value))),
                    Err(exc) => Err(DispatchError::HttpException(exc)),
                }
            })
        });

        let (final_ctx, response) = run_pipeline(layers, terminal, ctx).await?;
        if let Some(short) = final_ctx.short_circuit {
            return Ok(short);
        }
        Ok(response)
    }
}

fn extract_field(value: Value, key: &Option<String>) -> Value {
    match key {
        Some(name) => value.get(name).cloned().unwrap_or(Value::Null),
        None => value,
    }
}

/// Assembles a controller method's positional arguments from its
/// parameter-extraction descriptors: validated data takes priority over
/// the raw request field it was parsed from (spec.md §4.G step 3).
fn assemble_controller_args(descriptors: &[ParamSource], ctx: &HandlerContext) -> Vec<Value> {
    descriptors
        .iter()
        .map(|descriptor| match descriptor {
            ParamSource::Body { key, .. } => {
                let body = ctx
                    .meta(VALIDATED_BODY)
                    .cloned()
                    .unwrap_or_else(|| ctx.request.body.clone().unwrap_or(Value::Null));
                extract_field(body, key)
            }
            ParamSource::Query { key, .. } => {
                let query = ctx
                    .meta(VALIDATED_QUERY)
                    .cloned()
                    .unwrap_or_else(|| multi_map_to_value(&ctx.request.query));
                extract_field(query, key)
            }
            ParamSource::Params { key, .. } => {
                let params = ctx
                    .meta(VALIDATED_PARAMS)
                    .cloned()
                    .unwrap_or_else(|| single_map_to_value(&ctx.request.params));
                extract_field(params, key)
            }
            ParamSource::Headers { key, .. } => {
                let headers = ctx
                    .meta(VALIDATED_HEADERS)
                    .cloned()
                    .unwrap_or_else(|| multi_map_to_value(&ctx.request.headers));
                extract_field(headers, key)
            }
            ParamSource::Auth => serde_json::to_value(&ctx.request.auth).unwrap_or(Value::Null),
            ParamSource::RequestId => ctx.request.request_id.clone().map(Value::String).unwrap_or(Value::Null),
            ParamSource::Cookies => serde_json::to_value(&ctx.request.cookies).unwrap_or(Value::Null),
            ParamSource::Request => ctx.request.to_value(),
        })
        .collect()
}

/// Applies the shape-driven normalisation rules: `null` becomes 204, a
/// string becomes a 200 text response, a plain object/array becomes a
/// 200 JSON response, and an object already carrying a numeric `status`
/// field is treated as a pre-built response and passed through verbatim
/// (spec.md §4.G).
fn normalize_response(value: Value) -> HttpResponse {
    match value {
        Value::Null => HttpResponse::no_content(),
        Value::String(s) => HttpResponse::text(200, s),
        Value::Object(ref map) if map.get("status").and_then(Value::as_u64).is_some() => {
            let status = map.get("status").and_then(Value::as_u64).unwrap() as u16;
            let body = map.get("body").cloned();
            let mut response = HttpResponse::new(status);
            if let Some(headers) = map.get("headers").and_then(Value::as_object) {
                for (k, v) in headers {
                    if let Some(v) = v.as_str() {
                        response = response.with_header(k.clone(), v.to_string());
                    }
                }
            }
            response.body = body.or(Some(Value::Null));
            response
        }
        other => HttpResponse::json(200, other),
    }
}

fn exception_response(exc: HttpException) -> HttpResponse {
    let mut body = serde_json::json!({
        "statusCode": exc.status,
        "message": exc.message,
    });
    if let Some(details) = exc.details {
        body["issues"] = details;
    }
    HttpResponse::json(exc.status, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ControllerDescriptor, ControllerMethodSpec, HttpVerb, ModuleDescriptor};
    use crate::graph::ModuleGraphBuilder;
    use crate::handler::HandlerRegistry;

    struct Widgets;

    fn construct() -> crate::provider::ConstructFn {
        Arc::new(|_deps| Box::pin(async { Ok(Arc::new(Widgets) as Instance) }))
    }

    #[tokio::test]
    async fn string_return_value_becomes_a_200_text_response() {
        let invoke: crate::contracts::HandlerInvokeFn =
            Arc::new(|_owner, _deps, _ctx| Box::pin(async { Ok(Value::String("ok".to_string())) }));
        let controller = ControllerDescriptor::new::<Widgets>("/widgets", vec![], true, construct())
            .add_method(ControllerMethodSpec::new("ping", HttpVerb::Get, "/ping", invoke));
        let module = ModuleDescriptor::new("widgets").controller(controller);
        let graph = ModuleGraphBuilder::new(&[module]).build("widgets").unwrap();
        let registry = HandlerRegistry::build(&graph);
        let handler = registry.by_id("Widgets.ping").unwrap();

        let container = Arc::new(Container::build(&graph));
        let dispatcher = Dispatcher::new(container);
        let resp = dispatcher
            .dispatch(handler, HttpRequest::new(http::Method::GET, "/widgets/ping"))
            .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, Some(Value::String("ok".to_string())));
    }

    #[tokio::test]
    async fn http_exception_is_translated_instead_of_falling_to_500() {
        let invoke: crate::contracts::HandlerInvokeFn = Arc::new(|_owner, _deps, _ctx| {
            Box::pin(async { Err(HttpException::not_found("no such widget")) })
        });
        let controller = ControllerDescriptor::new::<Widgets>("/widgets", vec![], true, construct())
            .add_method(ControllerMethodSpec::new("get", HttpVerb::Get, "/{id}", invoke));
        let module = ModuleDescriptor::new("widgets").controller(controller);
        let graph = ModuleGraphBuilder::new(&[module]).build("widgets").unwrap();
        let registry = HandlerRegistry::build(&graph);
        let handler = registry.by_id("Widgets.get").unwrap();

        let container = Arc::new(Container::build(&graph));
        let dispatcher = Dispatcher::new(container);
        let resp = dispatcher
            .dispatch(handler, HttpRequest::new(http::Method::GET, "/widgets/1"))
            .await;
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn a_missing_request_id_is_stamped_before_dispatch() {
        let invoke: crate::contracts::HandlerInvokeFn =
            Arc::new(|_owner, _deps, ctx| Box::pin(async move { Ok(Value::String(ctx.request.request_id.clone().unwrap())) }));
        let controller = ControllerDescriptor::new::<Widgets>("/widgets", vec![], true, construct())
            .add_method(ControllerMethodSpec::new("ping", HttpVerb::Get, "/ping", invoke));
        let module = ModuleDescriptor::new("widgets").controller(controller);
        let graph = ModuleGraphBuilder::new(&[module]).build("widgets").unwrap();
        let registry = HandlerRegistry::build(&graph);
        let handler = registry.by_id("Widgets.ping").unwrap();

        let container = Arc::new(Container::build(&graph));
        let dispatcher = Dispatcher::new(container);
        let resp = dispatcher
            .dispatch(handler, HttpRequest::new(http::Method::GET, "/widgets/ping"))
            .await;
        assert_eq!(resp.status, 200);
        assert!(!resp.body.unwrap().as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn controller_args_are_assembled_from_param_descriptors() {
        let invoke: crate::contracts::HandlerInvokeFn =
            Arc::new(|_owner, _deps, ctx| Box::pin(async move { Ok(ctx.assembled_args[0].clone()) }));
        let method = ControllerMethodSpec::new("get", HttpVerb::Get, "/{id}", invoke)
            .with_param(crate::contracts::ParamSource::params(Some("id")));
        let controller = ControllerDescriptor::new::<Widgets>("/widgets", vec![], true, construct()).add_method(method);
        let module = ModuleDescriptor::new("widgets").controller(controller);
        let graph = ModuleGraphBuilder::new(&[module]).build("widgets").unwrap();
        let registry = HandlerRegistry::build(&graph);
        let handler = registry.by_id("Widgets.get").unwrap();

        let container = Arc::new(Container::build(&graph));
        let dispatcher = Dispatcher::new(container);
        let resp = dispatcher
            .dispatch(handler, HttpRequest::new(http::Method::GET, "/widgets/42"))
            .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, Some(Value::String("42".to_string())));
    }

    #[tokio::test]
    async fn null_return_value_becomes_204() {
        let invoke: crate::contracts::HandlerInvokeFn =
            Arc::new(|_owner, _deps, _ctx| Box::pin(async { Ok(Value::Null) }));
        let controller = ControllerDescriptor::new::<Widgets>("/widgets", vec![], true, construct())
            .add_method(ControllerMethodSpec::new("delete", HttpVerb::Delete, "/{id}", invoke));
        let module = ModuleDescriptor::new("widgets").controller(controller);
        let graph = ModuleGraphBuilder::new(&[module]).build("widgets").unwrap();
        let registry = HandlerRegistry::build(&graph);
        let handler = registry.by_id("Widgets.delete").unwrap();

        let container = Arc::new(Container::build(&graph));
        let dispatcher = Dispatcher::new(container);
        let resp = dispatcher
            .dispatch(handler, HttpRequest::new(http::Method::DELETE, "/widgets/1"))
            .await;
        assert_eq!(resp.status, 204);
    }
}
