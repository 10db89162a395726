//! Cross-module scenarios exercising the graph builder, validator,
//! container, handler registry/resolver, layer pipeline and dispatcher
//! together, matching the end-to-end flows a single module or layer
//! cannot demonstrate on its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use celerity_core::{
    Container, ControllerDescriptor, ControllerMethodSpec, Dispatcher, FunctionHandlerDescriptor, GraphError,
    HandlerContext, HandlerRegistry, HandlerResolver, HttpRequest, HttpVerb, InjectionToken, Layer, LayerRef,
    ModuleDescriptor, ModuleGraphBuilder, Next, Provider,
};
use celerity_core::pipeline::DispatchOutcome;
use celerity_core::provider::{ConstructFn, Instance};
use celerity_core::validation::{SchemaIssue, ValidationLayer, VALIDATED_BODY};
use serde_json::{json, Value};

struct OrdersHandler;

fn orders_construct() -> ConstructFn {
    Arc::new(|_deps| Box::pin(async { Ok(Arc::new(OrdersHandler) as Instance) }))
}

fn get_one_invoke() -> celerity_core::ControllerMethodSpec {
    let invoke: celerity_core::contracts::HandlerInvokeFn = Arc::new(|_owner, _deps, ctx: HandlerContext| {
        Box::pin(async move {
            let id = ctx.request.params.get("id").cloned().unwrap_or_default();
            Ok(json!({ "id": id }))
        })
    });
    ControllerMethodSpec::new("getOne", HttpVerb::Get, "/{id}", invoke)
}

fn orders_module() -> ModuleDescriptor {
    let controller = ControllerDescriptor::new::<OrdersHandler>("/orders", vec![], true, orders_construct())
        .add_method(get_one_invoke());
    ModuleDescriptor::new("orders").controller(controller)
}

/// Scenario 1: single controller, route resolution and dispatch.
#[tokio::test]
async fn single_controller_resolves_and_dispatches() {
    let module = orders_module();
    let graph = ModuleGraphBuilder::new(&[module]).build("orders").unwrap();
    let registry = HandlerRegistry::build(&graph);
    let resolver = HandlerResolver::new(&registry);

    let (handler, params) = resolver.by_route(HttpVerb::Get, "/orders/42").unwrap();
    assert_eq!(handler.path, "/orders/{id}");
    assert_eq!(handler.verb, HttpVerb::Get);
    assert!(handler.protected_by.is_empty());
    assert_eq!(params.get("id"), Some(&"42".to_string()));

    let container = Arc::new(Container::build(&graph));
    let dispatcher = Dispatcher::new(container);
    let resp = dispatcher
        .dispatch(handler, HttpRequest::new(http::Method::GET, "/orders/42"))
        .await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.headers.get("content-type").map(String::as_str), Some("application/json"));
    assert_eq!(resp.body, Some(json!({ "id": "42" })));
}

struct TooManyRequestsLayer;

#[async_trait]
impl Layer for TooManyRequestsLayer {
    async fn handle(&self, ctx: HandlerContext, _next: Next) -> DispatchOutcome {
        Ok((
            ctx,
            celerity_core::HttpResponse::json(429, json!({ "message": "Too many requests" })),
        ))
    }
}

/// Scenario 2: a layer short-circuits without calling `next`; the
/// downstream handler never runs and its response passes through
/// unchanged.
#[tokio::test]
async fn layer_short_circuit_skips_the_handler() {
    let invoked = Arc::new(AtomicBool::new(false));
    let invoked_flag = invoked.clone();
    let invoke: celerity_core::contracts::HandlerInvokeFn = Arc::new(move |_owner, _deps, _ctx| {
        let invoked_flag = invoked_flag.clone();
        Box::pin(async move {
            invoked_flag.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        })
    });
    let controller = ControllerDescriptor::new::<OrdersHandler>("/orders", vec![], true, orders_construct())
        .add_method(ControllerMethodSpec::new("list", HttpVerb::Get, "", invoke));
    let module = ModuleDescriptor::new("orders").controller(controller);
    let graph = ModuleGraphBuilder::new(&[module]).build("orders").unwrap();
    let registry = HandlerRegistry::build(&graph);
    let handler = registry.by_id("OrdersHandler.list").unwrap();

    let container = Arc::new(Container::build(&graph));
    let system_layers: Vec<LayerRef> = vec![Arc::new(TooManyRequestsLayer)];
    let dispatcher = Dispatcher::new(container).with_system_layers(system_layers);

    let resp = dispatcher
        .dispatch(handler, HttpRequest::new(http::Method::GET, "/orders"))
        .await;

    assert_eq!(resp.status, 429);
    assert_eq!(resp.body, Some(json!({ "message": "Too many requests" })));
    assert!(!invoked.load(Ordering::SeqCst));
}

struct UppercaseNameSchema;

impl celerity_core::validation::RequestSchema for UppercaseNameSchema {
    fn parse(&self, value: &Value) -> Result<Value, Vec<SchemaIssue>> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| vec![SchemaIssue { path: "$.name".to_string(), message: "required".to_string() }])?;
        let mut out = value.clone();
        out["upper"] = Value::String(name.to_uppercase());
        Ok(out)
    }
}

/// Scenario 3: a function handler behind a validation layer observes the
/// schema's coerced output through the reserved `validatedBody` metadata
/// key.
#[tokio::test]
async fn validation_layer_exposes_parsed_body_to_the_handler() {
    let invoke: celerity_core::contracts::HandlerInvokeFn = Arc::new(|_owner, _deps, ctx: HandlerContext| {
        Box::pin(async move {
            let validated = ctx.meta(VALIDATED_BODY).cloned().unwrap_or(Value::Null);
            Ok(validated)
        })
    });
    let layer: LayerRef = Arc::new(ValidationLayer::new().with_body(Arc::new(UppercaseNameSchema)));
    let handler_descriptor = FunctionHandlerDescriptor::new("createName", HttpVerb::Post, "/names", invoke)
        .with_layer(layer);
    let module = ModuleDescriptor::new("names").function_handler(handler_descriptor);
    let graph = ModuleGraphBuilder::new(&[module]).build("names").unwrap();
    let registry = HandlerRegistry::build(&graph);
    let handler = registry.by_id("createName").unwrap();

    let container = Arc::new(Container::build(&graph));
    let dispatcher = Dispatcher::new(container);
    let request = HttpRequest::new(http::Method::POST, "/names").with_body(json!({ "name": "ada" }));
    let resp = dispatcher.dispatch(handler, request).await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body.unwrap().get("upper").and_then(Value::as_str), Some("ADA"));
}

struct Greeter {
    prefix: &'static str,
}

#[celerity_core::handler_fn(id = "greet", verb = "Post", path = "/greet")]
async fn greet(ctx: HandlerContext, greeter: &Greeter) -> Result<Value, celerity_core::HttpException> {
    let name = ctx.request.body.clone().and_then(|b| b.get("name").and_then(Value::as_str).map(str::to_string));
    Ok(Value::String(format!("{}{}", greeter.prefix, name.unwrap_or_default())))
}

fn greeter_construct() -> ConstructFn {
    Arc::new(|_deps| Box::pin(async { Ok(Arc::new(Greeter { prefix: "Hello, " }) as Instance) }))
}

/// Scenario 3b: a `#[handler(...)]`-generated function handler declares a
/// trailing dependency parameter; the dispatcher resolves it through the
/// container and the macro's generated closure threads it through to the
/// decorated function as an extra trailing argument.
#[tokio::test]
async fn handler_macro_threads_resolved_dependencies_to_the_function() {
    let descriptor = greet_descriptor().inject(InjectionToken::of::<Greeter>());
    let module = ModuleDescriptor::new("greetings")
        .provide(InjectionToken::of::<Greeter>(), Provider::class::<Greeter>(vec![], true, greeter_construct()))
        .function_handler(descriptor);
    let graph = ModuleGraphBuilder::new(&[module]).build("greetings").unwrap();
    let registry = HandlerRegistry::build(&graph);
    let handler = registry.by_id("greet").unwrap();

    let container = Arc::new(Container::build(&graph));
    let dispatcher = Dispatcher::new(container);
    let request = HttpRequest::new(http::Method::POST, "/greet").with_body(json!({ "name": "Ada" }));
    let resp = dispatcher.dispatch(handler, request).await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, Some(Value::String("Hello, Ada".to_string())));
}

/// Scenario 4: a two-module import cycle is rejected with the full path.
#[test]
fn module_cycle_is_rejected_with_the_cycle_path() {
    let a = ModuleDescriptor::new("A").import("B");
    let b = ModuleDescriptor::new("B").import("A");
    let err = ModuleGraphBuilder::new(&[a, b]).build("A").unwrap_err();
    match err {
        GraphError::CircularModuleImport { path } => {
            assert_eq!(path.join(" -> "), "A -> B -> A");
        }
        other => panic!("expected CircularModuleImport, got {other:?}"),
    }
}

/// Scenario 5 (adapted per spec.md §9's compiled-target guidance): tier 2
/// of the resolver -- looking a handler up through a live dynamic module
/// reference -- has no equivalent here. A handler id not registered at
/// build time is simply absent from the id table; there is no fallback
/// dynamic import to fall back to.
#[test]
fn unregistered_handler_ids_are_not_resolved_dynamically() {
    let module = orders_module();
    let graph = ModuleGraphBuilder::new(&[module]).build("orders").unwrap();
    let registry = HandlerRegistry::build(&graph);
    let resolver = HandlerResolver::new(&registry);

    assert!(resolver.by_id("orders.create").is_none());
    assert!(resolver.by_id("OrdersHandler.getOne").is_some());
}

struct Managed {
    id: &'static str,
    trail: Arc<parking_lot::Mutex<Vec<&'static str>>>,
    fail: bool,
}

impl celerity_core::ConventionalCloser for Managed {
    fn close(self: Arc<Self>) -> celerity_core::provider::BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async move {
            self.trail.lock().push(self.id);
            if self.fail {
                anyhow::bail!("{} refused to close", self.id);
            }
            Ok(())
        })
    }
}

/// Scenario 6: three independently-registered singletons are resolved
/// in order X, Y, Z; Y's closer fails, but `closeAll` still runs Z and X
/// and the failure is swallowed.
#[tokio::test]
async fn lifo_teardown_survives_a_failing_closer() {
    let trail = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let construct = |id: &'static str, fail: bool, trail: Arc<parking_lot::Mutex<Vec<&'static str>>>| -> ConstructFn {
        Arc::new(move |_deps| {
            let trail = trail.clone();
            Box::pin(async move { Ok(Arc::new(Managed { id, trail, fail }) as Instance) })
        })
    };

    let module = ModuleDescriptor::new("root")
        .provide(
            InjectionToken::name("x"),
            Provider::class_with_auto_close::<Managed>(vec![], true, construct("x", false, trail.clone())),
        )
        .provide(
            InjectionToken::name("y"),
            Provider::class_with_auto_close::<Managed>(vec![], true, construct("y", true, trail.clone())),
        )
        .provide(
            InjectionToken::name("z"),
            Provider::class_with_auto_close::<Managed>(vec![], true, construct("z", false, trail.clone())),
        );
    let graph = ModuleGraphBuilder::new(&[module]).build("root").unwrap();
    let container = Container::build(&graph);

    container.resolve(&InjectionToken::name("x")).await.unwrap();
    container.resolve(&InjectionToken::name("y")).await.unwrap();
    container.resolve(&InjectionToken::name("z")).await.unwrap();

    container.close_all().await;

    assert_eq!(*trail.lock(), vec!["z", "y", "x"]);
}
