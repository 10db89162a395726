//! Composable layer pipeline with one-shot `next()` semantics
//! (spec.md §4.F).
//!
//! Layers compose outside-in: the first layer in the slice runs first and
//! controls whether (and when) control passes further in by calling
//! `next.call(ctx)`. Calling it a second time for the same step is a
//! `PipelineError::NextCalledMultipleTimes`, not a silent no-op -- mirroring
//! the source framework, where a layer invoking a one-shot `next` twice is
//! a bug, not a valid short-circuit idiom (use a direct return instead).

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::HandlerContext;
use crate::error::{DispatchError, PipelineError};
use crate::http::HttpResponse;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type DispatchOutcome = Result<(HandlerContext, HttpResponse), DispatchError>;

/// The terminal step a pipeline runs once every layer has called `next`:
/// ordinarily the controller method or function handler invocation.
pub type Terminal = Arc<dyn Fn(HandlerContext) -> BoxFuture<'static, DispatchOutcome> + Send + Sync>;

#[async_trait]
pub trait Layer: Send + Sync {
    /// Identifies the layer in diagnostics and in `NextCalledMultipleTimes`.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, ctx: HandlerContext, next: Next) -> DispatchOutcome;
}

pub type LayerRef = Arc<dyn Layer>;

/// Handed to a layer so it can invoke the remainder of the chain. Cloning
/// is cheap and intentional -- unlike a Rust closure consumed by move,
/// the handle can be called more than once, so the one-shot rule has to
/// be enforced at runtime rather than by the borrow checker, matching how
/// a callback-style `next()` behaves in the source framework.
#[derive(Clone)]
pub struct Next {
    layers: Arc<[LayerRef]>,
    index: usize,
    terminal: Terminal,
    used: Arc<AtomicBool>,
    layer_name: Arc<str>,
}

impl Next {
    pub async fn call(&self, ctx: HandlerContext) -> DispatchOutcome {
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::Pipeline(PipelineError::NextCalledMultipleTimes(
                self.layer_name.to_string(),
            )));
        }
        dispatch(self.layers.clone(), self.index, ctx, self.terminal.clone()).await
    }
}

fn dispatch(layers: Arc<[LayerRef]>, index: usize, ctx: HandlerContext, terminal: Terminal) -> BoxFuture<'static, DispatchOutcome> {
    Box::pin(async move {
        if index >= layers.len() {
            return (terminal)(ctx).await;
        }
        let layer = layers[index].clone();
        let layer_name: Arc<str> = Arc::from(layer.name());
        let next = Next {
            layers: layers.clone(),
            index: index + 1,
            terminal,
            used: Arc::new(AtomicBool::new(false)),
            layer_name,
        };
        layer.handle(ctx, next).await
    })
}

/// Runs a fully-concatenated layer chain (system ⧺ app ⧺ handler layers,
/// per spec.md §4.G) against a terminal step.
pub async fn run_pipeline(layers: Vec<LayerRef>, terminal: Terminal, ctx: HandlerContext) -> DispatchOutcome {
    dispatch(Arc::from(layers), 0, ctx, terminal).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::http::HttpRequest;

    fn blank_ctx() -> HandlerContext {
        HandlerContext::new(
            HttpRequest::new(Method::GET, "/x"),
            "h1",
            Arc::new(HashMap::new()),
            tracing::Span::none(),
        )
    }

    struct RecordingLayer {
        name: &'static str,
        trail: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Layer for RecordingLayer {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, ctx: HandlerContext, next: Next) -> DispatchOutcome {
            self.trail.lock().unwrap().push(self.name);
            next.call(ctx).await
        }
    }

    struct DoubleCallLayer;

    #[async_trait]
    impl Layer for DoubleCallLayer {
        async fn handle(&self, ctx: HandlerContext, next: Next) -> DispatchOutcome {
            let _ = next.call(ctx.clone()).await?;
            next.call(ctx).await
        }
    }

    fn ok_terminal() -> Terminal {
        Arc::new(|ctx| Box::pin(async move { Ok((ctx, HttpResponse::new(200))) }))
    }

    #[tokio::test]
    async fn layers_run_outside_in_before_the_terminal() {
        let trail = Arc::new(Mutex::new(Vec::new()));
        let layers: Vec<LayerRef> = vec![
            Arc::new(RecordingLayer {
                name: "outer",
                trail: trail.clone(),
            }),
            Arc::new(RecordingLayer {
                name: "inner",
                trail: trail.clone(),
            }),
        ];
        let (_, resp) = run_pipeline(layers, ok_terminal(), blank_ctx()).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(*trail.lock().unwrap(), vec!["outer", "inner"]);
    }

    struct WrappingLayer {
        name: &'static str,
        trail: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Layer for WrappingLayer {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, ctx: HandlerContext, next: Next) -> DispatchOutcome {
            self.trail.lock().unwrap().push(format!("{}-pre", self.name));
            let outcome = next.call(ctx).await;
            self.trail.lock().unwrap().push(format!("{}-post", self.name));
            outcome
        }
    }

    #[tokio::test]
    async fn code_after_next_unwinds_in_reverse_layer_order() {
        let trail = Arc::new(Mutex::new(Vec::new()));
        let layers: Vec<LayerRef> = vec![
            Arc::new(WrappingLayer { name: "a", trail: trail.clone() }),
            Arc::new(WrappingLayer { name: "b", trail: trail.clone() }),
            Arc::new(WrappingLayer { name: "c", trail: trail.clone() }),
        ];
        let (_, resp) = run_pipeline(layers, ok_terminal(), blank_ctx()).await.unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(
            *trail.lock().unwrap(),
            vec!["a-pre", "b-pre", "c-pre", "c-post", "b-post", "a-post"]
        );
    }

    #[tokio::test]
    async fn calling_next_twice_is_an_error() {
        let layers: Vec<LayerRef> = vec![Arc::new(DoubleCallLayer)];
        let err = run_pipeline(layers, ok_terminal(), blank_ctx()).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Pipeline(PipelineError::NextCalledMultipleTimes(_))
        ));
    }

    #[tokio::test]
    async fn a_layer_can_short_circuit_without_calling_next() {
        struct ShortCircuit;
        #[async_trait]
        impl Layer for ShortCircuit {
            async fn handle(&self, ctx: HandlerContext, _next: Next) -> DispatchOutcome {
                Ok((ctx, HttpResponse::new(401)))
            }
        }
        let layers: Vec<LayerRef> = vec![Arc::new(ShortCircuit), Arc::new(DoubleCallLayer)];
        let (_, resp) = run_pipeline(layers, ok_terminal(), blank_ctx()).await.unwrap();
        assert_eq!(resp.status, 401);
    }
}
