//! Celerity core: module graph resolution, dependency injection, the
//! composable layer pipeline, request dispatch, and the manifest
//! extractor that together assemble a set of declaratively described
//! modules into a running handler graph.
//!
//! This crate owns the in-process assembly and request-dispatch engine
//! only. Cloud adapters, telemetry emission, concrete request-schema
//! engines, config-store backends, a CLI entry point, network I/O, wire
//! protocol parsing and scheduling all live outside it -- see
//! SPEC_FULL.md and DESIGN.md.

pub mod bootstrap;
pub mod config;
pub mod container;
pub mod context;
pub mod contracts;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod handler;
pub mod http;
pub mod manifest;
pub mod pipeline;
pub mod provider;
pub mod router;
pub mod token;
pub mod validation;

pub use celerity_core_macros::{controller, handler as handler_fn, injectable, module};
pub use inventory;

pub use bootstrap::{discover_modules, ModuleRegistration};
pub use container::Container;
pub use context::HandlerContext;
pub use contracts::{
    ControllerDescriptor, ControllerMethodSpec, FunctionHandlerDescriptor, HttpVerb, Injectable, ModuleDescriptor,
    ParamSource, ProviderRegistration,
};
pub use dispatch::Dispatcher;
pub use error::{ContainerError, DispatchError, GraphError, HttpException, PipelineError, ValidationError};
pub use graph::{ModuleGraph, ModuleGraphBuilder, ModuleGraphValidator};
pub use handler::{HandlerRegistry, HandlerResolver, ResolvedHandler};
pub use http::{HttpRequest, HttpResponse};
pub use manifest::{Manifest, ManifestExtractor};
pub use pipeline::{Layer, LayerRef, Next};
pub use provider::{ConventionalCloser, Provider};
pub use router::match_route;
pub use token::InjectionToken;
