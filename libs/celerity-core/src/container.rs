//! Dependency Injection Container (spec.md §4.D): a flat, whole-graph
//! token -> provider map with lazy singleton construction, resolving-set
//! cycle detection and a LIFO close stack.
//!
//! The provider map is flattened across every module in the graph rather
//! than scoped per-module. Visibility -- whether a module is *allowed* to
//! depend on a token -- is entirely the graph validator's concern
//! (spec.md §4.C); once a graph has passed validation, every token it
//! accepted (including ones auto-adopted from elsewhere in the graph) is
//! uniformly resolvable here. This is the locked reading of the
//! auto-adoption open question recorded in DESIGN.md: a client that
//! cleared validation never hits `NotInjectable` or `UnknownToken` for a
//! token the validator already accepted.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::ContainerError;
use crate::graph::ModuleGraph;
use crate::provider::{ConstructFn, ImplicitConstructorRegistration, Instance, Provider};
use crate::token::{ClassId, InjectionToken};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct Container {
    providers: HashMap<InjectionToken, Arc<Provider>>,
    /// Zero-dependency constructors for classes no module ever registered
    /// a provider for, collected from every `inventory::submit!`'d
    /// `ImplicitConstructorRegistration` in the binary (spec.md §4.D).
    implicit_constructors: HashMap<ClassId, ConstructFn>,
    cache: DashMap<InjectionToken, Instance>,
    /// Construction order, oldest first; closed in reverse (spec.md §4.D).
    close_order: Mutex<Vec<InjectionToken>>,
}

impl Container {
    /// Flattens every provider owned by every module in the graph
    /// (including one implicit class provider per controller, keyed under
    /// its own class token) into a single resolvable map. A token owned by
    /// more than one module keeps its first registration in graph order
    /// and logs the conflict -- the validator is expected to have already
    /// surfaced this as a `MissingDependency`/ambiguity diagnostic upstream
    /// of container construction.
    pub fn build(graph: &ModuleGraph) -> Self {
        let mut providers = HashMap::new();
        for node in &graph.nodes {
            for registration in &node.descriptor.providers {
                insert_or_warn(&mut providers, registration.token.clone(), Arc::new(registration.provider.clone()));
            }
            for controller in &node.descriptor.controllers {
                let provider = Provider::Class(crate::provider::ClassProvider {
                    class: controller.class,
                    deps: controller.deps.clone(),
                    construct: controller.construct.clone(),
                    on_close: None,
                    injectable: controller.injectable,
                });
                insert_or_warn(&mut providers, controller.token(), Arc::new(provider));
            }
        }
        let implicit_constructors = inventory::iter::<ImplicitConstructorRegistration>()
            .map(|r| (r.class, r.construct.clone()))
            .collect();
        Self {
            providers,
            implicit_constructors,
            cache: DashMap::new(),
            close_order: Mutex::new(Vec::new()),
        }
    }

    pub fn has(&self, token: &InjectionToken) -> bool {
        self.providers.contains_key(token)
    }

    pub async fn resolve(&self, token: &InjectionToken) -> Result<Instance, ContainerError> {
        self.resolve_inner(token.clone(), Vec::new()).await
    }

    fn resolve_inner(&self, token: InjectionToken, path: Vec<InjectionToken>) -> BoxFuture<'_, Result<Instance, ContainerError>> {
        Box::pin(async move {
            if let Some(existing) = self.cache.get(&token) {
                return Ok(existing.clone());
            }
            if path.contains(&token) {
                let mut cycle = path.clone();
                cycle.push(token.clone());
                return Err(ContainerError::CircularDependency {
                    token: token.render(),
                    path: cycle.iter().map(|t| t.render()).collect(),
                });
            }
            let provider = match self.providers.get(&token).cloned() {
                Some(provider) => provider,
                None => {
                    // No provider registered anywhere; a class with no
                    // declared dependencies may still be implicitly
                    // constructed (spec.md §4.D). Anything else -- a
                    // string/symbol token, or a class the registry has no
                    // zero-arg constructor for -- is unresolvable.
                    let class = token.as_class().ok_or_else(|| ContainerError::unknown(&token))?;
                    let construct = self
                        .implicit_constructors
                        .get(class)
                        .cloned()
                        .ok_or_else(|| ContainerError::NotInjectable(token.render()))?;
                    let instance = construct(Vec::new()).await.map_err(|source| ContainerError::ConstructionFailed {
                        token: token.render(),
                        source,
                    })?;
                    self.cache.insert(token.clone(), instance.clone());
                    self.close_order.lock().push(token.clone());
                    tracing::debug!(token = %token, "implicitly constructed");
                    return Ok(instance);
                }
            };

            let mut next_path = path;
            next_path.push(token.clone());

            let instance = match provider.as_ref() {
                Provider::Value(v) => v.value.clone(),
                Provider::Class(c) => {
                    if !c.injectable && !c.deps.is_empty() {
                        return Err(ContainerError::NotInjectable(token.render()));
                    }
                    let mut args = Vec::with_capacity(c.deps.len());
                    for dep in &c.deps {
                        args.push(self.resolve_inner(dep.clone(), next_path.clone()).await?);
                    }
                    (c.construct)(args).await.map_err(|source| ContainerError::ConstructionFailed {
                        token: token.render(),
                        source,
                    })?
                }
                Provider::Factory(f) => {
                    let mut args = Vec::with_capacity(f.inject.len());
                    for dep in &f.inject {
                        args.push(self.resolve_inner(dep.clone(), next_path.clone()).await?);
                    }
                    (f.construct)(args).await.map_err(|source| ContainerError::ConstructionFailed {
                        token: token.render(),
                        source,
                    })?
                }
            };

            self.cache.insert(token.clone(), instance.clone());
            self.close_order.lock().push(token.clone());
            tracing::debug!(token = %token, "resolved singleton");
            Ok(instance)
        })
    }

    /// Closes every constructed singleton in reverse construction order,
    /// swallowing individual failures so one misbehaving closer does not
    /// prevent the rest from running (spec.md §4.D).
    pub async fn close_all(&self) {
        let order: Vec<InjectionToken> = {
            let mut guard = self.close_order.lock();
            std::mem::take(&mut *guard).into_iter().rev().collect()
        };
        for token in order {
            let Some(provider) = self.providers.get(&token) else {
                continue;
            };
            let Some(closer) = provider.on_close() else {
                continue;
            };
            let Some(instance) = self.cache.get(&token).map(|r| r.clone()) else {
                continue;
            };
            if let Err(err) = closer(instance).await {
                warn!(token = %token, error = %err, "provider close failed");
            }
        }
        self.cache.clear();
    }

    /// Walks every registered provider's declared dependencies without
    /// constructing anything, surfacing `UnknownToken` for a dependency
    /// with no provider anywhere in the flattened map. Used as an
    /// auxiliary pre-flight pass distinct from (and cheaper than) actually
    /// resolving the graph.
    pub fn validate_dependencies(&self) -> Result<(), Vec<ContainerError>> {
        let mut errors = Vec::new();
        for provider in self.providers.values() {
            for dep in provider.dependencies() {
                if !self.providers.contains_key(dep) {
                    errors.push(ContainerError::unknown(dep));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn insert_or_warn(providers: &mut HashMap<InjectionToken, Arc<Provider>>, token: InjectionToken, provider: Arc<Provider>) {
    if providers.contains_key(&token) {
        warn!(token = %token, "token provided by more than one module; keeping the first registration");
        return;
    }
    providers.insert(token, provider);
}
