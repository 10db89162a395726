//! Handler Resolver (spec.md §4.H): looks a handler up by id, by dynamic
//! module reference, or by route.
//!
//! Tier 2 (resolving a handler through a *dynamic* module reference --
//! `import(moduleSpecifier)` at request time) has no equivalent in a
//! compiled target: there is no dynamic module table to index at
//! runtime. Per spec.md §9's own guidance for compiled targets, this tier
//! is dropped and replaced with `HandlerIdTable`, a static id -> handler
//! index built once from the registry's flattened list at bootstrap. See
//! DESIGN.md for the full rationale.

use std::collections::HashMap;

use crate::contracts::HttpVerb;

use super::registry::{HandlerRegistry, ResolvedHandler};

/// A static, O(1) id -> handler index built once at bootstrap, standing
/// in for the dynamic module-reference tier the source framework offers
/// at request time (spec.md §4.H tier 2, dropped per the redesign note
/// above).
pub struct HandlerIdTable {
    by_id: HashMap<String, usize>,
}

impl HandlerIdTable {
    pub fn build(registry: &HandlerRegistry) -> Self {
        let by_id = registry
            .all()
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.id.clone(), idx))
            .collect();
        Self { by_id }
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }
}

pub struct HandlerResolver<'a> {
    registry: &'a HandlerRegistry,
    id_table: HandlerIdTable,
}

impl<'a> HandlerResolver<'a> {
    pub fn new(registry: &'a HandlerRegistry) -> Self {
        Self {
            id_table: HandlerIdTable::build(registry),
            registry,
        }
    }

    /// Tier 1: resolve by the handler's stable id.
    pub fn by_id(&self, id: &str) -> Option<&'a ResolvedHandler> {
        let idx = self.id_table.index_of(id)?;
        self.registry.all().get(idx)
    }

    /// Tier 3: resolve by verb + concrete route path, returning the
    /// handler and its extracted `{name}` path parameters.
    pub fn by_route(&self, verb: HttpVerb, path: &str) -> Option<(&'a ResolvedHandler, HashMap<String, String>)> {
        self.registry.by_route(verb, path)
    }
}
