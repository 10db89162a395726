//! A module after its imports have been resolved into graph indices.

use std::sync::Arc;

use crate::contracts::ModuleDescriptor;

#[derive(Clone)]
pub struct ModuleNode {
    pub descriptor: Arc<ModuleDescriptor>,
    /// Indices into the owning `ModuleGraph::nodes`, one per import, in
    /// declaration order.
    pub imports: Vec<usize>,
}
