//! Module Graph Builder (spec.md §4.B): a DFS over declared imports
//! starting at a root module, tracking "resolving" (on the current DFS
//! stack) and "done" (fully resolved, assigned an index) sets so a
//! repeated import of an already-resolved module is a cache hit rather
//! than re-work, and an import back onto the current stack is reported
//! as `GraphError::CircularModuleImport` with the full cycle path --
//! mirroring the DFS-with-path cycle detector in the registry's
//! `detect_cycle_with_path`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::contracts::ModuleDescriptor;
use crate::error::GraphError;

use super::node::ModuleNode;

/// The resolved module graph: nodes ordered so that every import appears
/// before the module that imports it (dependency-first / reverse
/// topological order), ready for validation and container flattening.
pub struct ModuleGraph {
    pub nodes: Vec<ModuleNode>,
    name_index: HashMap<String, usize>,
    pub root: usize,
}

impl ModuleGraph {
    pub fn get(&self, name: &str) -> Option<&ModuleNode> {
        self.name_index.get(name).map(|&idx| &self.nodes[idx])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    pub fn root_node(&self) -> &ModuleNode {
        &self.nodes[self.root]
    }
}

pub struct ModuleGraphBuilder<'a> {
    available: HashMap<String, &'a ModuleDescriptor>,
}

impl<'a> ModuleGraphBuilder<'a> {
    /// `modules` is the full set of declaratively registered modules this
    /// process knows about; `build` walks only the subset reachable from
    /// `root`.
    pub fn new(modules: &'a [ModuleDescriptor]) -> Self {
        let available = modules.iter().map(|m| (m.name.clone(), m)).collect();
        Self { available }
    }

    pub fn build(&self, root: &str) -> Result<ModuleGraph, GraphError> {
        let mut resolving = HashSet::new();
        let mut done = HashMap::new();
        let mut nodes = Vec::new();
        let mut path = Vec::new();
        let root_idx = self.visit(root, &mut resolving, &mut done, &mut nodes, &mut path)?;
        Ok(ModuleGraph {
            nodes,
            name_index: done,
            root: root_idx,
        })
    }

    fn visit(
        &self,
        name: &str,
        resolving: &mut HashSet<String>,
        done: &mut HashMap<String, usize>,
        nodes: &mut Vec<ModuleNode>,
        path: &mut Vec<String>,
    ) -> Result<usize, GraphError> {
        if let Some(&idx) = done.get(name) {
            return Ok(idx);
        }
        if resolving.contains(name) {
            let mut cycle = path.clone();
            cycle.push(name.to_string());
            return Err(GraphError::CircularModuleImport { path: cycle });
        }

        let descriptor = self
            .available
            .get(name)
            .ok_or_else(|| GraphError::UnknownModule(name.to_string()))?;

        let mut seen_imports = HashSet::new();
        for import_name in &descriptor.imports {
            if !seen_imports.insert(import_name.clone()) {
                return Err(GraphError::DuplicateImport(import_name.clone()));
            }
        }

        resolving.insert(name.to_string());
        path.push(name.to_string());

        // Imports are resolved (and land in `nodes`) before this module's
        // own entry is appended, so dependencies always precede dependents.
        let mut import_indices = Vec::with_capacity(descriptor.imports.len());
        for import_name in &descriptor.imports {
            let idx = self.visit(import_name, resolving, done, nodes, path)?;
            import_indices.push(idx);
        }

        path.pop();
        resolving.remove(name);

        nodes.push(ModuleNode {
            descriptor: Arc::new((*descriptor).clone()),
            imports: import_indices,
        });
        let idx = nodes.len() - 1;
        done.insert(name.to_string(), idx);
        Ok(idx)
    }
}
