//! Module Graph Validator (spec.md §4.C): computes, for every module, the
//! set of tokens visible to it (its own providers plus whatever its
//! direct imports export) and classifies every dependency edge that
//! falls outside that set.
//!
//! A dependency on a token the module neither owns nor sees through an
//! import is classified by the token's owner count, in order:
//!  1. visible -- owned by `module` itself, or owned by a direct import
//!     that exports it. No diagnostic.
//!  2. `ExportViolationNeedsImport` -- owned by exactly one module
//!     elsewhere in the graph, which exports the token, but `module`
//!     never imports that owner.
//!  3. `ExportViolationNeedsExport` -- owned by exactly one module that
//!     `module` already imports, but the owner never exports the token.
//!  4. auto-adopted -- the token is owned by *no* module anywhere in the
//!     graph, but it names a class. A class with no registered provider
//!     may always be implicitly constructed by the container (spec.md
//!     §4.D), so an unowned class dependency is not an error here; the
//!     container is the thing that actually has to make good on it.
//!  5. `MissingDependency` -- owned by zero modules and not a class
//!     token, or owned by more than one module (an ambiguous owner).
//!
//! Every diagnostic is collected rather than raised on the first
//! failure, so a caller sees the whole picture in one pass.

use std::collections::{HashMap, HashSet};

use crate::error::{Diagnostic, ValidationError};
use crate::token::InjectionToken;

use super::builder::ModuleGraph;

pub struct ModuleGraphValidator;

impl ModuleGraphValidator {
    pub fn validate(graph: &ModuleGraph) -> Result<(), ValidationError> {
        let mut diagnostics = Vec::new();

        let mut owners: HashMap<InjectionToken, Vec<usize>> = HashMap::new();
        for (idx, node) in graph.nodes.iter().enumerate() {
            for token in node.descriptor.owned_tokens() {
                owners.entry(token).or_default().push(idx);
            }
        }

        for (idx, node) in graph.nodes.iter().enumerate() {
            let owned: HashSet<InjectionToken> = node.descriptor.owned_tokens().into_iter().collect();

            let mut imported_visible: HashSet<InjectionToken> = HashSet::new();
            for &import_idx in &node.imports {
                let import_node = &graph.nodes[import_idx];
                let import_owned: HashSet<InjectionToken> =
                    import_node.descriptor.owned_tokens().into_iter().collect();
                for export_token in &import_node.descriptor.exports {
                    if import_owned.contains(export_token) {
                        imported_visible.insert(export_token.clone());
                    } else {
                        diagnostics.push(Diagnostic::DanglingExport(
                            import_node.descriptor.name.clone(),
                            export_token.render(),
                        ));
                    }
                }
            }

            for token in required_tokens(node) {
                if owned.contains(&token) || imported_visible.contains(&token) {
                    continue;
                }
                match owners.get(&token).map(|v| v.as_slice()) {
                    Some([owner_idx]) => {
                        let owner_descriptor = &graph.nodes[*owner_idx].descriptor;
                        if owner_descriptor.exports.contains(&token) {
                            // Exported, but this module never imports the owner.
                            diagnostics.push(Diagnostic::ExportViolationNeedsImport {
                                module: node.descriptor.name.clone(),
                                owner: owner_descriptor.name.clone(),
                                token: token.render(),
                            });
                        } else {
                            // Owned by a single module that never exports it,
                            // imported or not.
                            diagnostics.push(Diagnostic::ExportViolationNeedsExport {
                                module: node.descriptor.name.clone(),
                                owner: owner_descriptor.name.clone(),
                                token: token.render(),
                            });
                        }
                    }
                    Some(_) => diagnostics.push(Diagnostic::MissingDependency {
                        module: node.descriptor.name.clone(),
                        token: token.render(),
                    }),
                    None if token.is_class() => {
                        // No provider anywhere; the container may still
                        // construct it implicitly (spec.md §4.D).
                    }
                    None => diagnostics.push(Diagnostic::MissingDependency {
                        module: node.descriptor.name.clone(),
                        token: token.render(),
                    }),
                }
            }
            let _ = idx;
        }

        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Diagnostics(diagnostics))
        }
    }
}

fn required_tokens(node: &super::node::ModuleNode) -> Vec<InjectionToken> {
    let descriptor = &node.descriptor;
    let mut required = Vec::new();
    for p in &descriptor.providers {
        required.extend(p.provider.dependencies().iter().cloned());
    }
    for c in &descriptor.controllers {
        required.extend(c.deps.iter().cloned());
        required.extend(c.protected_by.iter().cloned());
        for m in &c.methods {
            required.extend(m.protected_by.iter().cloned());
        }
    }
    for f in &descriptor.function_handlers {
        required.extend(f.inject.iter().cloned());
        required.extend(f.protected_by.iter().cloned());
    }
    required
}
