//! Whole-application module discovery: an `inventory`-collected registry
//! of `#[module(...)]`-decorated functions, mirroring the host
//! framework's own decoration-time `Registrator` pattern so a deployment
//! can assemble its module graph without a hand-maintained list of every
//! module in the binary.

use crate::contracts::ModuleDescriptor;

/// One registered module constructor, submitted by the `#[module(...)]`
/// macro via `inventory::submit!`.
pub struct ModuleRegistration(pub fn() -> ModuleDescriptor);

inventory::collect!(ModuleRegistration);

/// Every module registered anywhere in the current binary, in
/// inventory's (unspecified, link-order-dependent) iteration order.
/// Callers that need a deterministic graph pass the resulting
/// descriptors to `ModuleGraphBuilder`, which only cares about reachable
/// names, not registration order.
pub fn discover_modules() -> Vec<ModuleDescriptor> {
    inventory::iter::<ModuleRegistration>().map(|r| (r.0)()).collect()
}

/// Discovery-surface environment variable names for the runtime
/// orchestrator contract (spec.md §6). Reading these is the host's job;
/// this crate does no process/env I/O of its own.
pub mod env {
    /// Where the host looks for module source files/descriptors.
    pub const MODULE_PATH: &str = "CELERITY_MODULE_PATH";
    /// The handler id the host is invoking this process for.
    pub const HANDLER_ID: &str = "CELERITY_HANDLER_ID";
}
