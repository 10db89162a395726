//! Ambient configuration seam (spec.md Non-goals: no config-store
//! backend ships here). Shaped after `ConfigProvider` from the bootstrap
//! layer this crate is drawn from: a narrow trait a host wires to
//! whatever backend it runs (env vars, a file, a remote store), queried
//! by module name and by raw key.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration found for module '{0}'")]
    MissingModuleConfig(String),

    #[error("no configuration value found for key '{0}'")]
    MissingKey(String),

    #[error("configuration value for '{key}' could not be deserialised")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Implemented by the host, not by this crate -- celerity-core only
/// defines the seam a module can be handed at wiring time.
pub trait ConfigStore: Send + Sync {
    fn get_module_config(&self, module_name: &str) -> Result<serde_json::Value, ConfigError>;
    fn get_raw(&self, key: &str) -> Result<serde_json::Value, ConfigError>;
}

/// Discovery-surface environment variable names for the config backend
/// contract (spec.md §6). This crate does no process/env I/O itself --
/// per spec.md §1 that belongs to the host -- these constants exist so a
/// host and this crate's tests agree on spelling rather than repeating
/// the literal strings at every call site.
pub mod env {
    /// Id of the config store to fetch from.
    pub const CONFIG_STORE_ID: &str = "CELERITY_CONFIG_STORE_ID";
    /// Which kind of config store backend to use.
    pub const CONFIG_STORE_KIND: &str = "CELERITY_CONFIG_STORE_KIND";
    /// Refresh interval in milliseconds; `"0"` means never refresh, absence
    /// means the backend's own default (spec.md §6).
    pub const CONFIG_REFRESH_INTERVAL_MS: &str = "CELERITY_CONFIG_REFRESH_INTERVAL_MS";
    /// The host runtime identifier (e.g. which compute platform is hosting
    /// the process).
    pub const RUNTIME: &str = "CELERITY_RUNTIME";
    /// The cloud platform identifier.
    pub const PLATFORM: &str = "CELERITY_PLATFORM";

    /// Builds the namespaced per-store override name
    /// `CELERITY_CONFIG_<NAMESPACE>_STORE_ID` (spec.md §6), upper-casing
    /// the namespace the way every other constant here is upper-cased.
    pub fn namespaced_store_id(namespace: &str) -> String {
        format!("CELERITY_CONFIG_{}_STORE_ID", namespace.to_uppercase())
    }
}
