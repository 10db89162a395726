//! Error vocabulary for graph resolution, validation, container wiring,
//! the layer pipeline and request dispatch. Shaped after the registry's
//! `RegistryError`: one `thiserror` enum per subsystem, each variant
//! carrying the identifiers a caller needs to act on the failure.

use thiserror::Error;

use crate::token::InjectionToken;

/// Failures raised while assembling the module graph (spec.md §4.B).
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("module '{0}' is imported more than once by the same module")]
    DuplicateImport(String),

    #[error("circular module import detected: {}", path.join(" -> "))]
    CircularModuleImport { path: Vec<String> },

    #[error("module '{0}' was referenced as an import but never registered")]
    UnknownModule(String),
}

/// A single validator finding, aggregated into `ValidationError::Diagnostics`
/// instead of failing fast, so a caller sees every problem at once
/// (spec.md §4.C).
#[derive(Debug, Clone, Error)]
pub enum Diagnostic {
    /// Owned by exactly one module, which exports it, but `module` never
    /// imports that owner (spec.md §4.C case 2).
    #[error("module '{module}' depends on token '{token}' owned by '{owner}'; add '{owner}' to '{module}'s imports")]
    ExportViolationNeedsImport {
        module: String,
        owner: String,
        token: String,
    },

    /// Owned by exactly one module, which `module` already imports, but
    /// the owner never exports it (spec.md §4.C case 3).
    #[error("module '{module}' depends on token '{token}' owned by '{owner}'; add '{token}' to '{owner}'s exports")]
    ExportViolationNeedsExport {
        module: String,
        owner: String,
        token: String,
    },

    #[error("token '{token}' required by module '{module}' is provided by nothing reachable from it")]
    MissingDependency { module: String, token: String },

    #[error("module '{0}' exports token '{1}' that it neither provides nor imports")]
    DanglingExport(String, String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{} validation diagnostic(s) found", .0.len())]
    Diagnostics(Vec<Diagnostic>),
}

/// Failures raised by the DI container (spec.md §4.D).
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("no provider registered for token '{0}'")]
    UnknownToken(String),

    #[error("circular dependency detected while resolving '{0}': {}", .path.join(" -> "))]
    CircularDependency { token: String, path: Vec<String> },

    #[error("token '{0}' resolves to a class provider lacking the injectable marker and takes dependencies; implicit construction is disallowed")]
    NotInjectable(String),

    #[error("constructor for token '{token}' failed")]
    ConstructionFailed {
        token: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ContainerError {
    pub fn unknown(token: &InjectionToken) -> Self {
        ContainerError::UnknownToken(token.render())
    }
}

/// Failures raised by the composable layer pipeline (spec.md §4.F).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("layer '{0}' called next() more than once for the same request")]
    NextCalledMultipleTimes(String),
}

/// A structured HTTP-shaped error a handler or layer can throw to have the
/// dispatcher translate it into a response without a 500 fallback
/// (spec.md §4.F/§4.G). Status/body are fixed at construction so that
/// layers downstream of `catch` can read them back out.
#[derive(Debug, Clone, Error)]
#[error("HTTP {status}: {message}")]
pub struct HttpException {
    pub status: u16,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HttpException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }
    pub fn payment_required(message: impl Into<String>) -> Self {
        Self::new(402, message)
    }
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(405, message)
    }
    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::new(406, message)
    }
    pub fn request_timeout(message: impl Into<String>) -> Self {
        Self::new(408, message)
    }
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, message)
    }
    pub fn gone(message: impl Into<String>) -> Self {
        Self::new(410, message)
    }
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(413, message)
    }
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(415, message)
    }
    pub fn unprocessable_entity(message: impl Into<String>) -> Self {
        Self::new(422, message)
    }
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(429, message)
    }
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(501, message)
    }
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(502, message)
    }
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(503, message)
    }
    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(504, message)
    }
}

/// Failures raised while dispatching a single request (spec.md §4.G).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler resolved for the request")]
    NoHandlerResolved,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("handler threw: {0}")]
    HttpException(#[from] HttpException),

    #[error("handler panicked or returned an unexpected error")]
    Unhandled(#[source] anyhow::Error),
}
