//! Error types for port operations.

use std::fmt;

use roundtable_domain::Backend;

/// A capability a provider adapter may lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Streaming,
    Sync,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Streaming => f.write_str("streaming"),
            Capability::Sync => f.write_str("synchronous calls"),
        }
    }
}

/// Failure of one provider invocation.
///
/// Carries the backend plus the raw status/text the provider returned, so a
/// turn-scoped error event can tell the user what actually happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Connection refused, DNS failure, reset mid-body...
    #[error("{backend} request failed: {message}")]
    Transport { backend: Backend, message: String },

    #[error("{backend} returned HTTP {status}: {body}")]
    Status {
        backend: Backend,
        status: u16,
        body: String,
    },

    #[error("{backend} returned an empty response")]
    EmptyBody { backend: Backend },

    /// The provider envelope could not be decoded, or carried an error object.
    #[error("invalid {backend} response: {message}")]
    InvalidResponse { backend: Backend, message: String },

    #[error("{backend} does not support {capability}")]
    Unsupported {
        backend: Backend,
        capability: Capability,
    },

    #[error("{backend} is not configured: {message}")]
    NotConfigured { backend: Backend, message: String },
}

impl ProviderError {
    pub fn transport(backend: Backend, message: impl ToString) -> Self {
        Self::Transport {
            backend,
            message: message.to_string(),
        }
    }

    pub fn invalid_response(backend: Backend, message: impl ToString) -> Self {
        Self::InvalidResponse {
            backend,
            message: message.to_string(),
        }
    }

    pub fn unsupported(backend: Backend, capability: Capability) -> Self {
        Self::Unsupported {
            backend,
            capability,
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            Self::Transport { backend, .. }
            | Self::Status { backend, .. }
            | Self::EmptyBody { backend }
            | Self::InvalidResponse { backend, .. }
            | Self::Unsupported { backend, .. }
            | Self::NotConfigured { backend, .. } => *backend,
        }
    }

    /// Transient failures worth another attempt: transport errors,
    /// rate limiting and server-side statuses.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Scenario catalogue errors.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioRepoError {
    #[error("Scenario not found: {0}")]
    NotFound(String),

    /// Ids are directory names; anything that could escape the catalogue root is refused.
    #[error("Invalid scenario id: {0}")]
    InvalidId(String),

    #[error("Failed to read scenario {id}: {message}")]
    Io { id: String, message: String },

    #[error("Scenario {id} is not valid JSON: {message}")]
    Parse { id: String, message: String },
}
