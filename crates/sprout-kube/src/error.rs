//! Error types for the orchestration client

use thiserror::Error;

/// Errors that can occur when talking to the orchestration platform
#[derive(Error, Debug)]
pub enum OrchestrationError {
    /// The platform answered with a non-2xx status
    #[error("K8s API Error: {status} - {reason}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Machine-readable reason (`AlreadyExists`, `Forbidden`, ...)
        reason: String,
        /// Human-readable message from the platform
        message: String,
    },

    /// HTTP transport failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Could not read cluster credentials
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File that could not be read
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Connection settings are incomplete or inconsistent
    #[error("configuration error: {0}")]
    Config(String),
}

impl OrchestrationError {
    /// Whether the platform reported the object as absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrchestrationError::Api { status: 404, .. })
    }

    /// Whether the platform rejected a create because the object exists
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, OrchestrationError::Api { status: 409, .. })
    }

    /// Whether a later attempt could succeed (transport, throttling, 5xx)
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            OrchestrationError::Api { status, .. } => *status == 429 || *status >= 500,
            OrchestrationError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// HTTP status if the platform answered at all
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            OrchestrationError::Api { status, .. } => Some(*status),
            OrchestrationError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Full diagnostic payload, kept alongside the short display form
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            OrchestrationError::Api {
                status,
                reason,
                message,
            } => format!("status={status} reason={reason} body={message}"),
            other => other.to_string(),
        }
    }
}

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;
