//! Error types for the state store and event log

use thiserror::Error;

/// Errors that can occur talking to the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Command or connection failure
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Stored data could not be decoded
    #[error("decode error for {key}: {source}")]
    Decode {
        /// Key holding the bad data
        key: String,
        #[source]
        source: sprout_api::DecodeError,
    },
}

impl StoreError {
    /// Whether the failure is about reaching the store rather than its data
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Redis(e) => {
                e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
            }
            StoreError::Decode { .. } => false,
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
