//! Decode errors for stored records and stream payloads

use thiserror::Error;

/// Errors raised while decoding flat string fields into typed values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Status field holds a value outside the known lifecycle
    #[error("unknown container status: {0}")]
    UnknownStatus(String),
}
