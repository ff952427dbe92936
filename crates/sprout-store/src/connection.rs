//! Shared Redis connection setup

use std::time::Duration;

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::{info, warn};

use crate::error::Result;

/// Headroom between a blocking stream read and the response timeout
pub const POLL_BLOCK_MARGIN: Duration = Duration::from_secs(1);

/// How to reach the store
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// `redis://` URL including credentials and database
    pub url: String,
    /// Connect timeout per attempt
    pub connection_timeout: Duration,
    /// Per-command response timeout; also bounds blocking stream reads
    pub response_timeout: Duration,
}

impl RedisSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
        }
    }

    /// Raise the response timeout so a blocking read of `poll_block` that
    /// returns nothing is not reported as a timeout
    #[must_use]
    pub fn covering_poll_block(mut self, poll_block: Duration) -> Self {
        let required = poll_block.saturating_add(POLL_BLOCK_MARGIN);
        if self.response_timeout < required {
            warn!(
                configured = ?self.response_timeout,
                poll_block = ?poll_block,
                effective = ?required,
                "response timeout too short for stream poll, raising it"
            );
            self.response_timeout = required;
        }
        self
    }
}

/// Open a reconnecting connection shared by the state store and event log
///
/// # Errors
/// Returns an error if the URL is invalid or the server cannot be reached.
pub async fn connect(settings: &RedisSettings) -> Result<ConnectionManager> {
    let client = redis::Client::open(settings.url.as_str())?;

    let config = ConnectionManagerConfig::new()
        .set_connection_timeout(Some(settings.connection_timeout))
        .set_response_timeout(Some(settings.response_timeout));

    let conn = ConnectionManager::new_with_config(client, config).await?;

    info!("connected to Redis");
    Ok(conn)
}
