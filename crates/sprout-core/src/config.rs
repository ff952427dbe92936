//! Configuration for the reconciler and consumer loop

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::ErrorBackoff;

/// Reconciler behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Grace period passed with every workload delete
    #[serde(default = "default_grace_period")]
    pub delete_grace_period_secs: u32,
    /// Wait before re-reading a deleted workload to log its state (0 disables)
    #[serde(default = "default_verify_delay")]
    pub deletion_verify_delay_ms: u64,
    /// Look for an existing workload before creating one.
    ///
    /// Off by default: a redelivered create then collides with the workload
    /// it already made and the container is marked failed.
    #[serde(default)]
    pub adopt_existing_workloads: bool,
}

impl ReconcilerConfig {
    #[must_use]
    pub fn deletion_verify_delay(&self) -> Duration {
        Duration::from_millis(self.deletion_verify_delay_ms)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            delete_grace_period_secs: default_grace_period(),
            deletion_verify_delay_ms: default_verify_delay(),
            adopt_existing_workloads: false,
        }
    }
}

fn default_grace_period() -> u32 {
    30
}

fn default_verify_delay() -> u64 {
    1000
}

/// Consumer loop behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Consumer name within the group (defaults to `consumer-<pid>`)
    pub consumer_name: Option<String>,
    /// How long one read blocks waiting for an entry
    #[serde(default = "default_poll_block")]
    pub poll_block_ms: u64,
    /// Consecutive infrastructure errors before the loop gives up
    #[serde(default = "default_max_errors")]
    pub max_consecutive_errors: u32,
    /// Backoff grows by this much per consecutive error
    #[serde(default = "default_backoff_step")]
    pub backoff_step_secs: u64,
    /// Upper bound on a single backoff sleep
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_secs: u64,
}

impl ConsumerConfig {
    /// Resolved consumer name
    #[must_use]
    pub fn consumer_name(&self) -> String {
        self.consumer_name
            .clone()
            .unwrap_or_else(|| format!("consumer-{}", std::process::id()))
    }

    #[must_use]
    pub fn poll_block(&self) -> Duration {
        Duration::from_millis(self.poll_block_ms)
    }

    /// Fresh backoff tracker for these settings
    #[must_use]
    pub fn backoff(&self) -> ErrorBackoff {
        ErrorBackoff::new(
            self.max_consecutive_errors,
            Duration::from_secs(self.backoff_step_secs),
            Duration::from_secs(self.backoff_cap_secs),
        )
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            consumer_name: None,
            poll_block_ms: default_poll_block(),
            max_consecutive_errors: default_max_errors(),
            backoff_step_secs: default_backoff_step(),
            backoff_cap_secs: default_backoff_cap(),
        }
    }
}

fn default_poll_block() -> u64 {
    1000
}

fn default_max_errors() -> u32 {
    5
}

fn default_backoff_step() -> u64 {
    2
}

fn default_backoff_cap() -> u64 {
    30
}
