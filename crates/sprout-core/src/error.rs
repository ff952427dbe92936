//! Core error types for sprout-core

use sprout_kube::OrchestrationError;
use sprout_store::StoreError;
use thiserror::Error;

/// Unexpected faults while reconciling one event
///
/// Platform rejections are not errors at this level; they are recorded on the
/// container and reported as a failed outcome.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Writing the outcome to the state store failed
    #[error("state store error: {0}")]
    Store(#[from] StoreError),
}

/// Reasons the consumer loop stops with an error
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// The event log kept failing
    #[error("{count} consecutive event log errors, last: {last}")]
    TooManyFailures {
        /// Consecutive failures observed
        count: u32,
        /// Last error message
        last: String,
    },
}

/// Startup checks that must pass before consuming
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// State store did not answer
    #[error("state store unreachable: {0}")]
    StoreUnreachable(#[source] StoreError),

    /// Orchestration platform did not answer
    #[error("orchestration platform unreachable: {0}")]
    OrchestratorUnreachable(#[source] OrchestrationError),

    /// Consumer group could not be created
    #[error("failed to create consumer group: {0}")]
    GroupCreation(#[source] StoreError),
}
