//! Startup health gate
//!
//! Confirms the state store and orchestration platform answer, reports on
//! the stream, and makes sure the consumer group exists before consuming.

use tracing::{error, info, warn};

use sprout_kube::Orchestrator;
use sprout_store::{EventLog, GroupStatus, StateStore};

use crate::error::BootstrapError;

/// What the health gate found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Stream length before group creation, `None` if it did not exist
    pub stream_length: Option<u64>,
    pub group: GroupStatus,
}

/// Run the startup checks in order
///
/// # Errors
/// Returns `BootstrapError` if the store or platform is unreachable or the
/// consumer group cannot be created.
pub async fn run_health_checks(
    store: &dyn StateStore,
    orchestrator: &dyn Orchestrator,
    events: &dyn EventLog,
) -> Result<HealthReport, BootstrapError> {
    info!("performing health checks");

    if let Err(e) = store.ping().await {
        error!(error = %e, "state store: FAILED");
        return Err(BootstrapError::StoreUnreachable(e));
    }
    info!("state store: OK");

    if let Err(e) = orchestrator.ping().await {
        error!(error = %e, "orchestration platform: FAILED");
        return Err(BootstrapError::OrchestratorUnreachable(e));
    }
    info!(namespace = %orchestrator.namespace(), "orchestration platform: OK");

    let stream_length = match events.stream_length().await {
        Ok(Some(len)) => {
            info!(stream = %events.stream(), length = len, "event stream: OK");
            Some(len)
        }
        Ok(None) => {
            warn!(stream = %events.stream(), "event stream not found, will be created");
            None
        }
        Err(e) => {
            warn!(stream = %events.stream(), error = %e, "could not inspect event stream");
            None
        }
    };

    let group = events
        .ensure_group()
        .await
        .map_err(BootstrapError::GroupCreation)?;
    match group {
        GroupStatus::Created => info!(group = %events.group(), "created consumer group"),
        GroupStatus::AlreadyExists => {
            info!(group = %events.group(), "consumer group already exists");
        }
    }

    info!("health checks completed");
    Ok(HealthReport {
        stream_length,
        group,
    })
}
