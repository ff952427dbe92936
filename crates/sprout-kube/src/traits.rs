//! Orchestrator trait

use async_trait::async_trait;
use sprout_api::CreateIntent;

use crate::error::Result;

/// A workload as observed on the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub name: String,
    pub uid: String,
    pub namespace: String,
    /// Set once the platform has started terminating the workload
    pub deletion_timestamp: Option<String>,
}

impl Workload {
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Namespace this orchestrator manages
    fn namespace(&self) -> &str;

    /// Create the workload backing a container. No retries.
    async fn create_workload(&self, intent: &CreateIntent) -> Result<Workload>;

    /// Workloads labelled with `container-id=<id>`; empty when none match
    async fn find_workloads_by_container_id(&self, container_id: &str) -> Result<Vec<Workload>>;

    /// Read a workload by name; `Ok(None)` when it does not exist
    async fn read_workload(&self, name: &str) -> Result<Option<Workload>>;

    /// Graceful delete with background propagation; not-found is success
    async fn delete_workload(&self, name: &str, grace_period_seconds: u32) -> Result<()>;

    /// Cheap reachability check
    async fn ping(&self) -> Result<()>;
}
