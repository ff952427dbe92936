//! State store and event log traits

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sprout_api::ContainerRecord;

use crate::error::Result;

/// Latest known record per container
///
/// Every operation is a single round-trip; callers decide about retries.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Record for a container, `None` if there is none
    async fn get(&self, container_id: &str) -> Result<Option<ContainerRecord>>;

    /// Merge the set fields of `record` into the stored one, creating it if absent
    async fn upsert(&self, record: &ContainerRecord) -> Result<()>;

    /// Remove the record entirely; absent records are not an error
    async fn delete(&self, container_id: &str) -> Result<()>;

    /// Reachability check
    async fn ping(&self) -> Result<()>;
}

/// One delivered stream entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Server-assigned, monotonically increasing id used for acknowledgment
    pub id: String,
    pub fields: HashMap<String, String>,
}

/// Result of the idempotent consumer group creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Created,
    AlreadyExists,
}

/// Consumer-group access to the container event stream
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Stream name
    fn stream(&self) -> &str;

    /// Consumer group name
    fn group(&self) -> &str;

    /// Number of entries, `None` if the stream does not exist yet
    async fn stream_length(&self) -> Result<Option<u64>>;

    /// Create the group at the start of the stream, creating the stream too
    async fn ensure_group(&self) -> Result<GroupStatus>;

    /// Blocking read of at most one never-delivered entry for this group
    async fn read_next(&self, consumer: &str, block: Duration) -> Result<Option<StreamEntry>>;

    /// Acknowledge an entry, removing it from the group's pending list
    async fn ack(&self, entry_id: &str) -> Result<()>;

    /// Append an entry, trimming the stream to its configured length
    async fn append(&self, fields: &[(&'static str, String)]) -> Result<String>;
}
