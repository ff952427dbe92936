//! Lifecycle events carried on the container event stream
//!
//! Stream entries are flat string maps. They are decoded once into
//! [`IntentEvent`] at the stream boundary; everything downstream matches on
//! the enum.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::record::{short_id, unix_timestamp};

pub const CONTAINER_CREATED: &str = "container_created";
pub const CONTAINER_DELETED: &str = "container_deleted";
pub const CONTAINER_STATUS_UPDATE: &str = "container_status_update";

/// Image used when a creation intent names none
pub const DEFAULT_IMAGE: &str = "nginx:latest";

/// Payload of a `container_created` intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIntent {
    pub container_id: String,
    pub name: String,
    pub image: String,
    /// Creation time as written by the requester, passed through verbatim
    pub created_at: String,
}

/// A decoded stream entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentEvent {
    /// Materialize a workload for a new container
    ContainerCreated(CreateIntent),
    /// Tear down every workload belonging to a container
    ContainerDeleted { container_id: String },
    /// A status report written by a worker onto the same stream
    StatusUpdate { container_id: String, status: String },
    /// Known event type with an unusable payload
    Malformed { event_type: String, reason: String },
    /// Event type this worker does not know about
    Unknown { event_type: String },
}

impl IntentEvent {
    /// Decode a raw stream entry
    #[must_use]
    pub fn decode(fields: &HashMap<String, String>) -> Self {
        let event_type = fields.get("event_type").map_or("", String::as_str);
        let container_id = fields
            .get("container_id")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());

        let non_empty = |key: &str| {
            fields
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
        };

        match (event_type, container_id) {
            (CONTAINER_CREATED, Some(id)) => IntentEvent::ContainerCreated(CreateIntent {
                container_id: id.to_string(),
                name: non_empty("name").unwrap_or_else(|| format!("container-{}", short_id(id))),
                image: non_empty("image").unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
                created_at: fields.get("created_at").cloned().unwrap_or_default(),
            }),
            (CONTAINER_DELETED, Some(id)) => IntentEvent::ContainerDeleted {
                container_id: id.to_string(),
            },
            (CONTAINER_STATUS_UPDATE, Some(id)) => IntentEvent::StatusUpdate {
                container_id: id.to_string(),
                status: fields.get("status").cloned().unwrap_or_default(),
            },
            (CONTAINER_CREATED | CONTAINER_DELETED | CONTAINER_STATUS_UPDATE, None) => {
                IntentEvent::Malformed {
                    event_type: event_type.to_string(),
                    reason: "missing container_id".to_string(),
                }
            }
            (other, _) => IntentEvent::Unknown {
                event_type: other.to_string(),
            },
        }
    }

    /// Event type tag as it appeared on the stream
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            IntentEvent::ContainerCreated(_) => CONTAINER_CREATED,
            IntentEvent::ContainerDeleted { .. } => CONTAINER_DELETED,
            IntentEvent::StatusUpdate { .. } => CONTAINER_STATUS_UPDATE,
            IntentEvent::Malformed { event_type, .. } | IntentEvent::Unknown { event_type } => {
                event_type
            }
        }
    }

    /// Container the event refers to, if any
    #[must_use]
    pub fn container_id(&self) -> Option<&str> {
        match self {
            IntentEvent::ContainerCreated(intent) => Some(&intent.container_id),
            IntentEvent::ContainerDeleted { container_id }
            | IntentEvent::StatusUpdate { container_id, .. } => Some(container_id),
            IntentEvent::Malformed { .. } | IntentEvent::Unknown { .. } => None,
        }
    }
}

/// Status carried by a `container_status_update` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedStatus {
    Running,
    Failed,
    Deleted,
    DeletionFailed,
}

impl ReportedStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReportedStatus::Running => "running",
            ReportedStatus::Failed => "failed",
            ReportedStatus::Deleted => "deleted",
            ReportedStatus::DeletionFailed => "deletion_failed",
        }
    }
}

/// Outcome report appended to the stream after an intent is processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub container_id: String,
    pub status: ReportedStatus,
    pub pod_name: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(container_id: impl Into<String>, status: ReportedStatus) -> Self {
        Self {
            container_id: container_id.into(),
            status,
            pod_name: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_pod_name(mut self, pod_name: impl Into<String>) -> Self {
        self.pod_name = Some(pod_name.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Flatten into stream entry fields
    #[must_use]
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("event_type", CONTAINER_STATUS_UPDATE.to_string()),
            ("container_id", self.container_id.clone()),
            ("status", self.status.as_str().to_string()),
        ];
        if let Some(pod_name) = &self.pod_name {
            fields.push(("pod_name", pod_name.clone()));
        }
        if let Some(error) = &self.error {
            fields.push(("error", error.clone()));
        }
        fields.push(("timestamp", unix_timestamp(self.timestamp)));
        fields
    }
}
