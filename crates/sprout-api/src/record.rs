//! Container records and their lifecycle status

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::DecodeError;

/// Lifecycle status of a container record
///
/// A successfully deleted container has no record at all, so "deleted" is
/// represented by the absence of a status rather than a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerStatus {
    Pending,
    Running,
    Failed,
    DeletionFailed,
}

impl ContainerStatus {
    /// Wire representation stored in the `status` field
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerStatus::Pending => "pending",
            ContainerStatus::Running => "running",
            ContainerStatus::Failed => "failed",
            ContainerStatus::DeletionFailed => "deletion_failed",
        }
    }

    /// Whether moving to `next` follows the container lifecycle.
    ///
    /// `None` stands for the record being removed.
    #[must_use]
    pub fn can_transition_to(self, next: Option<ContainerStatus>) -> bool {
        use ContainerStatus::{DeletionFailed, Failed, Pending, Running};

        matches!(
            (self, next),
            (Pending, Some(Running | Failed))
                | (Running, None | Some(DeletionFailed))
                | (DeletionFailed, None | Some(DeletionFailed))
        )
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerStatus {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ContainerStatus::Pending),
            "running" => Ok(ContainerStatus::Running),
            "failed" => Ok(ContainerStatus::Failed),
            "deletion_failed" => Ok(ContainerStatus::DeletionFailed),
            other => Err(DecodeError::UnknownStatus(other.to_string())),
        }
    }
}

/// Latest known state of one container
///
/// Doubles as a partial update: only fields that are `Some` are written when
/// the record is merged into the store, everything else is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRecord {
    /// Opaque container identifier
    pub id: String,
    /// Display name requested by the client
    pub name: Option<String>,
    /// Image reference
    pub image: Option<String>,
    /// Lifecycle status
    pub status: Option<ContainerStatus>,
    /// Workload name assigned once running
    pub pod_name: Option<String>,
    /// Owning namespace
    pub namespace: Option<String>,
    /// Workload UID assigned by the platform
    pub uid: Option<String>,
    /// Creation timestamp as supplied by the requester
    pub created_at: Option<String>,
    /// Short error description
    pub error: Option<String>,
    /// Full diagnostic payload for the last failure
    pub error_details: Option<String>,
    /// Unix timestamp of the last failure
    pub failed_at: Option<String>,
}

impl ContainerRecord {
    /// Create an update touching only the `id` field
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: ContainerStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the workload placement (pod name, UID and namespace)
    #[must_use]
    pub fn with_workload(
        mut self,
        pod_name: impl Into<String>,
        uid: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        self.pod_name = Some(pod_name.into());
        self.uid = Some(uid.into());
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    /// Record a failure with its description and timestamp
    #[must_use]
    pub fn with_failure(
        mut self,
        error: impl Into<String>,
        details: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        self.error = Some(error.into());
        self.error_details = details;
        self.failed_at = Some(unix_timestamp(at));
        self
    }

    /// Flatten into the field/value pairs that are set
    #[must_use]
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("id", self.id.clone())];

        let optional = [
            ("name", self.name.clone()),
            ("image", self.image.clone()),
            ("status", self.status.map(|s| s.as_str().to_string())),
            ("pod_name", self.pod_name.clone()),
            ("namespace", self.namespace.clone()),
            ("uid", self.uid.clone()),
            ("created_at", self.created_at.clone()),
            ("error", self.error.clone()),
            ("error_details", self.error_details.clone()),
            ("failed_at", self.failed_at.clone()),
        ];

        fields.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v))),
        );
        fields
    }

    /// Rebuild a record from a stored field map
    ///
    /// `fallback_id` is used when the stored map predates the `id` field.
    ///
    /// # Errors
    /// Returns `DecodeError::UnknownStatus` if the status field is not a known value.
    pub fn from_fields(
        fallback_id: &str,
        fields: &HashMap<String, String>,
    ) -> Result<Self, DecodeError> {
        let get = |key: &str| fields.get(key).cloned();

        let status = match fields.get("status") {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };

        Ok(Self {
            id: get("id").unwrap_or_else(|| fallback_id.to_string()),
            name: get("name"),
            image: get("image"),
            status,
            pod_name: get("pod_name"),
            namespace: get("namespace"),
            uid: get("uid"),
            created_at: get("created_at"),
            error: get("error"),
            error_details: get("error_details"),
            failed_at: get("failed_at"),
        })
    }
}

/// First eight characters of a container id
///
/// Used for default display names and deterministic workload names.
#[must_use]
pub fn short_id(container_id: &str) -> &str {
    container_id
        .char_indices()
        .nth(8)
        .map_or(container_id, |(idx, _)| &container_id[..idx])
}

/// Unix seconds with microsecond precision, e.g. `1718000000.123456`
#[must_use]
pub fn unix_timestamp(at: DateTime<Utc>) -> String {
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}
