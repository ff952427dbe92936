//! Pod manifests and naming for container workloads

use serde::Deserialize;
use serde_json::{Value, json};
use sprout_api::{CreateIntent, short_id};

use crate::traits::Workload;

pub const APP_LABEL: &str = "container-manager";
pub const CREATED_BY: &str = "k3-manager";
pub const CONTAINER_ID_LABEL: &str = "container-id";

/// Port exposed by every workload and checked for readiness
pub const CONTAINER_PORT: u16 = 80;

/// Deterministic workload name for a container
///
/// Repeated creates for the same container collide on this name, and deletes
/// can find the workload even when the label query comes back empty.
#[must_use]
pub fn workload_name(container_id: &str) -> String {
    format!("pod-{}", short_id(container_id))
}

/// Label selector matching every workload of a container
#[must_use]
pub fn container_selector(container_id: &str) -> String {
    format!("{CONTAINER_ID_LABEL}={container_id}")
}

/// Container names must be lowercase DNS labels
fn container_name(display_name: &str) -> String {
    display_name.replace('_', "-").to_lowercase()
}

/// Build the pod manifest for a creation intent
#[must_use]
pub fn pod_manifest(intent: &CreateIntent) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": workload_name(&intent.container_id),
            "labels": {
                "app": APP_LABEL,
                CONTAINER_ID_LABEL: intent.container_id,
                "created-by": CREATED_BY,
            },
            "annotations": {
                "created-at": intent.created_at,
                "original-name": intent.name,
            },
        },
        "spec": {
            "restartPolicy": "Always",
            "containers": [{
                "name": container_name(&intent.name),
                "image": intent.image,
                "imagePullPolicy": "IfNotPresent",
                "ports": [{ "containerPort": CONTAINER_PORT }],
                "resources": {
                    "requests": { "memory": "64Mi", "cpu": "100m" },
                    "limits": { "memory": "128Mi", "cpu": "200m" },
                },
                "readinessProbe": {
                    "httpGet": { "path": "/", "port": CONTAINER_PORT },
                    "initialDelaySeconds": 1,
                    "periodSeconds": 2,
                    "failureThreshold": 2,
                },
                "env": [
                    { "name": "CONTAINER_ID", "value": intent.container_id },
                    { "name": "CREATED_BY", "value": CREATED_BY },
                ],
            }],
        },
    })
}

/// Background-propagated delete with a grace period
#[must_use]
pub fn delete_options(grace_period_seconds: u32) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "DeleteOptions",
        "propagationPolicy": "Background",
        "gracePeriodSeconds": grace_period_seconds,
    })
}

// Only the metadata the worker needs is decoded.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    uid: String,
    #[serde(default)]
    namespace: String,
    deletion_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pod {
    metadata: ObjectMeta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PodList {
    #[serde(default)]
    pub(crate) items: Vec<Pod>,
}

/// `Status` object returned with API errors
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Status {
    #[serde(default)]
    pub(crate) reason: String,
    #[serde(default)]
    pub(crate) message: String,
}

impl From<Pod> for Workload {
    fn from(pod: Pod) -> Self {
        Workload {
            name: pod.metadata.name,
            uid: pod.metadata.uid,
            namespace: pod.metadata.namespace,
            deletion_timestamp: pod.metadata.deletion_timestamp,
        }
    }
}
