//! `Reconciler`: drives the platform toward one intent
//!
//! Each intent is applied from scratch: creation asks the platform for a
//! workload, deletion removes whatever workloads belong to the container. The
//! outcome is written to the state store and reported on the event stream.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use sprout_api::{
    ContainerRecord, ContainerStatus, CreateIntent, IntentEvent, ReportedStatus, StatusUpdate,
};
use sprout_kube::{OrchestrationError, Orchestrator, Workload, workload_name};
use sprout_store::{EventLog, StateStore};

use crate::config::ReconcilerConfig;
use crate::error::CoreError;

/// Result of reconciling one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Platform and store now match the intent
    Applied,
    /// Nothing to do for this event
    Skipped {
        /// Why the event was ignored
        reason: String,
    },
    /// The platform rejected the intent; recorded on the container
    Failed {
        /// Error stored on the container record
        error: String,
    },
}

impl Outcome {
    /// Whether the event is done with and may be acknowledged
    #[must_use]
    pub fn should_ack(&self) -> bool {
        !matches!(self, Outcome::Failed { .. })
    }
}

/// Applies lifecycle intents against the platform and state store
pub struct Reconciler {
    orchestrator: Arc<dyn Orchestrator>,
    store: Arc<dyn StateStore>,
    events: Arc<dyn EventLog>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        store: Arc<dyn StateStore>,
        events: Arc<dyn EventLog>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            orchestrator,
            store,
            events,
            config,
        }
    }

    /// Reconcile a single decoded event
    ///
    /// # Errors
    /// Returns `CoreError` when the outcome could not be written to the state
    /// store. The event should then stay unacknowledged.
    pub async fn reconcile(&self, event: &IntentEvent) -> Result<Outcome, CoreError> {
        match event {
            IntentEvent::ContainerCreated(intent) => self.create(intent).await,
            IntentEvent::ContainerDeleted { container_id } => self.delete(container_id).await,
            IntentEvent::StatusUpdate { container_id, status } => {
                debug!(container_id = %container_id, status = %status, "ignoring status update");
                Ok(Outcome::Skipped {
                    reason: "status update".to_string(),
                })
            }
            IntentEvent::Malformed { event_type, reason } => {
                warn!(event_type = %event_type, reason = %reason, "malformed event");
                Ok(Outcome::Skipped {
                    reason: format!("malformed {event_type}: {reason}"),
                })
            }
            IntentEvent::Unknown { event_type } => {
                warn!(event_type = %event_type, "unknown event type");
                Ok(Outcome::Skipped {
                    reason: format!("unknown event type: {event_type}"),
                })
            }
        }
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    #[instrument(skip(self, intent), fields(container_id = %intent.container_id))]
    async fn create(&self, intent: &CreateIntent) -> Result<Outcome, CoreError> {
        let container_id = &intent.container_id;
        info!(image = %intent.image, name = %intent.name, "creating container");

        let previous = self.current_status(container_id).await;

        match self.create_or_adopt(intent).await {
            Ok(workload) => {
                let record = ContainerRecord::new(container_id.clone())
                    .with_status(ContainerStatus::Running)
                    .with_workload(
                        workload.name.clone(),
                        workload.uid.clone(),
                        self.orchestrator.namespace(),
                    )
                    .with_name(intent.name.clone())
                    .with_image(intent.image.clone())
                    .with_created_at(intent.created_at.clone());

                self.store.upsert(&record).await?;
                Self::log_transition(container_id, previous, Some(ContainerStatus::Running));

                self.publish(
                    StatusUpdate::new(container_id.clone(), ReportedStatus::Running)
                        .with_pod_name(workload.name.clone()),
                )
                .await;

                info!(pod_name = %workload.name, "container running");
                Ok(Outcome::Applied)
            }
            Err(e) => {
                let error = creation_error(&e);
                error!(
                    error = %e,
                    details = %e.details(),
                    retryable = e.is_retryable(),
                    "container creation failed"
                );
                if e.is_already_exists() {
                    warn!(
                        pod_name = %workload_name(container_id),
                        "workload already exists, set adopt_existing_workloads to reuse it"
                    );
                }

                let record = ContainerRecord::new(container_id.clone())
                    .with_status(ContainerStatus::Failed)
                    .with_failure(error.clone(), Some(e.details()), Utc::now());

                self.store.upsert(&record).await?;
                Self::log_transition(container_id, previous, Some(ContainerStatus::Failed));

                self.publish(
                    StatusUpdate::new(container_id.clone(), ReportedStatus::Failed)
                        .with_error(e.to_string()),
                )
                .await;

                Ok(Outcome::Failed { error })
            }
        }
    }

    async fn create_or_adopt(&self, intent: &CreateIntent) -> Result<Workload, OrchestrationError> {
        if self.config.adopt_existing_workloads {
            let existing = self
                .orchestrator
                .find_workloads_by_container_id(&intent.container_id)
                .await?;
            if let Some(workload) = existing.into_iter().find(|w| !w.is_terminating()) {
                info!(pod_name = %workload.name, "adopting existing workload");
                return Ok(workload);
            }
        }

        self.orchestrator.create_workload(intent).await
    }

    // ------------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn delete(&self, container_id: &str) -> Result<Outcome, CoreError> {
        info!("deleting container");

        let previous = self.current_status(container_id).await;

        let targets = match self.deletion_targets(container_id).await {
            Ok(targets) => targets,
            Err(e) => {
                error!(error = %e, "failed to look up workloads");
                return self
                    .record_deletion_failure(container_id, previous, e.to_string())
                    .await;
            }
        };

        if targets.is_empty() {
            info!("no workloads found, treating container as already deleted");
            return self.finish_deletion(container_id, previous).await;
        }

        info!(count = targets.len(), "deleting workloads");

        let mut failures = Vec::new();
        for workload in &targets {
            match self
                .orchestrator
                .delete_workload(&workload.name, self.config.delete_grace_period_secs)
                .await
            {
                Ok(()) => self.verify_termination(&workload.name).await,
                Err(e) if e.is_not_found() => {
                    info!(pod_name = %workload.name, "workload already deleted");
                }
                Err(e) => {
                    error!(pod_name = %workload.name, error = %e, "failed to delete workload");
                    failures.push(format!("{}: {e}", workload.name));
                }
            }
        }

        if failures.is_empty() {
            self.finish_deletion(container_id, previous).await
        } else {
            self.record_deletion_failure(container_id, previous, failures.join("; "))
                .await
        }
    }

    /// Workloads to delete: by label, else by the deterministic name
    async fn deletion_targets(
        &self,
        container_id: &str,
    ) -> Result<Vec<Workload>, OrchestrationError> {
        let labelled = self
            .orchestrator
            .find_workloads_by_container_id(container_id)
            .await?;
        if !labelled.is_empty() {
            return Ok(labelled);
        }

        let name = workload_name(container_id);
        debug!(pod_name = %name, "no labelled workloads, trying derived name");
        Ok(self
            .orchestrator
            .read_workload(&name)
            .await?
            .into_iter()
            .collect())
    }

    async fn finish_deletion(
        &self,
        container_id: &str,
        previous: Option<ContainerStatus>,
    ) -> Result<Outcome, CoreError> {
        self.store.delete(container_id).await?;
        Self::log_transition(container_id, previous, None);

        self.publish(StatusUpdate::new(container_id, ReportedStatus::Deleted))
            .await;

        info!(container_id = %container_id, "container deleted");
        Ok(Outcome::Applied)
    }

    async fn record_deletion_failure(
        &self,
        container_id: &str,
        previous: Option<ContainerStatus>,
        detail: String,
    ) -> Result<Outcome, CoreError> {
        let error = format!("Deletion error: {detail}");

        let record = ContainerRecord::new(container_id)
            .with_status(ContainerStatus::DeletionFailed)
            .with_failure(error.clone(), None, Utc::now());
        self.store.upsert(&record).await?;
        Self::log_transition(container_id, previous, Some(ContainerStatus::DeletionFailed));

        self.publish(
            StatusUpdate::new(container_id, ReportedStatus::DeletionFailed)
                .with_error(error.clone()),
        )
        .await;

        Ok(Outcome::Failed { error })
    }

    /// Re-read a workload after deleting it; logging only
    async fn verify_termination(&self, name: &str) {
        let delay = self.config.deletion_verify_delay();
        if delay.is_zero() {
            return;
        }
        tokio::time::sleep(delay).await;

        match self.orchestrator.read_workload(name).await {
            Ok(None) => info!(pod_name = %name, "workload gone"),
            Ok(Some(w)) if w.is_terminating() => info!(pod_name = %name, "workload terminating"),
            Ok(Some(_)) => warn!(pod_name = %name, "workload deletion may not have started"),
            Err(e) => warn!(pod_name = %name, error = %e, "could not verify workload deletion"),
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Stored status before this event, for transition logging only
    async fn current_status(&self, container_id: &str) -> Option<ContainerStatus> {
        match self.store.get(container_id).await {
            Ok(record) => record.and_then(|r| r.status),
            Err(e) => {
                debug!(container_id = %container_id, error = %e, "could not read current record");
                None
            }
        }
    }

    fn log_transition(
        container_id: &str,
        from: Option<ContainerStatus>,
        to: Option<ContainerStatus>,
    ) {
        let to_label = to.map_or("deleted", ContainerStatus::as_str);

        match from {
            Some(from) if !from.can_transition_to(to) => warn!(
                container_id = %container_id,
                from = %from,
                to = %to_label,
                "status transition outside container lifecycle"
            ),
            Some(from) => info!(container_id = %container_id, from = %from, to = %to_label, "status transition"),
            None => info!(container_id = %container_id, to = %to_label, "status set"),
        }
    }

    /// Append a status update; observers only, so failures are logged
    async fn publish(&self, update: StatusUpdate) {
        if let Err(e) = self.events.append(&update.to_fields()).await {
            warn!(
                container_id = %update.container_id,
                status = update.status.as_str(),
                error = %e,
                "failed to publish status update"
            );
        }
    }
}

/// Short error text stored on a failed container
fn creation_error(e: &OrchestrationError) -> String {
    match e {
        OrchestrationError::Api { .. } => e.to_string(),
        other => format!("Unexpected error: {other}"),
    }
}
