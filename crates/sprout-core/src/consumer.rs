//! Consumer loop over the container event stream
//!
//! One entry is read, reconciled and acknowledged (or left pending) before
//! the next read. Entries that are not acknowledged stay in the group's
//! pending list for the event log's own redelivery.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use sprout_api::IntentEvent;
use sprout_store::{EventLog, StoreError};

use crate::backoff::ErrorBackoff;
use crate::config::ConsumerConfig;
use crate::error::ConsumerError;
use crate::reconciler::{Outcome, Reconciler};

/// What a single poll cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The read timed out without an entry
    Idle,
    /// Entry processed and acknowledged
    Acknowledged { entry_id: String },
    /// Entry left unacknowledged for redelivery
    LeftPending { entry_id: String },
}

pub struct ConsumerLoop {
    events: Arc<dyn EventLog>,
    reconciler: Reconciler,
    consumer: String,
    config: ConsumerConfig,
    backoff: ErrorBackoff,
}

impl ConsumerLoop {
    pub fn new(events: Arc<dyn EventLog>, reconciler: Reconciler, config: ConsumerConfig) -> Self {
        Self {
            events,
            reconciler,
            consumer: config.consumer_name(),
            backoff: config.backoff(),
            config,
        }
    }

    /// Consumer name used in the group
    #[must_use]
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Read and handle at most one entry
    ///
    /// # Errors
    /// Returns `StoreError` when reading or acknowledging fails. Reconcile
    /// failures are not errors here; they leave the entry pending.
    pub async fn poll_once(&self) -> Result<PollOutcome, StoreError> {
        let Some(entry) = self
            .events
            .read_next(&self.consumer, self.config.poll_block())
            .await?
        else {
            return Ok(PollOutcome::Idle);
        };

        let event = IntentEvent::decode(&entry.fields);
        info!(
            entry_id = %entry.id,
            event_type = %event.event_type(),
            container_id = event.container_id().unwrap_or("-"),
            "processing event"
        );
        debug!(fields = ?entry.fields, "event payload");

        let ack = match self.reconciler.reconcile(&event).await {
            Ok(outcome @ (Outcome::Applied | Outcome::Skipped { .. })) => {
                debug!(entry_id = %entry.id, outcome = ?outcome, "event handled");
                true
            }
            Ok(Outcome::Failed { error }) => {
                warn!(entry_id = %entry.id, error = %error, "event failed, leaving pending");
                false
            }
            Err(e) => {
                error!(entry_id = %entry.id, error = %e, fields = ?entry.fields, "error processing event, leaving pending");
                false
            }
        };

        if !ack {
            return Ok(PollOutcome::LeftPending { entry_id: entry.id });
        }

        self.events.ack(&entry.id).await?;
        info!(entry_id = %entry.id, "event acknowledged");
        Ok(PollOutcome::Acknowledged { entry_id: entry.id })
    }

    /// Run until shutdown is signalled or the event log keeps failing
    ///
    /// Shutdown is only observed between events and during backoff sleeps.
    ///
    /// # Errors
    /// Returns `ConsumerError::TooManyFailures` once the configured number of
    /// consecutive event log errors is reached.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ConsumerError> {
        info!(
            consumer = %self.consumer,
            stream = %self.events.stream(),
            group = %self.events.group(),
            "starting consumer loop"
        );

        loop {
            if *shutdown.borrow() {
                info!("shutdown requested, stopping consumer loop");
                return Ok(());
            }

            match self.poll_once().await {
                Ok(_) => self.backoff.reset(),
                Err(e) => {
                    let Some(delay) = self.backoff.record_failure() else {
                        error!(
                            count = self.backoff.consecutive(),
                            error = %e,
                            "too many consecutive event log errors, exiting"
                        );
                        return Err(ConsumerError::TooManyFailures {
                            count: self.backoff.consecutive(),
                            last: e.to_string(),
                        });
                    };

                    error!(
                        attempt = self.backoff.consecutive(),
                        max = self.backoff.max_consecutive(),
                        delay = ?delay,
                        unavailable = e.is_unavailable(),
                        error = %e,
                        "event log error, backing off"
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = shutdown_requested(&mut shutdown) => {}
                    }
                }
            }
        }
    }
}

/// Resolves once shutdown is signalled; never if the sender is gone
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
