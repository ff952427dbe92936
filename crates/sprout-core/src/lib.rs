//! sprout-core: Reconciliation worker logic
//!
//! The `Reconciler` applies container lifecycle intents against the
//! orchestration platform and state store; the `ConsumerLoop` feeds it one
//! stream entry at a time under the consumer-group protocol; the health gate
//! runs before either starts.

pub mod backoff;
pub mod bootstrap;
pub mod config;
pub mod consumer;
pub mod error;
pub mod reconciler;

pub use backoff::ErrorBackoff;
pub use bootstrap::{HealthReport, run_health_checks};
pub use config::{ConsumerConfig, ReconcilerConfig};
pub use consumer::{ConsumerLoop, PollOutcome};
pub use error::{BootstrapError, ConsumerError, CoreError};
pub use reconciler::{Outcome, Reconciler};
