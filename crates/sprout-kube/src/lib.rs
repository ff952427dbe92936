//! sprout-kube: Orchestration client
//!
//! Creates, lists, reads and deletes container workloads (pods) through the
//! Kubernetes core/v1 REST API.
//!
//! # Example
//!
//! ```no_run
//! use sprout_kube::{KubeClient, KubeConfig, Orchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KubeConfig::infer("sprout", "http://127.0.0.1:8001", None);
//! let client = KubeClient::new(config)?;
//!
//! for workload in client.find_workloads_by_container_id("abc123").await? {
//!     client.delete_workload(&workload.name, 30).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod manifest;
pub mod traits;

pub use client::KubeClient;
pub use config::KubeConfig;
pub use error::{OrchestrationError, Result};
pub use manifest::workload_name;
pub use traits::{Orchestrator, Workload};
