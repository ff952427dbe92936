//! sprout-api: Shared data model
//!
//! Container records held in the state store and the lifecycle events carried
//! on the `container_events` stream, plus the flat string codec both use.

pub mod error;
pub mod events;
pub mod record;

pub use error::DecodeError;
pub use events::{CreateIntent, IntentEvent, ReportedStatus, StatusUpdate};
pub use record::{ContainerRecord, ContainerStatus, short_id, unix_timestamp};
