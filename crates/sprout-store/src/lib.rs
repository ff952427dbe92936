//! sprout-store: State store and event log clients
//!
//! Both sit on one Redis connection: container records are hashes at
//! `container:<id>`, lifecycle events live on a capped stream read through a
//! consumer group.

pub mod connection;
pub mod error;
pub mod state;
pub mod stream;
pub mod traits;

pub use connection::{RedisSettings, connect};
pub use error::{Result, StoreError};
pub use state::{RedisStateStore, record_key};
pub use stream::RedisEventLog;
pub use traits::{EventLog, GroupStatus, StateStore, StreamEntry};
