//! Container records stored as Redis hashes at `container:<id>`

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use sprout_api::ContainerRecord;
use tracing::{debug, instrument};

use crate::error::{Result, StoreError};
use crate::traits::StateStore;

pub const KEY_PREFIX: &str = "container:";

/// Hash key holding a container's record
#[must_use]
pub fn record_key(container_id: &str) -> String {
    format!("{KEY_PREFIX}{container_id}")
}

#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStateStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisStateStore {
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    #[instrument(skip(self))]
    async fn get(&self, container_id: &str) -> Result<Option<ContainerRecord>> {
        let key = record_key(container_id);
        let mut conn = self.conn.clone();

        let fields: HashMap<String, String> = conn.hgetall(&key).await?;
        if fields.is_empty() {
            debug!(key = %key, "no record");
            return Ok(None);
        }

        ContainerRecord::from_fields(container_id, &fields)
            .map(Some)
            .map_err(|source| StoreError::Decode { key, source })
    }

    #[instrument(skip(self, record), fields(container_id = %record.id))]
    async fn upsert(&self, record: &ContainerRecord) -> Result<()> {
        let key = record_key(&record.id);
        let fields = record.to_fields();
        let mut conn = self.conn.clone();

        debug!(key = %key, fields = fields.len(), "HSET");
        conn.hset_multiple::<_, _, _, ()>(&key, &fields).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, container_id: &str) -> Result<()> {
        let key = record_key(container_id);
        let mut conn = self.conn.clone();

        debug!(key = %key, "DEL");
        conn.del::<_, ()>(&key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
