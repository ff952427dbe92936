//! Container event stream over Redis Streams consumer groups

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::traits::{EventLog, GroupStatus, StreamEntry};

/// Group creation against an existing group
const BUSYGROUP: &str = "BUSYGROUP";

#[derive(Clone)]
pub struct RedisEventLog {
    conn: ConnectionManager,
    stream: String,
    group: String,
    max_len: usize,
}

impl fmt::Debug for RedisEventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisEventLog")
            .field("stream", &self.stream)
            .field("group", &self.group)
            .field("max_len", &self.max_len)
            .finish_non_exhaustive()
    }
}

impl RedisEventLog {
    pub fn new(
        conn: ConnectionManager,
        stream: impl Into<String>,
        group: impl Into<String>,
        max_len: usize,
    ) -> Self {
        Self {
            conn,
            stream: stream.into(),
            group: group.into(),
            max_len,
        }
    }
}

/// Flatten a delivered entry into string fields
///
/// Values that are not valid strings are dropped with a warning rather than
/// failing the whole entry; the decoder treats missing fields explicitly.
fn to_entry(stream_id: &StreamId) -> StreamEntry {
    let mut fields = HashMap::with_capacity(stream_id.map.len());
    for key in stream_id.map.keys() {
        match stream_id.get::<String>(key) {
            Some(value) => {
                fields.insert(key.clone(), value);
            }
            None => warn!(entry_id = %stream_id.id, field = %key, "dropping non-string field"),
        }
    }

    StreamEntry {
        id: stream_id.id.clone(),
        fields,
    }
}

#[async_trait]
impl EventLog for RedisEventLog {
    fn stream(&self) -> &str {
        &self.stream
    }

    fn group(&self) -> &str {
        &self.group
    }

    async fn stream_length(&self) -> Result<Option<u64>> {
        let mut conn = self.conn.clone();

        let exists: bool = conn.exists(&self.stream).await?;
        if !exists {
            return Ok(None);
        }
        let len: u64 = conn.xlen(&self.stream).await?;
        Ok(Some(len))
    }

    #[instrument(skip(self), fields(stream = %self.stream, group = %self.group))]
    async fn ensure_group(&self) -> Result<GroupStatus> {
        let mut conn = self.conn.clone();

        match conn
            .xgroup_create_mkstream::<_, _, _, ()>(&self.stream, &self.group, "0")
            .await
        {
            Ok(()) => Ok(GroupStatus::Created),
            Err(e) if e.code() == Some(BUSYGROUP) => Ok(GroupStatus::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_next(&self, consumer: &str, block: Duration) -> Result<Option<StreamEntry>> {
        let mut conn = self.conn.clone();
        let block_ms = usize::try_from(block.as_millis()).unwrap_or(usize::MAX);

        let options = StreamReadOptions::default()
            .group(&self.group, consumer)
            .count(1)
            .block(block_ms);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.stream], &[">"], &options)
            .await?;

        let entry = reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .next()
            .map(|id| to_entry(&id));

        if let Some(entry) = &entry {
            debug!(entry_id = %entry.id, "delivered stream entry");
        }
        Ok(entry)
    }

    async fn ack(&self, entry_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.xack::<_, _, _, ()>(&self.stream, &self.group, &[entry_id])
            .await?;
        Ok(())
    }

    async fn append(&self, fields: &[(&'static str, String)]) -> Result<String> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd_maxlen(&self.stream, StreamMaxlen::Approx(self.max_len), "*", fields)
            .await?;
        debug!(entry_id = %id, "appended stream entry");
        Ok(id)
    }
}
