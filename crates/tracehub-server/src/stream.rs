//! Redis stream plumbing: the durable `events` log, its consumer group, and
//! the dead-letter list.
//!
//! Two kinds of connection are in play. The shared [`ConnectionManager`]
//! serves ingestion appends and health checks; the consumer opens its own
//! dedicated connection because its blocking reads would starve anything
//! multiplexed alongside them.

use anyhow::{Context, Result};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::{
    StreamClaimReply, StreamPendingCountReply, StreamReadOptions, StreamReadReply,
};
use redis::AsyncCommands;
use tracehub_types::EventEnvelope;

pub const STREAM_KEY: &str = "events";
pub const GROUP_NAME: &str = "tracehub-consumers";
pub const DEAD_LETTER_KEY: &str = "events:dead";

/// One delivered stream entry: the Redis entry ID plus the decoded payload
/// field.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: String,
    pub payload: String,
}

/// A pending entry eligible for reclaim, with its delivery count.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub id: String,
    pub times_delivered: u64,
}

#[derive(Clone)]
pub struct EventStream {
    client: redis::Client,
    manager: ConnectionManager,
}

impl EventStream {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid REDIS_URL")?;
        let manager = client
            .get_connection_manager()
            .await
            .context("redis connection failed")?;
        Ok(Self { client, manager })
    }

    /// Create the consumer group if it does not exist yet. BUSYGROUP from a
    /// previous run is the expected steady state.
    pub async fn ensure_group(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let created: redis::RedisResult<String> = conn
            .xgroup_create_mkstream(STREAM_KEY, GROUP_NAME, "$")
            .await;
        match created {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e).context("consumer group creation failed"),
        }
    }

    /// Append one event to the stream. Returns the entry ID.
    pub async fn append(&self, envelope: &EventEnvelope) -> Result<String> {
        let payload = serde_json::to_string(envelope).context("event serialize failed")?;
        let mut conn = self.manager.clone();
        let id: String = conn
            .xadd(STREAM_KEY, "*", &[("payload", payload.as_str())])
            .await
            .context("stream append failed")?;
        Ok(id)
    }

    pub async fn ping(&self) -> bool {
        let mut conn = self.manager.clone();
        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }

    /// Dedicated connection for the blocking consumer loop.
    pub async fn consumer_connection(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("consumer connection failed")
    }

    /// Blocking group read on the dedicated connection.
    pub async fn read_group(
        &self,
        conn: &mut MultiplexedConnection,
        consumer_name: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamEntry>> {
        let options = StreamReadOptions::default()
            .group(GROUP_NAME, consumer_name)
            .count(count)
            .block(block_ms as usize);

        let reply: StreamReadReply = conn
            .xread_options(&[STREAM_KEY], &[">"], &options)
            .await
            .context("stream read failed")?;

        Ok(flatten_reply(reply))
    }

    pub async fn ack(&self, conn: &mut MultiplexedConnection, entry_id: &str) -> Result<()> {
        let _: i64 = conn
            .xack(STREAM_KEY, GROUP_NAME, &[entry_id])
            .await
            .context("stream ack failed")?;
        Ok(())
    }

    /// Pending entries for the group, oldest first, with delivery counts.
    pub async fn pending(
        &self,
        conn: &mut MultiplexedConnection,
        count: usize,
    ) -> Result<Vec<PendingEntry>> {
        let reply: StreamPendingCountReply = conn
            .xpending_count(STREAM_KEY, GROUP_NAME, "-", "+", count)
            .await
            .context("stream pending lookup failed")?;

        Ok(reply
            .ids
            .into_iter()
            .map(|entry| PendingEntry {
                id: entry.id,
                times_delivered: entry.times_delivered as u64,
            })
            .collect())
    }

    /// Claim pending entries for this consumer, returning their payloads.
    pub async fn claim(
        &self,
        conn: &mut MultiplexedConnection,
        consumer_name: &str,
        min_idle_ms: u64,
        entry_ids: &[String],
    ) -> Result<Vec<StreamEntry>> {
        if entry_ids.is_empty() {
            return Ok(Vec::new());
        }
        let reply: StreamClaimReply = conn
            .xclaim(STREAM_KEY, GROUP_NAME, consumer_name, min_idle_ms as usize, entry_ids)
            .await
            .context("stream claim failed")?;

        Ok(reply
            .ids
            .into_iter()
            .filter_map(|entry| {
                let payload = entry
                    .map
                    .get("payload")
                    .and_then(|value| redis::from_redis_value::<String>(value).ok())?;
                Some(StreamEntry {
                    id: entry.id,
                    payload,
                })
            })
            .collect())
    }

    /// Push a poisoned event onto the dead-letter list.
    pub async fn dead_letter(&self, body: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: i64 = conn
            .rpush(DEAD_LETTER_KEY, body)
            .await
            .context("dead letter push failed")?;
        Ok(())
    }
}

fn flatten_reply(reply: StreamReadReply) -> Vec<StreamEntry> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .filter_map(|entry| {
            let payload = entry
                .map
                .get("payload")
                .and_then(|value| redis::from_redis_value::<String>(value).ok())?;
            Some(StreamEntry {
                id: entry.id,
                payload,
            })
        })
        .collect()
}
