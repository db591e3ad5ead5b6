//! Redis Streams message log shared by both player processes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::streams::StreamReadReply;
use redis::Client;
use tracing::{debug, info, instrument, warn};

use crate::bus::{BusError, LogRecord, MessageLog};

const PAYLOAD_FIELD: &str = "payload";

/// Streams appended with `XADD` and consumed through consumer groups.
///
/// Blocking reads run on one connection per stream so they never stall
/// appends or acknowledgements on the shared connection.
#[derive(Clone)]
pub struct RedisStreamLog {
    client: Client,
    manager: ConnectionManager,
    readers: Arc<Mutex<HashMap<String, ConnectionManager>>>,
}

impl std::fmt::Debug for RedisStreamLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamLog")
            .field("readers", &self.readers.lock().len())
            .finish()
    }
}

impl RedisStreamLog {
    /// Connects to Redis at `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the URL is invalid or the server is unreachable.
    #[instrument(skip(redis_url))]
    pub async fn connect(redis_url: &str) -> Result<Self, BusError> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client.clone()).await?;
        info!("Connected message log to Redis");
        Ok(Self {
            client,
            manager,
            readers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    async fn reader(&self, stream: &str) -> Result<ConnectionManager, BusError> {
        if let Some(conn) = self.readers.lock().get(stream) {
            return Ok(conn.clone());
        }
        let conn = ConnectionManager::new(self.client.clone()).await?;
        self.readers
            .lock()
            .entry(stream.to_string())
            .or_insert(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl MessageLog for RedisStreamLog {
    #[instrument(skip(self, payload))]
    async fn append(&self, stream: &str, payload: &str) -> Result<String, BusError> {
        let mut conn = self.manager.clone();
        let offset: String = redis::cmd("XADD")
            .arg(stream)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(offset)
    }

    #[instrument(skip(self))]
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), BusError> {
        let mut conn = self.manager.clone();
        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => {
                info!("Consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!("Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max: usize,
        block: Duration,
    ) -> Result<Vec<LogRecord>, BusError> {
        let mut conn = self.reader(stream).await?;
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(max)
            .arg("BLOCK")
            .arg(block.as_millis() as u64)
            .arg("STREAMS")
            .arg(stream)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        Ok(into_records(reply))
    }

    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        after: Option<&str>,
        max: usize,
    ) -> Result<Vec<LogRecord>, BusError> {
        // Reading from an explicit id returns this consumer's pending entries.
        let mut conn = self.manager.clone();
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(max)
            .arg("STREAMS")
            .arg(stream)
            .arg(after.unwrap_or("0"))
            .query_async(&mut conn)
            .await?;

        let records = into_records(reply);
        debug!(count = records.len(), "Pending records re-read");
        Ok(records)
    }

    async fn ack(&self, stream: &str, group: &str, offset: &str) -> Result<(), BusError> {
        let mut conn = self.manager.clone();
        let _: i64 = redis::cmd("XACK")
            .arg(stream)
            .arg(group)
            .arg(offset)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

fn into_records(reply: Option<StreamReadReply>) -> Vec<LogRecord> {
    reply
        .into_iter()
        .flat_map(|reply| reply.keys)
        .flat_map(|key| key.ids)
        .map(|entry| {
            // An entry without a payload (trimmed, or written by something else)
            // is handed on empty; decoding rejects it.
            let payload = entry.get::<String>(PAYLOAD_FIELD).unwrap_or_else(|| {
                warn!(offset = %entry.id, "Entry has no payload field");
                String::new()
            });
            LogRecord::new(entry.id, payload)
        })
        .collect()
}
