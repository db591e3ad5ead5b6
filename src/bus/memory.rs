//! In-process message log for single-process runs and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, instrument, warn};

use crate::bus::{BusError, LogRecord, MessageLog};

#[derive(Debug, Default)]
struct LogState {
    streams: HashMap<String, Vec<String>>,
    /// Next unread index per `(stream, group)`.
    cursors: HashMap<(String, String), usize>,
    /// Delivered but unacknowledged indices per `(stream, group)`, with the
    /// consumer each was delivered to.
    pending: HashMap<(String, String), BTreeMap<usize, String>>,
    failing_appends: u32,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<LogState>,
    appended: Notify,
}

/// Message log held in memory.
///
/// Clones share the same streams, so two nodes in one process exchange
/// messages through it.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    shared: Arc<Shared>,
}

impl MemoryLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` appends fail, for exercising publish retries.
    pub fn fail_next_appends(&self, count: u32) {
        self.shared.state.lock().failing_appends = count;
    }

    /// Returns every payload appended to `stream`, in order.
    pub fn payloads(&self, stream: &str) -> Vec<String> {
        self.shared
            .state
            .lock()
            .streams
            .get(stream)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of records delivered to `group` but not acknowledged.
    pub fn pending(&self, stream: &str, group: &str) -> usize {
        self.shared
            .state
            .lock()
            .pending
            .get(&(stream.to_string(), group.to_string()))
            .map_or(0, BTreeMap::len)
    }

    fn take_unread(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<LogRecord>, BusError> {
        let mut state = self.shared.state.lock();
        let key = (stream.to_string(), group.to_string());
        let Some(&cursor) = state.cursors.get(&key) else {
            return Err(BusError::new(format!(
                "No group '{}' on stream '{}'",
                group, stream
            )));
        };

        let records = state
            .streams
            .get(stream)
            .map(|entries| {
                entries
                    .iter()
                    .enumerate()
                    .skip(cursor)
                    .take(max)
                    .map(|(index, payload)| LogRecord::new(index.to_string(), payload.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        state.cursors.insert(key.clone(), cursor + records.len());
        state
            .pending
            .entry(key)
            .or_default()
            .extend((cursor..cursor + records.len()).map(|index| (index, consumer.to_string())));
        Ok(records)
    }
}

#[async_trait]
impl MessageLog for MemoryLog {
    #[instrument(skip(self, payload))]
    async fn append(&self, stream: &str, payload: &str) -> Result<String, BusError> {
        let offset = {
            let mut state = self.shared.state.lock();
            if state.failing_appends > 0 {
                state.failing_appends -= 1;
                warn!("Injected append failure");
                return Err(BusError::new(format!("Append to '{}' refused", stream)));
            }
            let entries = state.streams.entry(stream.to_string()).or_default();
            entries.push(payload.to_string());
            entries.len() - 1
        };
        self.shared.appended.notify_waiters();
        debug!(offset, "Appended");
        Ok(offset.to_string())
    }

    #[instrument(skip(self))]
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), BusError> {
        let mut state = self.shared.state.lock();
        let end = state.streams.get(stream).map_or(0, Vec::len);
        state
            .cursors
            .entry((stream.to_string(), group.to_string()))
            .or_insert(end);
        Ok(())
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max: usize,
        block: Duration,
    ) -> Result<Vec<LogRecord>, BusError> {
        let notified = self.shared.appended.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let records = self.take_unread(stream, group, consumer, max)?;
        if !records.is_empty() {
            return Ok(records);
        }

        if tokio::time::timeout(block, notified).await.is_err() {
            return Ok(Vec::new());
        }
        self.take_unread(stream, group, consumer, max)
    }

    #[instrument(skip(self))]
    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        after: Option<&str>,
        max: usize,
    ) -> Result<Vec<LogRecord>, BusError> {
        let start = match after {
            Some(offset) => offset
                .parse::<usize>()
                .map_err(|e| BusError::new(format!("Bad offset '{}': {}", offset, e)))?
                + 1,
            None => 0,
        };

        let state = self.shared.state.lock();
        let Some(pending) = state.pending.get(&(stream.to_string(), group.to_string())) else {
            return Ok(Vec::new());
        };
        let entries = state.streams.get(stream);
        let records: Vec<LogRecord> = pending
            .range(start..)
            .filter(|(_, owner)| owner.as_str() == consumer)
            .take(max)
            .filter_map(|(&index, _)| {
                let payload = entries.and_then(|entries| entries.get(index))?;
                Some(LogRecord::new(index.to_string(), payload.clone()))
            })
            .collect();
        debug!(count = records.len(), "Pending records re-read");
        Ok(records)
    }

    async fn ack(&self, stream: &str, group: &str, offset: &str) -> Result<(), BusError> {
        let index = offset
            .parse::<usize>()
            .map_err(|e| BusError::new(format!("Bad offset '{}': {}", offset, e)))?;
        let mut state = self.shared.state.lock();
        if let Some(pending) = state
            .pending
            .get_mut(&(stream.to_string(), group.to_string()))
        {
            pending.remove(&index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_group_starts_at_stream_end() {
        let log = MemoryLog::new();
        log.append("game", "before").await.unwrap();
        log.ensure_group("game", "alice").await.unwrap();
        log.append("game", "after").await.unwrap();

        let records = log
            .read_group("game", "alice", "alice", 10, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload(), "after");
        assert_eq!(records[0].offset(), "1");
    }

    #[tokio::test]
    async fn test_each_group_sees_every_record() {
        let log = MemoryLog::new();
        log.ensure_group("moves", "alice").await.unwrap();
        log.ensure_group("moves", "bob").await.unwrap();
        log.append("moves", "m1").await.unwrap();

        for group in ["alice", "bob"] {
            let records = log
                .read_group("moves", group, group, 10, Duration::from_millis(10))
                .await
                .unwrap();
            assert_eq!(records.len(), 1);
        }
        let again = log
            .read_group("moves", "alice", "alice", 10, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_blocked_reader_wakes_on_append() {
        let log = MemoryLog::new();
        log.ensure_group("moves", "alice").await.unwrap();

        let reader = {
            let log = log.clone();
            tokio::spawn(async move {
                log.read_group("moves", "alice", "alice", 10, Duration::from_secs(5))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        log.append("moves", "m1").await.unwrap();

        let records = reader.await.unwrap().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_then_success() {
        let log = MemoryLog::new();
        log.fail_next_appends(2);
        assert!(log.append("game", "a").await.is_err());
        assert!(log.append("game", "a").await.is_err());
        assert!(log.append("game", "a").await.is_ok());
        assert_eq!(log.payloads("game"), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_ack_clears_pending() {
        let log = MemoryLog::new();
        log.ensure_group("game", "alice").await.unwrap();
        log.append("game", "a").await.unwrap();
        let records = log
            .read_group("game", "alice", "alice", 10, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(log.pending("game", "alice"), 1);

        log.ack("game", "alice", records[0].offset()).await.unwrap();
        assert_eq!(log.pending("game", "alice"), 0);
    }

    #[tokio::test]
    async fn test_unacked_records_are_read_again_per_consumer() {
        let log = MemoryLog::new();
        log.ensure_group("game", "alice").await.unwrap();
        for payload in ["a", "b", "c"] {
            log.append("game", payload).await.unwrap();
        }
        log.read_group("game", "alice", "c1", 2, Duration::from_millis(10))
            .await
            .unwrap();
        log.read_group("game", "alice", "c2", 1, Duration::from_millis(10))
            .await
            .unwrap();
        log.ack("game", "alice", "0").await.unwrap();

        let pending = log
            .read_pending("game", "alice", "c1", None, 10)
            .await
            .unwrap();
        assert_eq!(pending, vec![LogRecord::new("1".to_string(), "b".to_string())]);

        let after = log
            .read_pending("game", "alice", "c1", Some("1"), 10)
            .await
            .unwrap();
        assert!(after.is_empty());

        let other = log
            .read_pending("game", "alice", "c2", None, 10)
            .await
            .unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].payload(), "c");
    }

    #[tokio::test]
    async fn test_unknown_group_is_an_error() {
        let log = MemoryLog::new();
        let result = log
            .read_group("game", "nobody", "nobody", 10, Duration::from_millis(10))
            .await;
        assert!(result.is_err());
    }
}
