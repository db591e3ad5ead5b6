//! Consumer loop delivering decoded messages to a handler.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use derive_getters::Getters;
use derive_new::new;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::bus::{LogRecord, MessageLog};
use crate::error::DuelError;

/// Receives decoded messages from one stream.
#[async_trait]
pub trait MessageHandler<M>: Send + Sync {
    /// Handles one delivery. An error asks for the record to be retried.
    async fn handle(&self, message: &M) -> Result<(), DuelError>;
}

/// How a subscription reads and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, new)]
pub struct DeliveryPolicy {
    /// Handler attempts per record before it is dropped.
    attempts: u32,
    /// Pause between handler attempts and after a failed read.
    backoff: Duration,
    /// Longest a single read waits for new records.
    block: Duration,
    /// Most records fetched per read.
    batch: usize,
}

/// A consumer group member reading one stream.
#[derive(Debug, Clone)]
pub struct Subscription {
    log: Arc<dyn MessageLog>,
    stream: String,
    group: String,
    consumer: String,
    policy: DeliveryPolicy,
}

impl Subscription {
    /// Creates a subscription; the group must already exist on the log.
    pub fn new(
        log: Arc<dyn MessageLog>,
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
        policy: DeliveryPolicy,
    ) -> Self {
        Self {
            log,
            stream: stream.into(),
            group: group.into(),
            consumer: consumer.into(),
            policy,
        }
    }

    /// Delivers records to `handler` until `shutdown` is cancelled.
    ///
    /// Records this consumer received in an earlier run but never acknowledged
    /// are delivered first, then new records. Delivery is at-least-once and
    /// there is no deduplication. Records the handler keeps failing on, and
    /// records that do not decode, are logged and acknowledged.
    #[instrument(skip_all, fields(stream = %self.stream, group = %self.group))]
    pub async fn run<M, H>(self, handler: H, shutdown: CancellationToken)
    where
        M: DeserializeOwned + Debug + Send + Sync,
        H: MessageHandler<M>,
    {
        info!("Subscription started");
        if !self.replay_pending(&handler, &shutdown).await {
            info!("Subscription stopped");
            return;
        }

        loop {
            let read = tokio::select! {
                _ = shutdown.cancelled() => break,
                read = self.log.read_group(
                    &self.stream,
                    &self.group,
                    &self.consumer,
                    *self.policy.batch(),
                    *self.policy.block(),
                ) => read,
            };

            let records = match read {
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "Read failed, backing off");
                    tokio::time::sleep(*self.policy.backoff()).await;
                    continue;
                }
            };

            for record in records {
                self.deliver(&handler, &record).await;
                self.acknowledge(&record).await;
            }
        }
        info!("Subscription stopped");
    }

    /// Delivers this consumer's unacknowledged backlog. Returns `false` if
    /// `shutdown` fired first.
    async fn replay_pending<M, H>(&self, handler: &H, shutdown: &CancellationToken) -> bool
    where
        M: DeserializeOwned + Debug + Send + Sync,
        H: MessageHandler<M>,
    {
        let mut after: Option<String> = None;
        let mut replayed = 0usize;
        loop {
            let read = tokio::select! {
                _ = shutdown.cancelled() => return false,
                read = self.log.read_pending(
                    &self.stream,
                    &self.group,
                    &self.consumer,
                    after.as_deref(),
                    *self.policy.batch(),
                ) => read,
            };

            let records = match read {
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "Pending read failed, backing off");
                    tokio::time::sleep(*self.policy.backoff()).await;
                    continue;
                }
            };
            let Some(last) = records.last().map(|record| record.offset().clone()) else {
                if replayed > 0 {
                    info!(replayed, "Pending records redelivered");
                }
                return true;
            };

            for record in &records {
                self.deliver(handler, record).await;
                self.acknowledge(record).await;
            }
            replayed += records.len();
            after = Some(last);
        }
    }

    async fn acknowledge(&self, record: &LogRecord) {
        if let Err(e) = self.log.ack(&self.stream, &self.group, record.offset()).await {
            warn!(offset = %record.offset(), error = %e, "Acknowledge failed");
        }
    }

    async fn deliver<M, H>(&self, handler: &H, record: &LogRecord)
    where
        M: DeserializeOwned + Debug + Send + Sync,
        H: MessageHandler<M>,
    {
        let message: M = match serde_json::from_str(record.payload()) {
            Ok(message) => message,
            Err(e) => {
                error!(offset = %record.offset(), error = %e, "Dropping undecodable record");
                return;
            }
        };
        info!(offset = %record.offset(), message = ?message, "Received message");

        let attempts = (*self.policy.attempts()).max(1);
        for attempt in 1..=attempts {
            match handler.handle(&message).await {
                Ok(()) => {
                    debug!(offset = %record.offset(), attempt, "Handled");
                    return;
                }
                Err(e) if attempt < attempts => {
                    warn!(offset = %record.offset(), attempt, error = %e, "Handler failed, retrying");
                    tokio::time::sleep(*self.policy.backoff()).await;
                }
                Err(e) => {
                    error!(offset = %record.offset(), attempt, error = %e, "Handler failed, dropping record");
                }
            }
        }
    }
}
