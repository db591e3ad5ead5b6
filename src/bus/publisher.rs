//! Retrying publisher for the lifecycle and moves streams.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::bus::{MessageLog, RetryPolicy, StreamNames};
use crate::error::{DuelError, DuelErrorKind};
use crate::messages::{LifecycleMessage, MoveMessage};

/// Publishes messages, retrying failed appends with exponential backoff.
#[derive(Debug, Clone)]
pub struct Publisher {
    log: Arc<dyn MessageLog>,
    streams: StreamNames,
    policy: RetryPolicy,
}

impl Publisher {
    /// Creates a publisher writing to `streams` on `log`.
    pub fn new(log: Arc<dyn MessageLog>, streams: StreamNames, policy: RetryPolicy) -> Self {
        Self {
            log,
            streams,
            policy,
        }
    }

    /// Publishes a lifecycle event and returns its log offset.
    ///
    /// # Errors
    ///
    /// Returns [`DuelErrorKind::PublishExhausted`] once every attempt failed.
    #[instrument(skip(self, message), fields(game_id = %message.game_id(), status = %message.status()))]
    pub async fn publish_lifecycle(&self, message: &LifecycleMessage) -> Result<String, DuelError> {
        self.publish(self.streams.lifecycle(), message).await
    }

    /// Publishes a move and returns its log offset.
    ///
    /// # Errors
    ///
    /// Returns [`DuelErrorKind::PublishExhausted`] once every attempt failed.
    #[instrument(
        skip(self, message),
        fields(game_id = %message.game_id(), player_id = %message.player_id(), x = message.move_x(), y = message.move_y())
    )]
    pub async fn publish_move(&self, message: &MoveMessage) -> Result<String, DuelError> {
        self.publish(self.streams.moves(), message).await
    }

    async fn publish<M: Serialize>(&self, stream: &str, message: &M) -> Result<String, DuelError> {
        let payload = serde_json::to_string(message)?;
        let max_attempts = (*self.policy.max_attempts()).max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.log.append(stream, &payload).await {
                Ok(offset) => {
                    info!(stream, offset = %offset, attempt, "Sent message");
                    return Ok(offset);
                }
                Err(e) if attempt >= max_attempts => {
                    error!(stream, attempt, error = %e, "Unable to send message, giving up");
                    return Err(DuelError::new(DuelErrorKind::PublishExhausted {
                        stream: stream.to_string(),
                        attempts: attempt,
                        last: e,
                    }));
                }
                Err(e) => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        stream,
                        attempt,
                        retry_delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryLog;
    use std::time::Duration;
    use strictly_tictactoe::GameStatus;
    use uuid::Uuid;

    fn publisher(log: &MemoryLog, attempts: u32) -> Publisher {
        Publisher::new(
            Arc::new(log.clone()),
            StreamNames::new("game".to_string(), "game-moves".to_string()),
            RetryPolicy::new(Duration::from_millis(1), 2.0, Duration::from_millis(4), attempts),
        )
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let log = MemoryLog::new();
        log.fail_next_appends(2);
        let message = LifecycleMessage::new(Uuid::new_v4(), GameStatus::New, None);

        let offset = publisher(&log, 3).publish_lifecycle(&message).await.unwrap();

        assert_eq!(offset, "0");
        assert_eq!(log.payloads("game").len(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let log = MemoryLog::new();
        log.fail_next_appends(5);
        let message = LifecycleMessage::new(Uuid::new_v4(), GameStatus::New, None);

        let err = publisher(&log, 3)
            .publish_lifecycle(&message)
            .await
            .unwrap_err();

        match err.kind() {
            DuelErrorKind::PublishExhausted { stream, attempts, .. } => {
                assert_eq!(stream, "game");
                assert_eq!(*attempts, 3);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(log.payloads("game").is_empty());
    }
}
