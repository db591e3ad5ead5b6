//! Message log error type.

use derive_more::{Display, Error};
use tracing::instrument;

/// Append, read or acknowledge failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Bus error: {} at {}:{}", message, file, line)]
pub struct BusError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl BusError {
    /// Creates a new bus error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<redis::RedisError> for BusError {
    #[track_caller]
    fn from(err: redis::RedisError) -> Self {
        Self::new(format!("Redis error: {}", err))
    }
}
