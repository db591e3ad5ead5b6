//! Error taxonomy for the coordination core.

use derive_more::Display;
use strictly_tictactoe::{MoveRejected, NoLegalMove, Sign};
use uuid::Uuid;

use crate::bus::BusError;
use crate::db::DbError;
use crate::lock::LockError;

/// What went wrong.
#[derive(Debug, Display)]
pub enum DuelErrorKind {
    /// A referenced game or player does not exist.
    #[display("Not found: {}", _0)]
    NotFound(String),

    /// An incoming move message failed validation.
    #[display("{}", _0)]
    MoveRejected(MoveRejected),

    /// The local player is already the joined player of this game.
    #[display("Player {} already joined game {}", player_id, game_id)]
    AlreadyJoined {
        /// Player attempting to join.
        player_id: Uuid,
        /// Game being joined.
        game_id: Uuid,
    },

    /// The joined player already uses the local player's sign.
    #[display("Player with sign {} already joined game {}", sign, game_id)]
    SignConflict {
        /// Sign both players claim.
        sign: Sign,
        /// Game being joined.
        game_id: Uuid,
    },

    /// The game already has two players.
    #[display("Game {} already has two players", _0)]
    PlayerLimitExceeded(Uuid),

    /// A lease could not be acquired within the bounded wait.
    #[display("Lock unavailable: {}", _0)]
    LockUnavailable(LockError),

    /// A lease could not be released after the critical section ran.
    #[display("Lock release failed: {}", _0)]
    LockReleaseFailed(LockError),

    /// The publish retry policy gave up.
    #[display("Publish to '{}' exhausted after {} attempts: {}", stream, attempts, last)]
    PublishExhausted {
        /// Stream that could not be written.
        stream: String,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: BusError,
    },

    /// A game is already in progress, so a new one cannot be created.
    #[display("Game {} is already in progress", _0)]
    GameAlreadyExists(Uuid),

    /// The strategy was asked to move on a full board.
    #[display("{}", _0)]
    NoLegalMove(NoLegalMove),

    /// Persistence failure.
    #[display("{}", _0)]
    Db(DbError),

    /// Message log failure outside the retrying publisher.
    #[display("{}", _0)]
    Bus(BusError),

    /// A message could not be encoded or decoded.
    #[display("Codec error: {}", _0)]
    Codec(String),

    /// A watched match did not end in time.
    #[display("Timed out: {}", _0)]
    Timeout(String),
}

impl DuelErrorKind {
    /// True for failures of a collaborator that a later redelivery may not
    /// hit again; protocol rejections are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DuelErrorKind::LockUnavailable(_)
                | DuelErrorKind::LockReleaseFailed(_)
                | DuelErrorKind::PublishExhausted { .. }
                | DuelErrorKind::Db(_)
                | DuelErrorKind::Bus(_)
        )
    }
}

/// Core error with caller location tracking.
#[derive(Debug, Display)]
#[display("{} at {}:{}", kind, file, line)]
pub struct DuelError {
    kind: DuelErrorKind,
    line: u32,
    file: &'static str,
}

impl DuelError {
    /// Creates a new error recording the caller's location.
    #[track_caller]
    pub fn new(kind: DuelErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for [`DuelErrorKind::NotFound`].
    #[track_caller]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(DuelErrorKind::NotFound(what.into()))
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &DuelErrorKind {
        &self.kind
    }

    /// Consumes the error, returning its kind.
    pub fn into_kind(self) -> DuelErrorKind {
        self.kind
    }

    /// Source file where the error was raised.
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// Line where the error was raised.
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl std::error::Error for DuelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            DuelErrorKind::MoveRejected(err) => Some(err),
            DuelErrorKind::LockUnavailable(err) | DuelErrorKind::LockReleaseFailed(err) => Some(err),
            DuelErrorKind::PublishExhausted { last, .. } => Some(last),
            DuelErrorKind::NoLegalMove(err) => Some(err),
            DuelErrorKind::Db(err) => Some(err),
            DuelErrorKind::Bus(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for DuelError {
    #[track_caller]
    fn from(err: DbError) -> Self {
        Self::new(DuelErrorKind::Db(err))
    }
}

impl From<BusError> for DuelError {
    #[track_caller]
    fn from(err: BusError) -> Self {
        Self::new(DuelErrorKind::Bus(err))
    }
}

impl From<MoveRejected> for DuelError {
    #[track_caller]
    fn from(err: MoveRejected) -> Self {
        Self::new(DuelErrorKind::MoveRejected(err))
    }
}

impl From<NoLegalMove> for DuelError {
    #[track_caller]
    fn from(err: NoLegalMove) -> Self {
        Self::new(DuelErrorKind::NoLegalMove(err))
    }
}

impl From<serde_json::Error> for DuelError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(DuelErrorKind::Codec(err.to_string()))
    }
}
