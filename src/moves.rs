//! Move application, reconciliation and move synthesis.
//!
//! Every process consumes every move, its own included. Applying a move and
//! deciding whether a reply is owed happen under the per-game apply lease;
//! the reply itself is planned, delayed and published after that lease is
//! given back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::Display;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use strictly_tictactoe::{Board, GameStatus, MoveStrategy, validate_transition};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bus::Publisher;
use crate::db::GameRepository;
use crate::error::DuelError;
use crate::game_service::GameService;
use crate::lock::{LockGateway, LockPath};
use crate::messages::{LifecycleMessage, MoveMessage};
use crate::model::{Game, LocalPlayer};

/// What applying a move message did to the stored game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Reconciliation {
    /// The message's board was committed; carries the recomputed status.
    #[display("applied ({})", _0)]
    Applied(GameStatus),
    /// The board was already committed and the opponent authored it, so the
    /// local player still owes a reply.
    #[display("owed")]
    Owed,
    /// The local player authored an already committed move.
    #[display("unchanged")]
    Unchanged,
    /// The stored game is no longer in progress; carries its status.
    #[display("closed ({})", _0)]
    Closed(GameStatus),
    /// The message describes a position the stored game has already passed.
    #[display("stale")]
    Stale,
}

/// Result of handling one move message.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct MoveOutcome {
    reconciliation: Reconciliation,
    /// Reply published by the local player, if any.
    reply: Option<MoveMessage>,
}

/// Boards this process has already answered, per game.
///
/// A claim succeeds once per `(game, board)`, which keeps a redelivered
/// opponent move from producing a second reply.
#[derive(Debug, Clone, Default)]
pub struct OutboundLedger {
    answered: Arc<Mutex<HashMap<Uuid, Board>>>,
}

impl OutboundLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the right to answer `board` in `game_id`.
    pub fn claim(&self, game_id: Uuid, board: Board) -> bool {
        let mut answered = self.answered.lock();
        if answered.get(&game_id) == Some(&board) {
            return false;
        }
        answered.insert(game_id, board);
        true
    }

    /// Gives a claim back so a later delivery may answer `board` again.
    pub fn forget(&self, game_id: Uuid, board: Board) {
        let mut answered = self.answered.lock();
        if answered.get(&game_id) == Some(&board) {
            answered.remove(&game_id);
        }
    }

    /// Drops everything remembered about `game_id` once it is over.
    pub fn close(&self, game_id: Uuid) {
        self.answered.lock().remove(&game_id);
    }

    /// Number of games with a remembered answer.
    pub fn len(&self) -> usize {
        self.answered.lock().len()
    }

    /// Whether no game has a remembered answer.
    pub fn is_empty(&self) -> bool {
        self.answered.lock().is_empty()
    }
}

/// Synthesizes and publishes the local player's moves.
#[derive(Debug, Clone)]
pub struct MoveMaker {
    strategy: Arc<dyn MoveStrategy>,
    publisher: Publisher,
    ledger: OutboundLedger,
    rng: Arc<Mutex<StdRng>>,
    wrong_move_probability: f64,
    thinking_delay: Duration,
}

impl MoveMaker {
    /// Creates a move maker seeded from the operating system.
    pub fn new(
        strategy: Arc<dyn MoveStrategy>,
        publisher: Publisher,
        wrong_move_probability: f64,
        thinking_delay: Duration,
    ) -> Self {
        Self {
            strategy,
            publisher,
            ledger: OutboundLedger::new(),
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
            wrong_move_probability,
            thinking_delay,
        }
    }

    /// Boards answered so far.
    pub fn ledger(&self) -> &OutboundLedger {
        &self.ledger
    }

    /// Replaces the random source with a seeded one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    /// Builds the local player's next move on the stored board of `game`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DuelErrorKind::NoLegalMove`] if the board is full.
    #[instrument(skip(self, game, local), fields(game_id = %game.id(), board = %game.board()))]
    pub fn plan(&self, game: &Game, local: LocalPlayer) -> Result<MoveMessage, DuelError> {
        let previous = *game.board();
        let coord = {
            let mut rng = self.rng.lock();
            self.strategy.choose(
                &previous,
                *local.sign(),
                self.wrong_move_probability,
                &mut *rng,
            )?
        };
        let next = previous.apply(coord, *local.sign());
        debug!(coord = %coord, "Move planned");

        Ok(MoveMessage::new(
            *local.id(),
            *game.id(),
            *local.sign(),
            i32::from(coord.row()),
            i32::from(coord.col()),
            previous,
            next,
        ))
    }

    /// Answers the stored board of `game` unless this process already did.
    ///
    /// Returns the published move, or `None` when the board was already
    /// answered.
    ///
    /// # Errors
    ///
    /// Returns a planning or publish error; the claim is then given back.
    #[instrument(skip(self, game, local), fields(game_id = %game.id(), player_id = %local.id()))]
    pub async fn make_move(
        &self,
        game: &Game,
        local: LocalPlayer,
    ) -> Result<Option<MoveMessage>, DuelError> {
        let game_id = *game.id();
        let board = *game.board();
        if !self.ledger.claim(game_id, board) {
            debug!(board = %board, "Board already answered");
            return Ok(None);
        }

        let result = self.plan_and_publish(game, local).await;
        if result.is_err() {
            self.ledger.forget(game_id, board);
        }
        result.map(Some)
    }

    async fn plan_and_publish(
        &self,
        game: &Game,
        local: LocalPlayer,
    ) -> Result<MoveMessage, DuelError> {
        let message = self.plan(game, local)?;
        tokio::time::sleep(self.thinking_delay).await;
        self.publisher.publish_move(&message).await?;
        info!(x = message.move_x(), y = message.move_y(), board = %message.new_board(), "Move made");
        Ok(message)
    }
}

/// Applies incoming moves and decides when the local player moves.
#[derive(Debug, Clone)]
pub struct MoveCoordinator {
    repository: GameRepository,
    locks: LockGateway,
    games: GameService,
    maker: MoveMaker,
}

impl MoveCoordinator {
    /// Creates a coordinator over the given collaborators.
    pub fn new(
        repository: GameRepository,
        locks: LockGateway,
        games: GameService,
        maker: MoveMaker,
    ) -> Self {
        Self {
            repository,
            locks,
            games,
            maker,
        }
    }

    /// The move maker replies go through.
    pub fn maker(&self) -> &MoveMaker {
        &self.maker
    }

    /// Opens the match when an `IN_PROGRESS` event names the opponent as
    /// last played.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DuelErrorKind::NotFound`] for an unknown game, or a
    /// planning or publish error.
    #[instrument(skip(self, message, local), fields(game_id = %message.game_id(), player_id = %local.id()))]
    pub async fn on_game_started(
        &self,
        message: &LifecycleMessage,
        local: LocalPlayer,
    ) -> Result<Option<MoveMessage>, DuelError> {
        let Some(last_played) = message.last_played_player_id() else {
            debug!("No last played player");
            return Ok(None);
        };
        if local.is(*last_played) {
            debug!("Opponent opens the match");
            return Ok(None);
        }

        let game = self
            .repository
            .load_game(*message.game_id())?
            .ok_or_else(|| DuelError::not_found(format!("Game with id: {}", message.game_id())))?;
        if *game.status() != GameStatus::InProgress {
            debug!(status = %game.status(), "Game no longer in progress");
            return Ok(None);
        }
        if game.last_played().is_some_and(|id| local.is(id)) {
            debug!("Local player moved last");
            return Ok(None);
        }

        self.maker.make_move(&game, local).await
    }

    /// Applies an incoming move and publishes the local reply if one is owed.
    ///
    /// # Errors
    ///
    /// - [`crate::DuelErrorKind::MoveRejected`] if the message is not a single legal placement.
    /// - [`crate::DuelErrorKind::NotFound`] if the author or the game is unknown.
    /// - Lock, persistence, planning or publish errors.
    #[instrument(
        skip(self, message, local),
        fields(game_id = %message.game_id(), author = %message.player_id(), x = message.move_x(), y = message.move_y())
    )]
    pub async fn on_move(
        &self,
        message: &MoveMessage,
        local: LocalPlayer,
    ) -> Result<MoveOutcome, DuelError> {
        let (reconciliation, owed) = self.reconcile(message, local).await?;
        info!(reconciliation = %reconciliation, "Move reconciled");

        match reconciliation {
            Reconciliation::Applied(status) | Reconciliation::Closed(status) if status.is_over() => {
                self.maker.ledger().close(*message.game_id());
            }
            _ => {}
        }

        let reply = match owed {
            Some(game) => self.maker.make_move(&game, local).await?,
            None => None,
        };
        Ok(MoveOutcome {
            reconciliation,
            reply,
        })
    }

    /// Applies `message` to the stored game under the apply lease.
    ///
    /// Returns what happened and, when the local player owes a reply, the
    /// game to reply on.
    ///
    /// # Errors
    ///
    /// Same as [`MoveCoordinator::on_move`], minus planning and publishing.
    pub async fn reconcile(
        &self,
        message: &MoveMessage,
        local: LocalPlayer,
    ) -> Result<(Reconciliation, Option<Game>), DuelError> {
        let repository = self.repository.clone();
        let games = self.games.clone();
        let message = message.clone();

        self.locks
            .with_lock(LockPath::ApplyMove(*message.game_id()), move || async move {
                validate_transition(
                    message.previous_board(),
                    message.new_board(),
                    *message.move_x(),
                    *message.move_y(),
                    *message.sign(),
                )?;

                let author = repository.load_player(*message.player_id())?.ok_or_else(|| {
                    DuelError::not_found(format!("Player with id: {}", message.player_id()))
                })?;
                let mut game = repository.load_game(*message.game_id())?.ok_or_else(|| {
                    DuelError::not_found(format!("Game with id: {}", message.game_id()))
                })?;

                if *game.status() != GameStatus::InProgress {
                    debug!(status = %game.status(), "Game not in progress");
                    return Ok((Reconciliation::Closed(*game.status()), None));
                }

                let board_changed = game.board() != message.new_board();
                let by_opponent = !local.is(*author.id());

                if board_changed {
                    if !message.new_board().extends(game.board()) {
                        warn!(
                            stored = %game.board(),
                            incoming = %message.new_board(),
                            "Ignoring stale move"
                        );
                        return Ok((Reconciliation::Stale, None));
                    }

                    game.commit_move(*message.new_board(), *author.id());
                    let game = games.is_game_over(game, *author.id()).await?;
                    let status = *game.status();
                    let owed = (status == GameStatus::InProgress && by_opponent).then_some(game);
                    Ok((Reconciliation::Applied(status), owed))
                } else if by_opponent {
                    Ok((Reconciliation::Owed, Some(game)))
                } else {
                    Ok((Reconciliation::Unchanged, None))
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strictly_tictactoe::{Coord, Sign};

    #[test]
    fn test_ledger_claims_each_board_once() {
        let ledger = OutboundLedger::new();
        let game_id = Uuid::new_v4();
        let board = Board::new().apply(Coord::new(1, 1).unwrap(), Sign::X);

        assert!(ledger.claim(game_id, board));
        assert!(!ledger.claim(game_id, board));

        ledger.forget(game_id, board);
        assert!(ledger.claim(game_id, board));
    }

    #[test]
    fn test_forget_keeps_newer_claim() {
        let ledger = OutboundLedger::new();
        let game_id = Uuid::new_v4();
        let first = Board::new().apply(Coord::new(0, 0).unwrap(), Sign::X);
        let second = first.apply(Coord::new(2, 2).unwrap(), Sign::O);

        assert!(ledger.claim(game_id, first));
        assert!(ledger.claim(game_id, second));
        ledger.forget(game_id, first);
        assert!(!ledger.claim(game_id, second));
    }

    #[test]
    fn test_close_drops_finished_game() {
        let ledger = OutboundLedger::new();
        let done = Uuid::new_v4();
        let running = Uuid::new_v4();
        ledger.claim(done, Board::new());
        ledger.claim(running, Board::new());
        assert_eq!(ledger.len(), 2);

        ledger.close(done);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.claim(done, Board::new()));

        ledger.close(done);
        ledger.close(running);
        assert!(ledger.is_empty());
    }
}
