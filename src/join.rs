//! Two-player join handshake.

use derive_more::Display;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::bus::Publisher;
use crate::db::GameRepository;
use crate::error::{DuelError, DuelErrorKind};
use crate::lock::{LockGateway, LockPath};
use crate::messages::LifecycleMessage;
use crate::model::{LocalPlayer, MAX_PLAYERS};

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JoinOutcome {
    /// The local player is the first to join; the game stays `NEW`.
    #[display("waiting for opponent")]
    WaitingForOpponent,
    /// The local player completed the pair; the game is `IN_PROGRESS` and
    /// the lifecycle event announcing it has been published.
    #[display("started")]
    Started,
}

/// Serializes joins under the global join lease.
#[derive(Debug, Clone)]
pub struct JoinCoordinator {
    repository: GameRepository,
    publisher: Publisher,
    locks: LockGateway,
}

impl JoinCoordinator {
    /// Creates a coordinator over the given collaborators.
    pub fn new(repository: GameRepository, publisher: Publisher, locks: LockGateway) -> Self {
        Self {
            repository,
            publisher,
            locks,
        }
    }

    /// Joins `local` to the game `game_id`.
    ///
    /// The second join moves the game to `IN_PROGRESS` with the joiner as
    /// last played, so the first joiner opens the match. If announcing the
    /// start fails, the second seat is rolled back before the error returns.
    ///
    /// # Errors
    ///
    /// - [`DuelErrorKind::NotFound`] if the game or the local player record is missing.
    /// - [`DuelErrorKind::AlreadyJoined`] if `local` is the player already joined.
    /// - [`DuelErrorKind::SignConflict`] if the joined player has the same sign.
    /// - [`DuelErrorKind::PlayerLimitExceeded`] if two players have joined.
    /// - Lock, persistence or publish errors.
    #[instrument(skip(self, local), fields(player_id = %local.id(), sign = %local.sign()))]
    pub async fn join(&self, game_id: Uuid, local: LocalPlayer) -> Result<JoinOutcome, DuelError> {
        let repository = self.repository.clone();
        let publisher = self.publisher.clone();

        self.locks
            .with_lock(LockPath::Join, move || async move {
                let mut game = repository
                    .load_game(game_id)?
                    .ok_or_else(|| DuelError::not_found(format!("Game with id: {}", game_id)))?;
                let mut player = repository
                    .load_player(*local.id())?
                    .ok_or_else(|| DuelError::not_found(format!("Player with id: {}", local.id())))?;

                let joined = game.players().clone();
                match joined.as_slice() {
                    [] => {
                        debug!("Adding first player");
                        game.add_player(*local.id());
                        player.join(game_id);
                        repository.save_game_and_player(&game, &player)?;
                        info!("Joined as first player");
                        Ok(JoinOutcome::WaitingForOpponent)
                    }
                    &[first] => {
                        if local.is(first) {
                            return Err(DuelError::new(DuelErrorKind::AlreadyJoined {
                                player_id: first,
                                game_id,
                            }));
                        }
                        let opponent = repository.load_player(first)?.ok_or_else(|| {
                            DuelError::not_found(format!("Player with id: {}", first))
                        })?;
                        if opponent.sign() == local.sign() {
                            return Err(DuelError::new(DuelErrorKind::SignConflict {
                                sign: *local.sign(),
                                game_id,
                            }));
                        }

                        debug!(opponent_id = %first, "Adding second player");
                        let (waiting, unseated) = (game.clone(), player.clone());
                        game.add_player(*local.id());
                        game.start(*local.id());
                        player.join(game_id);
                        repository.save_game_and_player(&game, &player)?;

                        let started = LifecycleMessage::new(game_id, *game.status(), Some(*local.id()));
                        if let Err(e) = publisher.publish_lifecycle(&started).await {
                            // Undo the seat so a redelivered join can start the game again.
                            match repository.save_game_and_player(&waiting, &unseated) {
                                Ok(()) => warn!(error = %e, "Start not announced, seat rolled back"),
                                Err(rollback) => error!(
                                    error = %e,
                                    rollback = %rollback,
                                    "Start not announced and seat rollback failed"
                                ),
                            }
                            return Err(e);
                        }
                        info!("Joined as second player, game started");
                        Ok(JoinOutcome::Started)
                    }
                    players => {
                        debug!(count = players.len(), max = MAX_PLAYERS, "Game is full");
                        Err(DuelError::new(DuelErrorKind::PlayerLimitExceeded(game_id)))
                    }
                }
            })
            .await
    }
}
