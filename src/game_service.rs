//! Game creation, status recomputation and the current-game view.

use derive_getters::Getters;
use serde::Serialize;
use strictly_tictactoe::{Board, GameStatus};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::bus::Publisher;
use crate::db::GameRepository;
use crate::error::{DuelError, DuelErrorKind};
use crate::lock::{LockGateway, LockPath};
use crate::messages::LifecycleMessage;
use crate::model::Game;

/// What `GET /game` shows: the most recently created game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct GameView {
    status: GameStatus,
    /// Winner's display name, only for a `FINISHED` game.
    winner: Option<String>,
    board: Option<Board>,
}

/// Operations on games that are not part of the turn protocol itself.
#[derive(Debug, Clone)]
pub struct GameService {
    repository: GameRepository,
    publisher: Publisher,
    locks: LockGateway,
}

impl GameService {
    /// Creates a service over the given collaborators.
    pub fn new(repository: GameRepository, publisher: Publisher, locks: LockGateway) -> Self {
        Self {
            repository,
            publisher,
            locks,
        }
    }

    /// Underlying repository.
    pub fn repository(&self) -> &GameRepository {
        &self.repository
    }

    /// Creates a `NEW` game and announces it on the lifecycle stream.
    ///
    /// # Errors
    ///
    /// - [`DuelErrorKind::GameAlreadyExists`] if a game is in progress.
    /// - [`DuelErrorKind::Db`] or [`DuelErrorKind::PublishExhausted`] otherwise.
    #[instrument(skip(self))]
    pub async fn create_new_game(&self) -> Result<Game, DuelError> {
        if let Some(running) = self.repository.find_game_by_status(GameStatus::InProgress)? {
            return Err(DuelError::new(DuelErrorKind::GameAlreadyExists(*running.id())));
        }

        let game = Game::new();
        self.repository.create_game(&game)?;
        info!(game_id = %game.id(), "New game created");

        self.publisher
            .publish_lifecycle(&LifecycleMessage::new(*game.id(), GameStatus::New, None))
            .await?;
        Ok(game)
    }

    /// Returns the most recently created game, or a `FINISHED` view without a
    /// board when no game exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`DuelErrorKind::Db`] if a lookup fails.
    #[instrument(skip(self))]
    pub fn current_game_view(&self) -> Result<GameView, DuelError> {
        let Some(game) = self.repository.find_last_created_game()? else {
            debug!("No game yet");
            return Ok(GameView {
                status: GameStatus::Finished,
                winner: None,
                board: None,
            });
        };

        let winner = match game.winner() {
            Some(player_id) => self
                .repository
                .load_player(*player_id)?
                .map(|player| player.name().clone()),
            None => None,
        };

        Ok(GameView {
            status: *game.status(),
            winner,
            board: Some(*game.board()),
        })
    }

    /// Recomputes the status of `game` from its board under the game-over
    /// lease, records `mover` as winner on `FINISHED` and persists the game.
    ///
    /// Returns the updated game.
    ///
    /// # Errors
    ///
    /// Returns a lock or persistence error; the game is then not saved.
    #[instrument(skip(self, game), fields(game_id = %game.id(), mover = %mover))]
    pub async fn is_game_over(&self, mut game: Game, mover: Uuid) -> Result<Game, DuelError> {
        let repository = self.repository.clone();
        self.locks
            .with_lock(LockPath::GameOver(*game.id()), move || async move {
                let status = game.board().status();
                game.conclude(status, mover);
                repository.save_game(&game)?;
                if status.is_over() {
                    info!(status = %status, winner = ?game.winner(), "Game over");
                }
                Ok(game)
            })
            .await
    }
}
