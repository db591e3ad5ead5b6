//! Persisted game and player records, and the process-local identity.
//!
//! Game and Player reference each other only by id: a game keeps the ordered
//! ids of its joined players, a player keeps the id of the game it joined.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use strictly_tictactoe::{Board, GameStatus, Sign};
use uuid::Uuid;

/// Maximum number of players in a match.
pub const MAX_PLAYERS: usize = 2;

/// A match as stored by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Game {
    id: Uuid,
    created_at: NaiveDateTime,
    board: Board,
    status: GameStatus,
    /// Joined player ids in join order; the first entry is player one.
    players: Vec<Uuid>,
    last_played: Option<Uuid>,
    winner: Option<Uuid>,
}

impl Game {
    /// Creates a fresh `New` game with an empty board.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now().naive_utc(),
            board: Board::new(),
            status: GameStatus::New,
            players: Vec::new(),
            last_played: None,
            winner: None,
        }
    }

    /// Rebuilds a game from stored fields.
    pub fn restore(
        id: Uuid,
        created_at: NaiveDateTime,
        board: Board,
        status: GameStatus,
        players: Vec<Uuid>,
        last_played: Option<Uuid>,
        winner: Option<Uuid>,
    ) -> Self {
        Self {
            id,
            created_at,
            board,
            status,
            players,
            last_played,
            winner,
        }
    }

    /// Checks whether `player_id` has joined this game.
    pub fn has_player(&self, player_id: Uuid) -> bool {
        self.players.contains(&player_id)
    }

    /// Appends a joined player. Callers enforce [`MAX_PLAYERS`].
    pub fn add_player(&mut self, player_id: Uuid) {
        self.players.push(player_id);
    }

    /// Moves the game to `InProgress`, recording the second joiner as last played.
    pub fn start(&mut self, last_played: Uuid) {
        self.last_played = Some(last_played);
        self.status = GameStatus::InProgress;
    }

    /// Commits a published board and its author.
    pub fn commit_move(&mut self, board: Board, mover: Uuid) {
        self.board = board;
        self.last_played = Some(mover);
    }

    /// Records the status derived from the board; a `Finished` game is won by `mover`.
    pub fn conclude(&mut self, status: GameStatus, mover: Uuid) {
        if status == GameStatus::Finished {
            self.winner = Some(mover);
        }
        self.status = status;
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

/// A player as stored by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct Player {
    id: Uuid,
    name: String,
    sign: Sign,
    current_game: Option<Uuid>,
}

impl Player {
    /// Creates a player that has not joined any game.
    pub fn create(name: impl Into<String>, sign: Sign) -> Self {
        Self::new(Uuid::new_v4(), name.into(), sign, None)
    }

    /// Records the game this player joined.
    pub fn join(&mut self, game_id: Uuid) {
        self.current_game = Some(game_id);
    }
}

/// The one player this process plays for.
///
/// Built once at startup and passed into every coordinator call; it never
/// changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct LocalPlayer {
    id: Uuid,
    sign: Sign,
}

impl LocalPlayer {
    /// Captures the identity of a stored player.
    pub fn of(player: &Player) -> Self {
        Self {
            id: player.id,
            sign: player.sign,
        }
    }

    /// Checks whether `player_id` is this process's player.
    pub fn is(&self, player_id: Uuid) -> bool {
        self.id == player_id
    }
}
