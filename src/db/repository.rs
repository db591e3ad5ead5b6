//! Database repository for games and players.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use strictly_tictactoe::GameStatus;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::db::models::{GamePlayerRow, GameRow, PlayerRow};
use crate::db::{DbError, schema};
use crate::model::{Game, Player};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// How long a connection waits on a database locked by the other process.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Database repository for game and player records.
///
/// Every call opens its own connection, so the repository is cheap to clone
/// and safe to share between the lifecycle and moves handlers.
#[derive(Debug, Clone)]
pub struct GameRepository {
    db_path: String,
}

impl GameRepository {
    /// Opens the database at the given path and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened or migrated.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        info!(path = %db_path, "Creating GameRepository");
        let repository = Self { db_path };

        let mut conn = repository.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migrations failed: {}", e)))?;
        debug!(count = applied.len(), "Migrations applied");

        Ok(repository)
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS))?;
        Ok(conn)
    }

    /// Inserts a freshly created game.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the id already exists or a database error occurs.
    #[instrument(skip(self, game), fields(game_id = %game.id()))]
    pub fn create_game(&self, game: &Game) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let row = GameRow::from_game(game)?;

        diesel::insert_into(schema::games::table)
            .values(&row)
            .execute(&mut conn)?;

        info!(status = %game.status(), "Game created");
        Ok(())
    }

    /// Overwrites a game and its ordered player list.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, game), fields(game_id = %game.id()))]
    pub fn save_game(&self, game: &Game) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        conn.transaction::<_, DbError, _>(|conn| write_game(conn, game))?;
        debug!(status = %game.status(), board = %game.board(), "Game saved");
        Ok(())
    }

    /// Saves a game and a player in one transaction.
    ///
    /// Used by the join handshake so the game's player list and the player's
    /// back-reference never disagree.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs; nothing is written then.
    #[instrument(skip(self, game, player), fields(game_id = %game.id(), player_id = %player.id()))]
    pub fn save_game_and_player(&self, game: &Game, player: &Player) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        conn.transaction::<_, DbError, _>(|conn| {
            write_game(conn, game)?;
            write_player(conn, player)
        })?;
        info!(players = game.players().len(), status = %game.status(), "Game and player saved");
        Ok(())
    }

    /// Loads a game by id. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the row is corrupt.
    #[instrument(skip(self))]
    pub fn load_game(&self, game_id: Uuid) -> Result<Option<Game>, DbError> {
        let mut conn = self.connection()?;
        let row = schema::games::table
            .find(game_id.to_string())
            .select(GameRow::as_select())
            .first(&mut conn)
            .optional()?;

        row.map(|row| read_game(&mut conn, row)).transpose()
    }

    /// Finds the most recently created game with the given status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the row is corrupt.
    #[instrument(skip(self))]
    pub fn find_game_by_status(&self, status: GameStatus) -> Result<Option<Game>, DbError> {
        let mut conn = self.connection()?;
        let row = schema::games::table
            .filter(schema::games::status.eq(status.to_string()))
            .order(schema::games::created_at.desc())
            .select(GameRow::as_select())
            .first(&mut conn)
            .optional()?;

        debug!(found = row.is_some(), "Game lookup by status");
        row.map(|row| read_game(&mut conn, row)).transpose()
    }

    /// Finds the most recently created game of any status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the row is corrupt.
    #[instrument(skip(self))]
    pub fn find_last_created_game(&self) -> Result<Option<Game>, DbError> {
        let mut conn = self.connection()?;
        let row = schema::games::table
            .order(schema::games::created_at.desc())
            .select(GameRow::as_select())
            .first(&mut conn)
            .optional()?;

        row.map(|row| read_game(&mut conn, row)).transpose()
    }

    /// Loads a player by id. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the row is corrupt.
    #[instrument(skip(self))]
    pub fn load_player(&self, player_id: Uuid) -> Result<Option<Player>, DbError> {
        let mut conn = self.connection()?;
        schema::players::table
            .find(player_id.to_string())
            .select(PlayerRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(PlayerRow::into_player)
            .transpose()
    }

    /// Finds a player by display name. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the row is corrupt.
    #[instrument(skip(self))]
    pub fn find_player_by_name(&self, name: &str) -> Result<Option<Player>, DbError> {
        let mut conn = self.connection()?;
        let player = schema::players::table
            .filter(schema::players::name.eq(name))
            .select(PlayerRow::as_select())
            .first(&mut conn)
            .optional()?;

        if player.is_some() {
            debug!("Player found");
        } else {
            debug!("Player not found");
        }

        player.map(PlayerRow::into_player).transpose()
    }

    /// Inserts or overwrites a player.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, player), fields(player_id = %player.id(), name = %player.name()))]
    pub fn save_player(&self, player: &Player) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        write_player(&mut conn, player)?;
        info!(sign = %player.sign(), "Player saved");
        Ok(())
    }
}

fn write_game(conn: &mut SqliteConnection, game: &Game) -> Result<(), DbError> {
    let row = GameRow::from_game(game)?;
    diesel::replace_into(schema::games::table)
        .values(&row)
        .execute(conn)?;

    diesel::delete(schema::game_players::table.filter(schema::game_players::game_id.eq(&row.id)))
        .execute(conn)?;

    let members = game
        .players()
        .iter()
        .zip(0..)
        .map(|(player_id, join_order)| GamePlayerRow {
            game_id: row.id.clone(),
            player_id: player_id.to_string(),
            join_order,
        })
        .collect::<Vec<_>>();

    if !members.is_empty() {
        diesel::insert_into(schema::game_players::table)
            .values(&members)
            .execute(conn)?;
    }
    Ok(())
}

fn write_player(conn: &mut SqliteConnection, player: &Player) -> Result<(), DbError> {
    diesel::replace_into(schema::players::table)
        .values(&PlayerRow::from_player(player))
        .execute(conn)?;
    Ok(())
}

fn read_game(conn: &mut SqliteConnection, row: GameRow) -> Result<Game, DbError> {
    let members = schema::game_players::table
        .filter(schema::game_players::game_id.eq(&row.id))
        .order(schema::game_players::join_order.asc())
        .select(GamePlayerRow::as_select())
        .load(conn)?;
    row.into_game(members)
}
