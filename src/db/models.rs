//! Diesel row types and their conversions to domain records.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use strictly_tictactoe::{Board, GameStatus, Sign};
use tracing::instrument;
use uuid::Uuid;

use crate::db::{DbError, schema};
use crate::model::{Game, Player};

/// Row of the `games` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable)]
#[diesel(table_name = schema::games)]
pub(crate) struct GameRow {
    pub(crate) id: String,
    pub(crate) created_at: NaiveDateTime,
    pub(crate) board: String,
    pub(crate) status: String,
    pub(crate) last_played_player_id: Option<String>,
    pub(crate) winner_player_id: Option<String>,
}

/// Row of the `game_players` join table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::game_players)]
pub(crate) struct GamePlayerRow {
    pub(crate) game_id: String,
    pub(crate) player_id: String,
    pub(crate) join_order: i32,
}

/// Row of the `players` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable)]
#[diesel(table_name = schema::players)]
pub(crate) struct PlayerRow {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) sign: String,
    pub(crate) current_game_id: Option<String>,
}

fn parse_optional_id(id: Option<&str>) -> Result<Option<Uuid>, DbError> {
    id.map(Uuid::parse_str).transpose().map_err(DbError::from)
}

impl GameRow {
    /// Flattens a game into its row; player membership is stored separately.
    #[instrument(skip(game), fields(game_id = %game.id()))]
    pub(crate) fn from_game(game: &Game) -> Result<Self, DbError> {
        Ok(Self {
            id: game.id().to_string(),
            created_at: *game.created_at(),
            board: serde_json::to_string(game.board())?,
            status: game.status().to_string(),
            last_played_player_id: game.last_played().map(|id| id.to_string()),
            winner_player_id: game.winner().map(|id| id.to_string()),
        })
    }

    /// Rebuilds the game from this row and its ordered membership rows.
    #[instrument(skip(self, members), fields(game_id = %self.id))]
    pub(crate) fn into_game(self, members: Vec<GamePlayerRow>) -> Result<Game, DbError> {
        let board: Board = serde_json::from_str(&self.board)?;
        let status: GameStatus = self
            .status
            .parse()
            .map_err(|_| DbError::new(format!("Invalid game status: '{}'", self.status)))?;
        let players = members
            .iter()
            .map(|member| Uuid::parse_str(&member.player_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Game::restore(
            Uuid::parse_str(&self.id)?,
            self.created_at,
            board,
            status,
            players,
            parse_optional_id(self.last_played_player_id.as_deref())?,
            parse_optional_id(self.winner_player_id.as_deref())?,
        ))
    }
}

impl PlayerRow {
    /// Flattens a player into its row.
    pub(crate) fn from_player(player: &Player) -> Self {
        Self {
            id: player.id().to_string(),
            name: player.name().clone(),
            sign: player.sign().to_string(),
            current_game_id: player.current_game().map(|id| id.to_string()),
        }
    }

    /// Rebuilds the player from this row.
    #[instrument(skip(self), fields(player_id = %self.id))]
    pub(crate) fn into_player(self) -> Result<Player, DbError> {
        let sign: Sign = self
            .sign
            .parse()
            .map_err(|_| DbError::new(format!("Invalid player sign: '{}'", self.sign)))?;
        Ok(Player::new(
            Uuid::parse_str(&self.id)?,
            self.name,
            sign,
            parse_optional_id(self.current_game_id.as_deref())?,
        ))
    }
}
