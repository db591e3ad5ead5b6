//! Wire messages exchanged over the lifecycle and moves streams.
//!
//! Both are encoded as camelCase JSON; boards travel as 3x3 arrays of
//! `""`, `"X"` and `"O"`.

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use strictly_tictactoe::{Board, GameStatus, Sign};
use uuid::Uuid;

/// A game lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleMessage {
    /// Game the event is about.
    #[serde(rename = "id", alias = "gameId")]
    game_id: Uuid,
    /// Status the game moved to.
    status: GameStatus,
    /// Player who moved last; on `IN_PROGRESS` this is the second joiner.
    last_played_player_id: Option<Uuid>,
}

/// One move, carrying the board before and after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct MoveMessage {
    /// Author of the move.
    player_id: Uuid,
    /// Game the move belongs to.
    game_id: Uuid,
    /// Sign the author wrote.
    sign: Sign,
    /// Row of the written cell. Signed so out-of-range values reach validation.
    move_x: i32,
    /// Column of the written cell.
    move_y: i32,
    /// Board the author moved from.
    previous_board: Board,
    /// Board after the move.
    new_board: Board,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strictly_tictactoe::Coord;

    #[test]
    fn test_lifecycle_wire_names() {
        let id = Uuid::nil();
        let message = LifecycleMessage::new(id, GameStatus::InProgress, Some(id));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["status"], "IN_PROGRESS");
        assert_eq!(json["lastPlayedPlayerId"], id.to_string());
    }

    #[test]
    fn test_lifecycle_accepts_null_last_played() {
        let json = r#"{"id":"00000000-0000-0000-0000-000000000000","status":"NEW","lastPlayedPlayerId":null}"#;
        let message: LifecycleMessage = serde_json::from_str(json).unwrap();
        assert_eq!(*message.status(), GameStatus::New);
        assert!(message.last_played_player_id().is_none());
    }

    #[test]
    fn test_move_wire_format() {
        let previous = Board::new();
        let Some(coord) = Coord::new(1, 2) else {
            panic!("valid coordinate");
        };
        let next = previous.apply(coord, Sign::X);
        let message = MoveMessage::new(Uuid::nil(), Uuid::nil(), Sign::X, 1, 2, previous, next);

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["moveX"], 1);
        assert_eq!(json["moveY"], 2);
        assert_eq!(json["sign"], "X");
        assert_eq!(json["newBoard"][1][2], "X");
        assert_eq!(json["previousBoard"][1][2], "");

        let decoded: MoveMessage = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, message);
    }
}
