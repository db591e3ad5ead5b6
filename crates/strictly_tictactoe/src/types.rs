//! Core domain types for tic-tac-toe.

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Mark assigned to a player for the whole match.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum Sign {
    /// The `X` mark.
    X,
    /// The `O` mark.
    O,
}

impl Sign {
    /// Returns the other sign.
    pub fn opponent(self) -> Self {
        match self {
            Sign::X => Sign::O,
            Sign::O => Sign::X,
        }
    }
}

/// Contents of one board cell.
///
/// On the wire a cell is a string: `""` when empty, otherwise the sign name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Cell {
    /// Nobody has played here yet.
    #[default]
    Empty,
    /// Cell written by a player. Cells are never overwritten.
    Occupied(Sign),
}

impl Cell {
    /// Returns the sign in this cell, if any.
    pub fn sign(self) -> Option<Sign> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(sign) => Some(sign),
        }
    }
}

impl From<Cell> for String {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => String::new(),
            Cell::Occupied(sign) => sign.to_string(),
        }
    }
}

impl TryFrom<String> for Cell {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Cell::Empty);
        }
        value
            .parse::<Sign>()
            .map(Cell::Occupied)
            .map_err(|_| format!("Unknown cell value '{}'", value))
    }
}

/// A validated board coordinate. `row` and `col` are both in `0..3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("({}, {})", row, col)]
pub struct Coord {
    row: u8,
    col: u8,
}

impl Coord {
    /// All nine coordinates in row-major order.
    pub const ALL: [Coord; 9] = [
        Coord { row: 0, col: 0 },
        Coord { row: 0, col: 1 },
        Coord { row: 0, col: 2 },
        Coord { row: 1, col: 0 },
        Coord { row: 1, col: 1 },
        Coord { row: 1, col: 2 },
        Coord { row: 2, col: 0 },
        Coord { row: 2, col: 1 },
        Coord { row: 2, col: 2 },
    ];

    /// Creates a coordinate, returning `None` when either axis is outside `0..3`.
    pub fn new(row: u8, col: u8) -> Option<Self> {
        (row < 3 && col < 3).then_some(Self { row, col })
    }

    /// Converts the signed `moveX`/`moveY` pair carried by move messages.
    #[instrument]
    pub fn from_wire(x: i32, y: i32) -> Option<Self> {
        let row = u8::try_from(x).ok()?;
        let col = u8::try_from(y).ok()?;
        Self::new(row, col)
    }

    /// Row index (the message's `moveX`).
    pub fn row(self) -> u8 {
        self.row
    }

    /// Column index (the message's `moveY`).
    pub fn col(self) -> u8 {
        self.col
    }

    /// Row-major index in `0..9`.
    pub fn index(self) -> usize {
        usize::from(self.row) * 3 + usize::from(self.col)
    }
}

/// Lifecycle status of a match.
///
/// Stored and transmitted in upper snake case (`NEW`, `IN_PROGRESS`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Created, waiting for two players.
    New,
    /// Both players joined, moves are being exchanged.
    InProgress,
    /// A player completed a line.
    Finished,
    /// The board filled up without a completed line.
    Draw,
}

impl GameStatus {
    /// True for `Finished` and `Draw`.
    pub fn is_over(self) -> bool {
        matches!(self, GameStatus::Finished | GameStatus::Draw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_wire_format() {
        let cells = vec![Cell::Empty, Cell::Occupied(Sign::X), Cell::Occupied(Sign::O)];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"["","X","O"]"#);
    }

    #[test]
    fn test_cell_rejects_unknown_value() {
        let result: Result<Cell, _> = serde_json::from_str(r#""Z""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_coord_from_wire_bounds() {
        assert_eq!(Coord::from_wire(2, 1), Coord::new(2, 1));
        assert!(Coord::from_wire(3, 0).is_none());
        assert!(Coord::from_wire(0, -1).is_none());
    }

    #[test]
    fn test_status_names() {
        assert_eq!(GameStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!("DRAW".parse::<GameStatus>().unwrap(), GameStatus::Draw);
        assert_eq!(
            serde_json::to_string(&GameStatus::New).unwrap(),
            r#""NEW""#
        );
    }
}
