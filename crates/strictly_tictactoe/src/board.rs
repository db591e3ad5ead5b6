//! The 3x3 board value type and status derivation.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::types::{Cell, Coord, GameStatus, Sign};

/// The eight winning lines: three rows, three columns, two diagonals.
pub const LINES: [[Coord; 3]; 8] = {
    const fn c(row: u8, col: u8) -> Coord {
        Coord::ALL[(row * 3 + col) as usize]
    }
    [
        // Rows
        [c(0, 0), c(0, 1), c(0, 2)],
        [c(1, 0), c(1, 1), c(1, 2)],
        [c(2, 0), c(2, 1), c(2, 2)],
        // Columns
        [c(0, 0), c(1, 0), c(2, 0)],
        [c(0, 1), c(1, 1), c(2, 1)],
        [c(0, 2), c(1, 2), c(2, 2)],
        // Diagonals
        [c(0, 0), c(1, 1), c(2, 2)],
        [c(0, 2), c(1, 1), c(2, 0)],
    ]
};

/// 3x3 tic-tac-toe board.
///
/// Boards are plain values: [`Board::apply`] returns a modified copy and never
/// touches the receiver. Serialized as a JSON array of three rows of cell
/// strings, e.g. `[["X","",""],["","O",""],["","",""]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    rows: [[Cell; 3]; 3],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a board from explicit rows.
    pub fn from_rows(rows: [[Cell; 3]; 3]) -> Self {
        Self { rows }
    }

    /// Returns the rows of the board.
    pub fn rows(&self) -> &[[Cell; 3]; 3] {
        &self.rows
    }

    /// Returns the cell at `coord`.
    pub fn get(&self, coord: Coord) -> Cell {
        self.rows[usize::from(coord.row())][usize::from(coord.col())]
    }

    /// Checks whether the cell at `coord` is empty.
    pub fn is_empty(&self, coord: Coord) -> bool {
        self.get(coord) == Cell::Empty
    }

    /// Returns a copy of the board with `sign` written at `coord`.
    ///
    /// Callers are expected to check [`Board::is_empty`] first; cells are
    /// write-once in a well-formed game.
    pub fn apply(&self, coord: Coord, sign: Sign) -> Board {
        let mut next = *self;
        next.rows[usize::from(coord.row())][usize::from(coord.col())] = Cell::Occupied(sign);
        next
    }

    /// Empty cells in row-major order.
    pub fn empty_cells(&self) -> Vec<Coord> {
        Coord::ALL
            .iter()
            .copied()
            .filter(|coord| self.is_empty(*coord))
            .collect()
    }

    /// Checks whether every cell is occupied.
    pub fn is_full(&self) -> bool {
        Coord::ALL.iter().all(|coord| !self.is_empty(*coord))
    }

    /// Returns the sign holding a complete line, if any.
    pub fn winner(&self) -> Option<Sign> {
        LINES.iter().find_map(|[a, b, c]| {
            let cell = self.get(*a);
            if cell != Cell::Empty && cell == self.get(*b) && cell == self.get(*c) {
                cell.sign()
            } else {
                None
            }
        })
    }

    /// Checks whether `sign` holds a complete line.
    pub fn has_line(&self, sign: Sign) -> bool {
        let target = Cell::Occupied(sign);
        LINES
            .iter()
            .any(|line| line.iter().all(|coord| self.get(*coord) == target))
    }

    /// Derives the match status from the board alone.
    ///
    /// A completed line wins over a full board, so the last move of a full
    /// board that also completes a line yields `Finished`.
    #[instrument(skip(self), fields(board = %self))]
    pub fn status(&self) -> GameStatus {
        if self.winner().is_some() {
            GameStatus::Finished
        } else if self.is_full() {
            GameStatus::Draw
        } else {
            GameStatus::InProgress
        }
    }

    /// Coordinates where `self` and `other` differ, in row-major order.
    pub fn diff(&self, other: &Board) -> Vec<Coord> {
        Coord::ALL
            .iter()
            .copied()
            .filter(|coord| self.get(*coord) != other.get(*coord))
            .collect()
    }

    /// True when every cell written on `earlier` holds the same sign here.
    ///
    /// A board extends itself. Cells are write-once, so a board that does
    /// not extend the stored one describes a position that was already passed.
    pub fn extends(&self, earlier: &Board) -> bool {
        Coord::ALL
            .iter()
            .all(|coord| earlier.is_empty(*coord) || earlier.get(*coord) == self.get(*coord))
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (r, row) in self.rows.iter().enumerate() {
            if r > 0 {
                write!(f, "/")?;
            }
            for cell in row {
                match cell {
                    Cell::Empty => write!(f, "_")?,
                    Cell::Occupied(sign) => write!(f, "{}", sign)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(row: u8, col: u8) -> Coord {
        Coord::new(row, col).unwrap()
    }

    #[test]
    fn test_empty_board_in_progress() {
        assert_eq!(Board::new().status(), GameStatus::InProgress);
        assert_eq!(Board::new().empty_cells().len(), 9);
    }

    #[test]
    fn test_apply_copies() {
        let board = Board::new();
        let next = board.apply(at(1, 1), Sign::X);
        assert!(board.is_empty(at(1, 1)));
        assert_eq!(next.get(at(1, 1)), Cell::Occupied(Sign::X));
        assert_eq!(board.diff(&next), vec![at(1, 1)]);
    }

    #[test]
    fn test_winner_column() {
        let board = Board::new()
            .apply(at(0, 2), Sign::O)
            .apply(at(1, 2), Sign::O)
            .apply(at(2, 2), Sign::O);
        assert_eq!(board.winner(), Some(Sign::O));
        assert!(board.has_line(Sign::O));
        assert!(!board.has_line(Sign::X));
        assert_eq!(board.status(), GameStatus::Finished);
    }

    #[test]
    fn test_extends() {
        let first = Board::new().apply(at(0, 0), Sign::X);
        let second = first.apply(at(1, 1), Sign::O);
        assert!(second.extends(&first));
        assert!(second.extends(&Board::new()));
        assert!(first.extends(&first));
        assert!(!first.extends(&second));

        let rewritten = Board::new().apply(at(0, 0), Sign::O);
        assert!(!rewritten.extends(&first));
    }

    #[test]
    fn test_display_compact() {
        let board = Board::new().apply(at(0, 0), Sign::X).apply(at(2, 1), Sign::O);
        assert_eq!(board.to_string(), "X__/___/_O_");
    }

    #[test]
    fn test_wire_format() {
        let board = Board::new().apply(at(0, 0), Sign::X);
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(json, r#"[["X","",""],["","",""],["","",""]]"#);
        let back: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(back, board);
    }
}
