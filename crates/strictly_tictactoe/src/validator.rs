//! Legality check for a published board transition.

use derive_more::{Display, Error};
use tracing::{debug, instrument};

use crate::board::Board;
use crate::types::{Cell, Coord, Sign};

/// A move message whose boards do not describe a single legal placement.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Move rejected: {}", reason)]
pub struct MoveRejected {
    /// Human-readable reason, naming the first rule that failed.
    pub reason: String,
}

impl MoveRejected {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Validates that `new` is `previous` with exactly `sign` written at (`x`, `y`).
///
/// Rules are checked in order and the first failure is returned:
///
/// 1. the coordinates are inside the board
/// 2. the target was empty on `previous`
/// 3. the target holds `sign` on `new`
/// 4. every other cell is unchanged
///
/// On success the validated coordinate is returned.
///
/// # Errors
///
/// Returns [`MoveRejected`] describing the first violated rule.
#[instrument(skip(previous, new), fields(previous = %previous, new = %new))]
pub fn validate_transition(
    previous: &Board,
    new: &Board,
    x: i32,
    y: i32,
    sign: Sign,
) -> Result<Coord, MoveRejected> {
    let target = Coord::from_wire(x, y).ok_or_else(|| {
        MoveRejected::new(format!("Invalid move coordinates ({}, {}).", x, y))
    })?;

    if !previous.is_empty(target) {
        return Err(MoveRejected::new(format!(
            "The previous board position {} is not empty.",
            target
        )));
    }

    if new.get(target) != Cell::Occupied(sign) {
        return Err(MoveRejected::new(format!(
            "The new board position {} does not contain {}.",
            target, sign
        )));
    }

    if let Some(other) = previous.diff(new).into_iter().find(|coord| *coord != target) {
        return Err(MoveRejected::new(format!(
            "The rest of the board positions must be identical; {} differs.",
            other
        )));
    }

    debug!(%target, %sign, "Move transition is valid");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(row: u8, col: u8) -> Coord {
        Coord::new(row, col).unwrap()
    }

    #[test]
    fn test_accepts_single_placement() {
        let previous = Board::new().apply(at(0, 0), Sign::X);
        let new = previous.apply(at(1, 1), Sign::O);
        assert_eq!(
            validate_transition(&previous, &new, 1, 1, Sign::O),
            Ok(at(1, 1))
        );
    }

    #[test]
    fn test_rejects_out_of_range_first() {
        // Boards are garbage too, but the coordinate rule wins.
        let previous = Board::new().apply(at(0, 0), Sign::X);
        let err = validate_transition(&previous, &Board::new(), 3, 0, Sign::O).unwrap_err();
        assert!(err.reason.contains("coordinates"), "{}", err);

        let err = validate_transition(&previous, &Board::new(), 0, -1, Sign::O).unwrap_err();
        assert!(err.reason.contains("coordinates"), "{}", err);
    }

    #[test]
    fn test_rejects_occupied_target() {
        let previous = Board::new().apply(at(0, 0), Sign::X);
        let new = previous.apply(at(0, 0), Sign::O);
        let err = validate_transition(&previous, &new, 0, 0, Sign::O).unwrap_err();
        assert!(err.reason.contains("not empty"), "{}", err);
    }

    #[test]
    fn test_rejects_wrong_sign() {
        let previous = Board::new();
        let new = previous.apply(at(2, 2), Sign::X);
        let err = validate_transition(&previous, &new, 2, 2, Sign::O).unwrap_err();
        assert!(err.reason.contains("does not contain"), "{}", err);
    }

    #[test]
    fn test_rejects_unchanged_target() {
        let board = Board::new();
        let err = validate_transition(&board, &board, 1, 1, Sign::X).unwrap_err();
        assert!(err.reason.contains("does not contain"), "{}", err);
    }

    #[test]
    fn test_rejects_extra_difference() {
        let previous = Board::new();
        let new = previous.apply(at(0, 0), Sign::X).apply(at(2, 2), Sign::X);
        let err = validate_transition(&previous, &new, 0, 0, Sign::X).unwrap_err();
        assert!(err.reason.contains("identical"), "{}", err);
    }
}
