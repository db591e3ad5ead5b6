//! Move search: exhaustive minimax with tie collection, plus random play.

use derive_more::{Display, Error};
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};
use tracing::{debug, instrument};

use crate::board::Board;
use crate::types::{Coord, Sign};

const WIN_SCORE: i32 = 10;
const LOSS_SCORE: i32 = -10;
const DRAW_SCORE: i32 = 0;

/// The board has no empty cell left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("No legal move: the board is full")]
pub struct NoLegalMove;

/// Chooses where the local player writes its sign next.
pub trait MoveStrategy: Send + Sync + std::fmt::Debug {
    /// Returns every empty cell achieving the best score for `sign`.
    ///
    /// # Errors
    ///
    /// Returns [`NoLegalMove`] if the board is full.
    fn best_moves(&self, board: &Board, sign: Sign) -> Result<Vec<Coord>, NoLegalMove>;

    /// Returns a uniformly random empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`NoLegalMove`] if the board is full.
    fn random_move(&self, board: &Board, rng: &mut dyn RngCore) -> Result<Coord, NoLegalMove> {
        board.empty_cells().choose(rng).copied().ok_or(NoLegalMove)
    }

    /// Picks the next cell: random with probability `wrong_move_probability`,
    /// otherwise uniformly among the tied [`MoveStrategy::best_moves`].
    ///
    /// # Errors
    ///
    /// Returns [`NoLegalMove`] if the board is full.
    fn choose(
        &self,
        board: &Board,
        sign: Sign,
        wrong_move_probability: f64,
        rng: &mut dyn RngCore,
    ) -> Result<Coord, NoLegalMove> {
        let roll: f64 = rng.random();
        if roll < wrong_move_probability {
            let coord = self.random_move(board, rng)?;
            debug!(%coord, roll, "Playing a random move");
            return Ok(coord);
        }
        let best = self.best_moves(board, sign)?;
        best.choose(rng).copied().ok_or(NoLegalMove)
    }
}

/// Minimax search that scores wins as `10 - depth` and losses as `depth - 10`.
///
/// Every top-level cell sharing the maximum score is returned so the caller can
/// break ties at random. `max_depth` bounds the recursion; unbounded search is
/// the default and is cheap enough for a 3x3 board.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimaxStrategy {
    max_depth: Option<u32>,
}

impl MinimaxStrategy {
    /// Creates an unbounded search.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a search that scores positions deeper than `max_depth` as draws.
    pub fn with_max_depth(max_depth: u32) -> Self {
        Self {
            max_depth: Some(max_depth),
        }
    }

    fn minimax(&self, board: &Board, depth: u32, maximizing: bool, sign: Sign) -> i32 {
        let depth_score = i32::try_from(depth).unwrap_or(i32::MAX);
        if board.has_line(sign) {
            return WIN_SCORE - depth_score;
        }
        if board.has_line(sign.opponent()) {
            return LOSS_SCORE + depth_score;
        }
        let empties = board.empty_cells();
        if empties.is_empty() {
            return DRAW_SCORE;
        }
        if self.max_depth.is_some_and(|limit| depth >= limit) {
            return DRAW_SCORE;
        }

        let mover = if maximizing { sign } else { sign.opponent() };
        let scores = empties
            .into_iter()
            .map(|coord| self.minimax(&board.apply(coord, mover), depth + 1, !maximizing, sign));
        if maximizing {
            scores.max().unwrap_or(DRAW_SCORE)
        } else {
            scores.min().unwrap_or(DRAW_SCORE)
        }
    }
}

impl MoveStrategy for MinimaxStrategy {
    #[instrument(skip(self, board), fields(board = %board))]
    fn best_moves(&self, board: &Board, sign: Sign) -> Result<Vec<Coord>, NoLegalMove> {
        let mut best_score = i32::MIN;
        let mut best = Vec::new();

        for coord in board.empty_cells() {
            let score = self.minimax(&board.apply(coord, sign), 0, false, sign);
            if score > best_score {
                best_score = score;
                best.clear();
                best.push(coord);
            } else if score == best_score {
                best.push(coord);
            }
        }

        if best.is_empty() {
            return Err(NoLegalMove);
        }
        debug!(best_score, candidates = best.len(), "Minimax search complete");
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn at(row: u8, col: u8) -> Coord {
        Coord::new(row, col).unwrap()
    }

    #[test]
    fn test_takes_immediate_win() {
        let board = Board::new()
            .apply(at(0, 0), Sign::X)
            .apply(at(0, 1), Sign::X)
            .apply(at(1, 1), Sign::O)
            .apply(at(2, 2), Sign::O);
        let best = MinimaxStrategy::new().best_moves(&board, Sign::X).unwrap();
        assert_eq!(best, vec![at(0, 2)]);
    }

    #[test]
    fn test_full_board_has_no_move() {
        let mut board = Board::new();
        for (i, coord) in Coord::ALL.iter().enumerate() {
            let sign = if i % 2 == 0 { Sign::X } else { Sign::O };
            board = board.apply(*coord, sign);
        }
        let strategy = MinimaxStrategy::new();
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(strategy.best_moves(&board, Sign::X), Err(NoLegalMove));
        assert_eq!(strategy.random_move(&board, &mut rng), Err(NoLegalMove));
        assert_eq!(strategy.choose(&board, Sign::X, 0.1, &mut rng), Err(NoLegalMove));
    }

    #[test]
    fn test_random_move_is_empty_cell() {
        let board = Board::new().apply(at(1, 1), Sign::X);
        let strategy = MinimaxStrategy::new();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let coord = strategy.random_move(&board, &mut rng).unwrap();
            assert!(board.is_empty(coord));
        }
    }

    #[test]
    fn test_choose_always_random_when_probability_one() {
        // A losing cell is reachable only through random play.
        let board = Board::new()
            .apply(at(0, 0), Sign::X)
            .apply(at(0, 1), Sign::X)
            .apply(at(1, 1), Sign::O);
        let strategy = MinimaxStrategy::new();
        let mut rng = StdRng::seed_from_u64(1);
        let picks: std::collections::HashSet<_> = (0..200)
            .map(|_| strategy.choose(&board, Sign::O, 1.0, &mut rng).unwrap())
            .collect();
        assert!(picks.len() > 1);
        assert!(picks.iter().all(|coord| board.is_empty(*coord)));
    }

    #[test]
    fn test_depth_limit_still_sees_immediate_win() {
        let board = Board::new()
            .apply(at(2, 0), Sign::O)
            .apply(at(2, 1), Sign::O)
            .apply(at(0, 0), Sign::X)
            .apply(at(0, 1), Sign::X);
        let best = MinimaxStrategy::with_max_depth(0)
            .best_moves(&board, Sign::O)
            .unwrap();
        assert_eq!(best, vec![at(2, 2)]);
    }
}
