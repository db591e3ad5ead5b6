//! Pure tic-tac-toe logic shared by every duel process.
//!
//! Nothing in this crate performs I/O. It provides:
//!
//! - **Types**: [`Sign`], [`Cell`], [`Coord`] and [`GameStatus`]
//! - **Board**: the copy-on-write 3x3 [`Board`] with status derivation
//! - **Validation**: [`validate_transition`] for incoming move messages
//! - **Search**: the [`MoveStrategy`] trait and its [`MinimaxStrategy`] implementation

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod board;
mod search;
mod types;
mod validator;

pub use board::{Board, LINES};
pub use search::{MinimaxStrategy, MoveStrategy, NoLegalMove};
pub use types::{Cell, Coord, GameStatus, Sign};
pub use validator::{MoveRejected, validate_transition};
