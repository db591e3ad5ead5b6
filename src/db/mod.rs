//! Persistence layer for games and players.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::DbError;
pub use repository::GameRepository;
