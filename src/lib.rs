//! Strictly Duel - two tic-tac-toe bots playing over a shared message log
//!
//! Each player process consumes a lifecycle stream and a moves stream, keeps
//! the authoritative game in a shared SQLite file, and serializes its critical
//! sections through named leases.
//!
//! # Architecture
//!
//! - **Bus**: append-only streams with consumer groups, retrying publisher
//! - **Lock**: named leases with a bounded wait (`/joingame`, per-game apply
//!   and game-over paths)
//! - **Join**: first-come seating of two players with opposite signs
//! - **Moves**: validation, reconciliation and minimax replies
//! - **Node**: one wired player process
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use strictly_duel::{DuelConfig, run_demo};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut config = DuelConfig::default();
//! config.override_database("demo.db".to_string());
//! config.override_thinking_delay(Duration::ZERO);
//! let report = run_demo(&config, Duration::from_secs(30)).await?;
//! println!("{} {}", report.status(), report.board());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod bus;
mod config;
mod db;
mod demo;
mod error;
mod game_service;
mod http;
mod identity;
mod join;
mod lock;
mod messages;
mod model;
mod moves;
mod node;

// Crate-level exports - Message log
pub use bus::{
    BusError, DeliveryPolicy, LogRecord, MemoryLog, MessageHandler, MessageLog, Publisher,
    RedisStreamLog, RetryPolicy, StreamNames, Subscription,
};

// Crate-level exports - Configuration
pub use config::{
    BusSettings, ConfigError, CoordinationSettings, DatabaseSettings, DuelConfig, HttpSettings,
    PlaySettings, PlayerSettings,
};

// Crate-level exports - Persistence
pub use db::{DbError, GameRepository};

// Crate-level exports - Demo
pub use demo::{DemoReport, run_demo};

// Crate-level exports - Errors
pub use error::{DuelError, DuelErrorKind};

// Crate-level exports - Game service and HTTP surface
pub use game_service::{GameService, GameView};
pub use http::{GameCreated, router, serve};

// Crate-level exports - Identity
pub use identity::bootstrap_player;

// Crate-level exports - Join protocol
pub use join::{JoinCoordinator, JoinOutcome};

// Crate-level exports - Leases
pub use lock::{Lease, LockError, LockGateway, LockPath, LockService, MemoryLocks, RedisLocks};

// Crate-level exports - Wire messages
pub use messages::{LifecycleMessage, MoveMessage};

// Crate-level exports - Domain model
pub use model::{Game, LocalPlayer, Player};

// Crate-level exports - Move protocol
pub use moves::{MoveCoordinator, MoveMaker, MoveOutcome, OutboundLedger, Reconciliation};

// Crate-level exports - Process wiring
pub use node::{Backend, Backends, DuelNode};

// Crate-level exports - Board model
pub use strictly_tictactoe::{
    Board, Cell, Coord, GameStatus, MinimaxStrategy, MoveRejected, MoveStrategy, NoLegalMove,
    Sign,
};
