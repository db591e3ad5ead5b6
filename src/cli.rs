//! Command-line interface for strictly_duel.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strictly_duel::Sign;

/// Strictly Duel - tic-tac-toe bots coordinating over a message log
#[derive(Parser, Debug)]
#[command(name = "strictly_duel")]
#[command(about = "Self-playing tic-tac-toe over streams and leases", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the player name
    #[arg(long)]
    pub player: Option<String>,

    /// Override the player sign (X or O)
    #[arg(long)]
    pub sign: Option<Sign>,

    /// Override the SQLite database path
    #[arg(long)]
    pub database: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one player process until interrupted
    Play {
        /// Serve the game endpoints on this address, e.g. 127.0.0.1:8080
        #[arg(long)]
        http: Option<String>,
    },

    /// Create a new game and announce it on the lifecycle stream
    NewGame,

    /// Print the most recently created game as JSON
    Show,

    /// Play a full match between two in-process players
    Demo {
        /// Pause before each move, in milliseconds
        #[arg(long, default_value = "0")]
        thinking_delay_ms: u64,

        /// Give up if the match has not ended after this many seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
    },
}
