//! Two nodes in one process playing a full match over in-memory backends.

use std::time::Duration;

use derive_getters::Getters;
use strictly_tictactoe::{Board, GameStatus, Sign};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::DuelConfig;
use crate::error::{DuelError, DuelErrorKind};
use crate::node::{Backends, DuelNode};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How a demo match ended.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct DemoReport {
    game_id: Uuid,
    status: GameStatus,
    board: Board,
    /// Winner's display name for a `FINISHED` match.
    winner: Option<String>,
}

/// Plays one match between two local nodes sharing `base`'s database.
///
/// `base` supplies every setting except the players, which are named
/// `<name>-x` and `<name>-o` after the configured player name. Returns once
/// the match is over or `deadline` passes.
///
/// # Errors
///
/// Returns an error if a node cannot be assembled or started, the game cannot
/// be created, or the match is still running at `deadline`.
#[instrument(skip(base))]
pub async fn run_demo(base: &DuelConfig, deadline: Duration) -> Result<DemoReport, DuelError> {
    let backends = Backends::memory();
    let prefix = base.player().name().clone();

    let mut nodes = Vec::new();
    for sign in [Sign::X, Sign::O] {
        let mut config = base.clone();
        let name = format!("{}-{}", prefix, sign.to_string().to_lowercase());
        config.override_player(Some(name), Some(sign));
        config.clear_consumer_group();
        nodes.push(DuelNode::assemble(&config, &backends)?);
    }

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();
    for node in &nodes {
        tasks.extend(node.start(shutdown.clone()).await?);
    }

    let outcome = watch_match(&nodes[0], deadline).await;

    shutdown.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Subscription task failed");
        }
    }
    outcome
}

async fn watch_match(node: &DuelNode, deadline: Duration) -> Result<DemoReport, DuelError> {
    let game = node.games().create_new_game().await?;
    let game_id = *game.id();
    info!(game_id = %game_id, "Demo match created");

    let repository = node.games().repository();
    let started = tokio::time::Instant::now();
    loop {
        let game = repository
            .load_game(game_id)?
            .ok_or_else(|| DuelError::not_found(format!("Game with id: {}", game_id)))?;

        if game.status().is_over() {
            let winner = match game.winner() {
                Some(id) => repository.load_player(*id)?.map(|p| p.name().clone()),
                None => None,
            };
            info!(status = %game.status(), board = %game.board(), winner = ?winner, "Demo match over");
            return Ok(DemoReport {
                game_id,
                status: *game.status(),
                board: *game.board(),
                winner,
            });
        }

        if started.elapsed() >= deadline {
            return Err(DuelError::new(DuelErrorKind::Timeout(format!(
                "game {} still {} after {:?}, board {}",
                game_id,
                game.status(),
                deadline,
                game.board()
            ))));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
