//! Strictly Duel - Unified CLI
//!
//! Runs a player process, drives a game from the outside, or plays a local demo.

#![warn(missing_docs)]

mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use strictly_duel::{Backend, Backends, DuelConfig, DuelNode, run_demo, serve};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => DuelConfig::from_file(path)?,
        None => DuelConfig::default(),
    };
    config.override_player(cli.player, cli.sign);
    if let Some(database) = cli.database {
        config.override_database(database);
    }

    match cli.command {
        Command::Play { http } => {
            if let Some(bind) = http {
                config.override_http_bind(bind);
            }
            run_player(config).await
        }
        Command::NewGame => run_new_game(config).await,
        Command::Show => run_show(config).await,
        Command::Demo {
            thinking_delay_ms,
            timeout_secs,
        } => run_local_demo(config, thinking_delay_ms, timeout_secs).await,
    }
}

/// Run one player process until Ctrl-C
#[instrument(skip(config), fields(player = %config.player().name()))]
async fn run_player(config: DuelConfig) -> Result<()> {
    let backends = Backends::connect(&config).await?;
    if *backends.log_backend() == Backend::Memory {
        warn!("No bus.redis_url configured; only this process will see its messages");
    }

    let node = DuelNode::assemble(&config, &backends)?;
    let shutdown = CancellationToken::new();
    let mut tasks = node.start(shutdown.clone()).await?;

    if let Some(bind) = config.http().bind().clone() {
        let games = node.games().clone();
        let token = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = serve(&bind, games, token).await {
                warn!(error = %e, "HTTP surface stopped");
            }
        }));
    }

    info!(player_id = %node.local().id(), "Player running; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    shutdown.cancel();
    for task in tasks {
        task.await.context("Background task panicked")?;
    }
    Ok(())
}

/// Create a game and announce it to the running players
#[instrument(skip(config))]
async fn run_new_game(config: DuelConfig) -> Result<()> {
    let backends = Backends::connect(&config).await?;
    if *backends.log_backend() == Backend::Memory {
        anyhow::bail!("new-game needs bus.redis_url so the players can see the announcement");
    }

    let game = backends.game_service(&config)?.create_new_game().await?;
    println!("{}", game.id());
    Ok(())
}

/// Print the current game view
#[instrument(skip(config))]
async fn run_show(config: DuelConfig) -> Result<()> {
    let view = Backends::memory().game_service(&config)?.current_game_view()?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

/// Play a full match between two in-process players on a scratch database
#[instrument(skip(config))]
async fn run_local_demo(
    mut config: DuelConfig,
    thinking_delay_ms: u64,
    timeout_secs: u64,
) -> Result<()> {
    let db_path = std::env::temp_dir().join(format!("strictly_duel_demo_{}.db", Uuid::new_v4()));
    config.override_database(db_path.to_string_lossy().into_owned());
    config.override_thinking_delay(Duration::from_millis(thinking_delay_ms));

    let outcome = run_demo(&config, Duration::from_secs(timeout_secs)).await;
    if let Err(e) = std::fs::remove_file(&db_path) {
        warn!(path = %db_path.display(), error = %e, "Failed to remove demo database");
    }
    let report = outcome?;

    println!("Game {}: {}", report.game_id(), report.status());
    println!("Board: {}", report.board());
    if let Some(winner) = report.winner() {
        println!("Winner: {}", winner);
    }
    Ok(())
}
