//! Tests for game creation and the current-game view.

use std::sync::Arc;
use std::time::Duration;

use strictly_duel::{
    DuelErrorKind, GameRepository, GameService, GameStatus, JoinCoordinator, LifecycleMessage,
    LockGateway, MemoryLocks, MemoryLog, Publisher, RetryPolicy, Sign, StreamNames,
    bootstrap_player,
};
use tempfile::NamedTempFile;

fn setup() -> (NamedTempFile, MemoryLog, GameService, JoinCoordinator) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let repo = GameRepository::new(db_path).expect("Failed to create repository");

    let log = MemoryLog::new();
    let policy = RetryPolicy::new(
        Duration::from_millis(1),
        2.0,
        Duration::from_millis(5),
        2,
    );
    let publisher = Publisher::new(
        Arc::new(log.clone()),
        StreamNames::new("game".to_string(), "game-moves".to_string()),
        policy,
    );
    let locks = LockGateway::new(Arc::new(MemoryLocks::new()), Duration::from_secs(2));
    let games = GameService::new(repo.clone(), publisher.clone(), locks.clone());
    let joins = JoinCoordinator::new(repo, publisher, locks);
    (db_file, log, games, joins)
}

#[test]
fn test_view_without_games_is_finished() {
    let (_db, _log, games, _) = setup();
    let view = games.current_game_view().expect("View failed");
    assert_eq!(*view.status(), GameStatus::Finished);
    assert!(view.board().is_none());
    assert!(view.winner().is_none());
}

#[tokio::test]
async fn test_create_announces_new_game() {
    let (_db, log, games, _) = setup();
    let game = games.create_new_game().await.expect("Create failed");
    assert_eq!(*game.status(), GameStatus::New);

    let payloads = log.payloads("game");
    assert_eq!(payloads.len(), 1);
    let event: LifecycleMessage = serde_json::from_str(&payloads[0]).expect("Bad payload");
    assert_eq!(event, LifecycleMessage::new(*game.id(), GameStatus::New, None));

    let view = games.current_game_view().expect("View failed");
    assert_eq!(*view.status(), GameStatus::New);
    assert_eq!(view.board().map(|board| board.to_string()), Some("___/___/___".to_string()));
}

#[tokio::test]
async fn test_create_refused_while_game_in_progress() {
    let (_db, _log, games, joins) = setup();
    let repo = games.repository().clone();
    let (_, x) = bootstrap_player(&repo, "alice", Sign::X).expect("Bootstrap failed");
    let (_, o) = bootstrap_player(&repo, "bob", Sign::O).expect("Bootstrap failed");

    let game = games.create_new_game().await.expect("Create failed");
    joins.join(*game.id(), x).await.expect("Join failed");
    joins.join(*game.id(), o).await.expect("Join failed");

    let err = games.create_new_game().await.unwrap_err();
    assert!(matches!(err.kind(), DuelErrorKind::GameAlreadyExists(id) if id == game.id()));
}

#[tokio::test]
async fn test_create_allowed_while_only_new_games_exist() {
    let (_db, _log, games, _) = setup();
    let first = games.create_new_game().await.expect("Create failed");
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = games.create_new_game().await.expect("Create failed");
    assert_ne!(first.id(), second.id());

    let last = games
        .repository()
        .find_last_created_game()
        .expect("Query failed")
        .expect("Game missing");
    assert_eq!(last.id(), second.id());
}

#[tokio::test]
async fn test_create_reports_exhausted_publish() {
    let (_db, log, games, _) = setup();
    log.fail_next_appends(2);
    let err = games.create_new_game().await.unwrap_err();
    assert!(matches!(err.kind(), DuelErrorKind::PublishExhausted { attempts: 2, .. }));
}
