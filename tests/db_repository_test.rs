//! Tests for database repository operations.

use strictly_duel::{Coord, Game, GameRepository, GameStatus, Player, Sign};
use tempfile::NamedTempFile;

/// Creates a temporary database file and a migrated repository on it; the
/// file handle must stay in scope to keep the file alive.
fn setup_test_db() -> (NamedTempFile, GameRepository) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let repo = GameRepository::new(db_path).expect("Failed to create repository");
    (db_file, repo)
}

#[test]
fn test_create_and_load_game() {
    let (_db, repo) = setup_test_db();
    let game = Game::new();
    repo.create_game(&game).expect("Create failed");

    let loaded = repo
        .load_game(*game.id())
        .expect("Load failed")
        .expect("Game missing");
    assert_eq!(loaded.id(), game.id());
    assert_eq!(*loaded.status(), GameStatus::New);
    assert!(loaded.players().is_empty());
    assert!(loaded.last_played().is_none());
}

#[test]
fn test_load_missing_game_is_none() {
    let (_db, repo) = setup_test_db();
    let found = repo.load_game(uuid::Uuid::new_v4()).expect("Query failed");
    assert!(found.is_none());
}

#[test]
fn test_create_same_id_twice_fails() {
    let (_db, repo) = setup_test_db();
    let game = Game::new();
    repo.create_game(&game).expect("First create failed");
    assert!(repo.create_game(&game).is_err(), "Duplicate id should fail");
}

#[test]
fn test_save_game_keeps_board_and_player_order() {
    let (_db, repo) = setup_test_db();
    let alice = Player::create("alice", Sign::X);
    let bob = Player::create("bob", Sign::O);
    repo.save_player(&alice).expect("Save failed");
    repo.save_player(&bob).expect("Save failed");

    let mut game = Game::new();
    repo.create_game(&game).expect("Create failed");
    game.add_player(*alice.id());
    game.add_player(*bob.id());
    game.start(*bob.id());
    let board = game
        .board()
        .apply(Coord::new(1, 1).expect("Valid coord"), Sign::X);
    game.commit_move(board, *alice.id());
    repo.save_game(&game).expect("Save failed");

    let loaded = repo
        .load_game(*game.id())
        .expect("Load failed")
        .expect("Game missing");
    assert_eq!(loaded.players(), &vec![*alice.id(), *bob.id()]);
    assert_eq!(*loaded.board(), board);
    assert_eq!(*loaded.status(), GameStatus::InProgress);
    assert_eq!(*loaded.last_played(), Some(*alice.id()));
}

#[test]
fn test_save_game_and_player_together() {
    let (_db, repo) = setup_test_db();
    let mut player = Player::create("carol", Sign::O);
    repo.save_player(&player).expect("Save failed");

    let mut game = Game::new();
    repo.create_game(&game).expect("Create failed");
    game.add_player(*player.id());
    player.join(*game.id());
    repo.save_game_and_player(&game, &player)
        .expect("Save failed");

    let stored = repo
        .load_player(*player.id())
        .expect("Load failed")
        .expect("Player missing");
    assert_eq!(*stored.current_game(), Some(*game.id()));
    let stored_game = repo
        .load_game(*game.id())
        .expect("Load failed")
        .expect("Game missing");
    assert!(stored_game.has_player(*player.id()));
}

#[test]
fn test_find_game_by_status_prefers_newest() {
    let (_db, repo) = setup_test_db();
    let older = Game::new();
    repo.create_game(&older).expect("Create failed");
    std::thread::sleep(std::time::Duration::from_millis(5));
    let newer = Game::new();
    repo.create_game(&newer).expect("Create failed");

    let found = repo
        .find_game_by_status(GameStatus::New)
        .expect("Query failed")
        .expect("Game missing");
    assert_eq!(found.id(), newer.id());
    assert!(
        repo.find_game_by_status(GameStatus::InProgress)
            .expect("Query failed")
            .is_none()
    );

    let last = repo
        .find_last_created_game()
        .expect("Query failed")
        .expect("Game missing");
    assert_eq!(last.id(), newer.id());
}

#[test]
fn test_find_player_by_name() {
    let (_db, repo) = setup_test_db();
    let player = Player::create("dave", Sign::X);
    repo.save_player(&player).expect("Save failed");

    let found = repo
        .find_player_by_name("dave")
        .expect("Query failed")
        .expect("Player missing");
    assert_eq!(found, player);
    assert!(
        repo.find_player_by_name("nobody")
            .expect("Query failed")
            .is_none()
    );
}

#[test]
fn test_reopening_keeps_records() {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let game = Game::new();
    {
        let repo = GameRepository::new(db_path.clone()).expect("Failed to create repository");
        repo.create_game(&game).expect("Create failed");
    }

    let reopened = GameRepository::new(db_path).expect("Failed to reopen repository");
    assert!(reopened.load_game(*game.id()).expect("Load failed").is_some());
}
