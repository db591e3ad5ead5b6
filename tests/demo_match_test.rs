//! End-to-end match between two in-process nodes.

use std::time::Duration;

use strictly_duel::{DuelConfig, GameStatus, run_demo};
use tempfile::NamedTempFile;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_demo_match_runs_to_completion() {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let mut config = DuelConfig::default();
    config.override_player(Some("demo".to_string()), None);
    config.override_database(db_file.path().to_str().expect("Invalid path").to_string());
    config.override_thinking_delay(Duration::ZERO);

    let report = run_demo(&config, Duration::from_secs(60))
        .await
        .expect("Demo failed");

    assert!(report.status().is_over());
    assert_eq!(report.board().status(), *report.status());
    match report.status() {
        GameStatus::Finished => {
            let winner = report.winner().clone().expect("Finished game has a winner");
            assert!(winner == "demo-x" || winner == "demo-o");
        }
        _ => assert!(report.winner().is_none()),
    }
}
