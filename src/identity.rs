//! Local player bootstrap.

use strictly_tictactoe::Sign;
use tracing::{info, instrument, warn};

use crate::db::{DbError, GameRepository};
use crate::model::{LocalPlayer, Player};

/// Returns the stored player named `name`, creating it with `sign` if missing.
///
/// A stored player keeps its original sign; a differing configured sign is
/// logged and ignored.
///
/// # Errors
///
/// Returns [`DbError`] if the lookup or insert fails.
#[instrument(skip(repository))]
pub fn bootstrap_player(
    repository: &GameRepository,
    name: &str,
    sign: Sign,
) -> Result<(Player, LocalPlayer), DbError> {
    if let Some(player) = repository.find_player_by_name(name)? {
        if *player.sign() != sign {
            warn!(stored = %player.sign(), configured = %sign, "Keeping stored sign");
        }
        info!(player_id = %player.id(), sign = %player.sign(), "Existing player found");
        let local = LocalPlayer::of(&player);
        return Ok((player, local));
    }

    let player = Player::create(name, sign);
    repository.save_player(&player)?;
    info!(player_id = %player.id(), sign = %sign, "Created new player");
    let local = LocalPlayer::of(&player);
    Ok((player, local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn repository() -> (NamedTempFile, GameRepository) {
        let db_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = db_file.path().to_str().expect("Invalid path").to_string();
        let repo = GameRepository::new(db_path).expect("Failed to create repository");
        (db_file, repo)
    }

    #[test]
    fn test_creates_then_reuses_player() {
        let (_db, repo) = repository();
        let (first, local) = bootstrap_player(&repo, "alice", Sign::X).unwrap();
        assert_eq!(*local.id(), *first.id());

        let (second, _) = bootstrap_player(&repo, "alice", Sign::O).unwrap();
        assert_eq!(second.id(), first.id());
        assert_eq!(*second.sign(), Sign::X);
    }
}
