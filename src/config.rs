//! Process configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! runnable single-process setup with the in-memory backends.

use std::path::Path;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use strictly_tictactoe::Sign;
use tracing::{debug, info, instrument};

use crate::bus::{DeliveryPolicy, RetryPolicy, StreamNames};

/// Full configuration of one player process.
#[derive(Debug, Clone, Default, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct DuelConfig {
    /// Local player identity.
    player: PlayerSettings,
    /// Message log endpoint, stream names and delivery policy.
    bus: BusSettings,
    /// Coordination service endpoint and lease timing.
    coordination: CoordinationSettings,
    /// Publish retry policy.
    retry: RetryPolicy,
    /// Move synthesis tuning.
    play: PlaySettings,
    /// Persistence.
    database: DatabaseSettings,
    /// Optional HTTP surface.
    http: HttpSettings,
}

/// `[player]` section.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Display name; also the lookup key for the stored player.
    #[serde(default = "default_player_name")]
    name: String,
    /// Sign used when the player is first created.
    #[serde(default = "default_sign")]
    sign: Sign,
}

#[instrument]
fn default_player_name() -> String {
    "player-x".to_string()
}

#[instrument]
fn default_sign() -> Sign {
    Sign::X
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            name: default_player_name(),
            sign: default_sign(),
        }
    }
}

/// `[bus]` section.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Redis URL for the message log; the in-memory log is used when absent.
    redis_url: Option<String>,
    /// Stream carrying lifecycle events.
    lifecycle_stream: String,
    /// Stream carrying moves.
    moves_stream: String,
    /// Consumer group name; defaults to the player name.
    group: Option<String>,
    /// Handler attempts per record.
    handler_attempts: u32,
    /// Pause between handler attempts.
    handler_backoff_ms: u64,
    /// Longest a read blocks waiting for records.
    poll_block_ms: u64,
    /// Most records fetched per read.
    batch_size: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            lifecycle_stream: "game".to_string(),
            moves_stream: "game-moves".to_string(),
            group: None,
            handler_attempts: 3,
            handler_backoff_ms: 500,
            poll_block_ms: 200,
            batch_size: 16,
        }
    }
}

impl BusSettings {
    /// Lifecycle and moves stream names.
    pub fn streams(&self) -> StreamNames {
        StreamNames::new(self.lifecycle_stream.clone(), self.moves_stream.clone())
    }

    /// Subscriber delivery policy.
    pub fn delivery(&self) -> DeliveryPolicy {
        DeliveryPolicy::new(
            self.handler_attempts,
            Duration::from_millis(self.handler_backoff_ms),
            Duration::from_millis(self.poll_block_ms),
            self.batch_size,
        )
    }
}

/// `[coordination]` section.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationSettings {
    /// Redis URL for leases; in-process leases are used when absent.
    redis_url: Option<String>,
    /// Bounded wait when acquiring a lease.
    lock_wait_ms: u64,
    /// Lease lifetime on the coordination service.
    lease_ttl_ms: u64,
}

impl Default for CoordinationSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            lock_wait_ms: 2_000,
            lease_ttl_ms: 10_000,
        }
    }
}

impl CoordinationSettings {
    /// Bounded wait as a duration.
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    /// Lease lifetime as a duration.
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms)
    }
}

/// `[play]` section.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaySettings {
    /// Pause before publishing a synthesized move.
    thinking_delay_ms: u64,
    /// Chance of playing a random cell instead of a best move.
    wrong_move_probability: f64,
    /// Optional cap on minimax depth; unlimited when absent.
    search_depth: Option<u32>,
}

impl Default for PlaySettings {
    fn default() -> Self {
        Self {
            thinking_delay_ms: 1_000,
            wrong_move_probability: 0.1,
            search_depth: None,
        }
    }
}

impl PlaySettings {
    /// Thinking delay as a duration.
    pub fn thinking_delay(&self) -> Duration {
        Duration::from_millis(self.thinking_delay_ms)
    }
}

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file shared by both processes.
    path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "strictly_duel.db".to_string(),
        }
    }
}

/// `[http]` section.
#[derive(Debug, Clone, Default, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Address to serve the game endpoints on, e.g. `127.0.0.1:8080`.
    bind: Option<String>,
}

impl DuelConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(player = %config.player.name, "Config loaded successfully");
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid TOML or fails validation.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if *self.retry.multiplier() < 1.0 {
            return Err(ConfigError::new(format!(
                "retry.multiplier must be at least 1, got {}",
                self.retry.multiplier()
            )));
        }
        if *self.retry.max_attempts() == 0 {
            return Err(ConfigError::new("retry.max_attempts must be at least 1"));
        }
        if self.bus.handler_attempts == 0 {
            return Err(ConfigError::new("bus.handler_attempts must be at least 1"));
        }
        if self.bus.batch_size == 0 {
            return Err(ConfigError::new("bus.batch_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.play.wrong_move_probability) {
            return Err(ConfigError::new(format!(
                "play.wrong_move_probability must be within [0, 1], got {}",
                self.play.wrong_move_probability
            )));
        }
        if self.player.name.trim().is_empty() {
            return Err(ConfigError::new("player.name must not be empty"));
        }
        Ok(())
    }

    /// Consumer group for this process: the configured group or the player name.
    pub fn consumer_group(&self) -> String {
        self.bus
            .group
            .clone()
            .unwrap_or_else(|| self.player.name.clone())
    }

    /// Replaces the local player identity.
    pub fn override_player(&mut self, name: Option<String>, sign: Option<Sign>) {
        if let Some(name) = name {
            self.player.name = name;
        }
        if let Some(sign) = sign {
            self.player.sign = sign;
        }
    }

    /// Drops a configured consumer group so the player name is used.
    pub fn clear_consumer_group(&mut self) {
        self.bus.group = None;
    }

    /// Replaces the database path.
    pub fn override_database(&mut self, path: String) {
        self.database.path = path;
    }

    /// Replaces the HTTP bind address.
    pub fn override_http_bind(&mut self, bind: String) {
        self.http.bind = Some(bind);
    }

    /// Replaces the thinking delay.
    pub fn override_thinking_delay(&mut self, delay: Duration) {
        self.play.thinking_delay_ms = delay.as_millis() as u64;
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = DuelConfig::from_toml("").unwrap();
        assert_eq!(config, DuelConfig::default());
        assert_eq!(config.coordination().lock_wait(), Duration::from_secs(2));
        assert_eq!(config.play().thinking_delay(), Duration::from_secs(1));
        assert_eq!(*config.play().wrong_move_probability(), 0.1);
        assert!(config.bus().redis_url().is_none());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = DuelConfig::from_toml(
            r#"
            [player]
            name = "bob"
            sign = "O"

            [bus]
            redis_url = "redis://127.0.0.1/"
            moves_stream = "moves"

            [retry]
            max_attempts = 5
            multiplier = 1.5

            [play]
            thinking_delay_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.player().name(), "bob");
        assert_eq!(*config.player().sign(), Sign::O);
        assert_eq!(config.bus().streams().moves(), "moves");
        assert_eq!(config.bus().streams().lifecycle(), "game");
        assert_eq!(*config.retry().max_attempts(), 5);
        assert_eq!(*config.retry().initial_interval_ms(), 1_000);
        assert_eq!(config.consumer_group(), "bob");
        assert_eq!(config.play().thinking_delay(), Duration::ZERO);
    }

    #[test]
    fn test_rejects_probability_out_of_range() {
        let err = DuelConfig::from_toml("[play]\nwrong_move_probability = 1.5").unwrap_err();
        assert!(err.message.contains("wrong_move_probability"));
    }

    #[test]
    fn test_rejects_shrinking_backoff() {
        let err = DuelConfig::from_toml("[retry]\nmultiplier = 0.5").unwrap_err();
        assert!(err.message.contains("multiplier"));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        assert!(DuelConfig::from_toml("[retry]\nmax_attempts = 0").is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = DuelConfig::default();
        config.override_player(Some("carol".to_string()), Some(Sign::O));
        config.override_database("other.db".to_string());
        assert_eq!(config.player().name(), "carol");
        assert_eq!(config.database().path(), "other.db");
    }
}
