//! One player process: collaborators wired together and the two
//! subscriptions that drive the protocol.

use std::sync::Arc;

use async_trait::async_trait;
use derive_getters::Getters;
use strictly_tictactoe::{GameStatus, MinimaxStrategy, MoveStrategy};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::bus::{
    DeliveryPolicy, MemoryLog, MessageHandler, MessageLog, Publisher, RedisStreamLog, StreamNames,
    Subscription,
};
use crate::config::DuelConfig;
use crate::db::GameRepository;
use crate::error::{DuelError, DuelErrorKind};
use crate::game_service::GameService;
use crate::identity::bootstrap_player;
use crate::join::JoinCoordinator;
use crate::lock::{LockGateway, LockService, MemoryLocks, RedisLocks};
use crate::messages::{LifecycleMessage, MoveMessage};
use crate::model::LocalPlayer;
use crate::moves::{MoveCoordinator, MoveMaker};

/// Which implementation backs a shared service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    /// In-process; only nodes in the same process can share it.
    Memory,
    /// Redis, shared across processes.
    Redis,
}

/// The message log and lease service a node talks to.
#[derive(Debug, Clone, Getters)]
pub struct Backends {
    log: Arc<dyn MessageLog>,
    locks: Arc<dyn LockService>,
    log_backend: Backend,
    lock_backend: Backend,
}

impl Backends {
    /// In-memory log and leases, shareable between nodes of one process.
    pub fn memory() -> Self {
        Self::from_parts(MemoryLog::new(), MemoryLocks::new())
    }

    /// Wraps an existing in-memory log and lease table.
    pub fn from_parts(log: MemoryLog, locks: MemoryLocks) -> Self {
        Self {
            log: Arc::new(log),
            locks: Arc::new(locks),
            log_backend: Backend::Memory,
            lock_backend: Backend::Memory,
        }
    }

    /// Connects the backends `config` names, using memory for any without a URL.
    ///
    /// # Errors
    ///
    /// Returns a bus or lock error if a Redis endpoint is unreachable.
    #[instrument(skip(config))]
    pub async fn connect(config: &DuelConfig) -> Result<Self, DuelError> {
        let (log, log_backend): (Arc<dyn MessageLog>, Backend) = match config.bus().redis_url() {
            Some(url) => (Arc::new(RedisStreamLog::connect(url).await?), Backend::Redis),
            None => (Arc::new(MemoryLog::new()), Backend::Memory),
        };

        let (locks, lock_backend): (Arc<dyn LockService>, Backend) =
            match config.coordination().redis_url() {
                Some(url) => {
                    let locks = RedisLocks::connect(url, config.coordination().lease_ttl())
                        .await
                        .map_err(|e| DuelError::new(DuelErrorKind::LockUnavailable(e)))?;
                    (Arc::new(locks), Backend::Redis)
                }
                None => (Arc::new(MemoryLocks::new()), Backend::Memory),
            };

        info!(log = %log_backend, locks = %lock_backend, "Backends ready");
        Ok(Self {
            log,
            locks,
            log_backend,
            lock_backend,
        })
    }

    /// Game creation and views over these backends, without registering a
    /// local player.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the database cannot be opened.
    pub fn game_service(&self, config: &DuelConfig) -> Result<GameService, DuelError> {
        let (repository, publisher, locks) = self.collaborators(config)?;
        Ok(GameService::new(repository, publisher, locks))
    }

    fn collaborators(
        &self,
        config: &DuelConfig,
    ) -> Result<(GameRepository, Publisher, LockGateway), DuelError> {
        let repository = GameRepository::new(config.database().path().clone())?;
        let publisher = Publisher::new(self.log.clone(), config.bus().streams(), *config.retry());
        let locks = LockGateway::new(self.locks.clone(), config.coordination().lock_wait());
        Ok((repository, publisher, locks))
    }
}

/// A fully wired player process.
#[derive(Debug, Clone, Getters)]
pub struct DuelNode {
    /// The player this node moves for.
    local: LocalPlayer,
    /// Game creation and views.
    games: GameService,
    joins: JoinCoordinator,
    moves: MoveCoordinator,
    #[getter(skip)]
    log: Arc<dyn MessageLog>,
    #[getter(skip)]
    streams: StreamNames,
    #[getter(skip)]
    group: String,
    #[getter(skip)]
    delivery: DeliveryPolicy,
}

impl DuelNode {
    /// Opens the database, bootstraps the local player and wires the
    /// coordinators over `backends`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the database cannot be opened.
    #[instrument(skip(config, backends), fields(player = %config.player().name()))]
    pub fn assemble(config: &DuelConfig, backends: &Backends) -> Result<Self, DuelError> {
        let (repository, publisher, locks) = backends.collaborators(config)?;
        let (_, local) = bootstrap_player(
            &repository,
            config.player().name(),
            *config.player().sign(),
        )?;

        let games = GameService::new(repository.clone(), publisher.clone(), locks.clone());
        let joins = JoinCoordinator::new(repository.clone(), publisher.clone(), locks.clone());

        let strategy: Arc<dyn MoveStrategy> = Arc::new(match config.play().search_depth() {
            Some(depth) => MinimaxStrategy::with_max_depth(*depth),
            None => MinimaxStrategy::new(),
        });
        let maker = MoveMaker::new(
            strategy,
            publisher,
            *config.play().wrong_move_probability(),
            config.play().thinking_delay(),
        );
        let moves = MoveCoordinator::new(repository, locks, games.clone(), maker);

        info!(player_id = %local.id(), sign = %local.sign(), "Node assembled");
        Ok(Self {
            local,
            games,
            joins,
            moves,
            log: backends.log.clone(),
            streams: config.bus().streams(),
            group: config.consumer_group(),
            delivery: config.bus().delivery(),
        })
    }

    /// Creates this node's consumer groups and spawns the lifecycle and moves
    /// subscriptions. Both stop when `shutdown` is cancelled.
    ///
    /// Records appended before the groups were first created are not
    /// delivered to this node. Records this node received in an earlier run
    /// but never acknowledged are delivered again.
    ///
    /// # Errors
    ///
    /// Returns a bus error if a consumer group cannot be created.
    #[instrument(skip(self, shutdown), fields(player_id = %self.local.id(), group = %self.group))]
    pub async fn start(&self, shutdown: CancellationToken) -> Result<Vec<JoinHandle<()>>, DuelError> {
        self.log
            .ensure_group(self.streams.lifecycle(), &self.group)
            .await?;
        self.log.ensure_group(self.streams.moves(), &self.group).await?;

        let consumer = self.local.id().to_string();
        let lifecycle = Subscription::new(
            self.log.clone(),
            self.streams.lifecycle().clone(),
            self.group.clone(),
            consumer.clone(),
            self.delivery,
        );
        let moves = Subscription::new(
            self.log.clone(),
            self.streams.moves().clone(),
            self.group.clone(),
            consumer,
            self.delivery,
        );

        let lifecycle_handler = LifecycleHandler {
            joins: self.joins.clone(),
            moves: self.moves.clone(),
            local: self.local,
        };
        let move_handler = MoveHandler {
            moves: self.moves.clone(),
            local: self.local,
        };

        info!("Node started");
        Ok(vec![
            tokio::spawn(lifecycle.run::<LifecycleMessage, _>(lifecycle_handler, shutdown.clone())),
            tokio::spawn(moves.run::<MoveMessage, _>(move_handler, shutdown)),
        ])
    }
}

/// Logs a protocol rejection and reports success so the record is not
/// redelivered; collaborator failures pass through for redelivery.
fn settle(result: Result<(), DuelError>) -> Result<(), DuelError> {
    match result {
        Err(e) if !e.kind().is_retryable() => {
            warn!(error = %e, "Message rejected");
            Ok(())
        }
        other => other,
    }
}

struct LifecycleHandler {
    joins: JoinCoordinator,
    moves: MoveCoordinator,
    local: LocalPlayer,
}

#[async_trait]
impl MessageHandler<LifecycleMessage> for LifecycleHandler {
    async fn handle(&self, message: &LifecycleMessage) -> Result<(), DuelError> {
        let result = match message.status() {
            GameStatus::New => self
                .joins
                .join(*message.game_id(), self.local)
                .await
                .map(|outcome| info!(game_id = %message.game_id(), outcome = %outcome, "Join handled")),
            GameStatus::InProgress => self
                .moves
                .on_game_started(message, self.local)
                .await
                .map(|reply| debug!(replied = reply.is_some(), "Game start handled")),
            other => {
                warn!(status = %other, "No handling for lifecycle status");
                Ok(())
            }
        };
        settle(result)
    }
}

struct MoveHandler {
    moves: MoveCoordinator,
    local: LocalPlayer,
}

#[async_trait]
impl MessageHandler<MoveMessage> for MoveHandler {
    async fn handle(&self, message: &MoveMessage) -> Result<(), DuelError> {
        let result = self
            .moves
            .on_move(message, self.local)
            .await
            .map(|outcome| debug!(replied = outcome.reply().is_some(), "Move handled"));
        settle(result)
    }
}
