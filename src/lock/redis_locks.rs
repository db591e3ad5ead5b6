//! Redis-backed lease service shared by both player processes.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::lock::{Lease, LockError, LockService};

const KEY_PREFIX: &str = "strictly_duel:lock:";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Deletes the key only while it still holds our token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Leases stored as `SET NX PX` keys holding a random token.
///
/// The TTL bounds how long a crashed holder can block the other process.
#[derive(Clone)]
pub struct RedisLocks {
    manager: ConnectionManager,
    ttl: Duration,
}

impl std::fmt::Debug for RedisLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLocks").field("ttl", &self.ttl).finish()
    }
}

impl RedisLocks {
    /// Connects to Redis at `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] if the URL is invalid or the server is unreachable.
    #[instrument(skip(redis_url))]
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, LockError> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        info!(ttl_ms = ttl.as_millis() as u64, "Connected lease service to Redis");
        Ok(Self { manager, ttl })
    }
}

#[async_trait]
impl LockService for RedisLocks {
    #[instrument(skip(self))]
    async fn acquire(&self, path: &str, wait: Duration) -> Result<Box<dyn Lease>, LockError> {
        let key = format!("{}{}", KEY_PREFIX, path);
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + wait;
        let mut conn = self.manager.clone();

        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(self.ttl.as_millis() as u64)
                .query_async(&mut conn)
                .await?;

            if acquired.is_some() {
                debug!("Redis lease acquired");
                return Ok(Box::new(RedisLease {
                    conn,
                    key,
                    token,
                    released: false,
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::new(format!(
                    "Timed out after {:?} waiting for '{}'",
                    wait, path
                )));
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

struct RedisLease {
    conn: ConnectionManager,
    key: String,
    token: String,
    released: bool,
}

async fn release_key(
    conn: &mut ConnectionManager,
    key: &str,
    token: &str,
) -> Result<(), LockError> {
    let removed: i64 = Script::new(RELEASE_SCRIPT)
        .key(key)
        .arg(token)
        .invoke_async(conn)
        .await?;

    if removed == 0 {
        return Err(LockError::new(format!(
            "Lease on '{}' expired before release",
            key
        )));
    }
    Ok(())
}

#[async_trait]
impl Lease for RedisLease {
    async fn release(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        release_key(&mut self.conn, &self.key, &self.token).await
    }
}

impl Drop for RedisLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "Lease dropped outside a runtime; left to expire");
            return;
        };

        let mut conn = self.conn.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        handle.spawn(async move {
            if let Err(e) = release_key(&mut conn, &key, &token).await {
                warn!(key = %key, error = %e, "Release of dropped lease failed");
            }
        });
    }
}
