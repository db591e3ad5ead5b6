//! Distributed lock gateway and its lease services.

mod error;
mod gateway;
mod memory;
mod redis_locks;
mod service;

pub use error::LockError;
pub use gateway::{LockGateway, LockPath};
pub use memory::MemoryLocks;
pub use redis_locks::RedisLocks;
pub use service::{Lease, LockService};
