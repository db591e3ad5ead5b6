//! Message bus adapter: the lifecycle and moves streams.

mod error;
mod log;
mod memory;
mod publisher;
mod redis_stream;
mod retry;
mod subscription;

pub use error::BusError;
pub use log::{LogRecord, MessageLog, StreamNames};
pub use memory::MemoryLog;
pub use publisher::Publisher;
pub use redis_stream::RedisStreamLog;
pub use retry::RetryPolicy;
pub use subscription::{DeliveryPolicy, MessageHandler, Subscription};
