mod backoff;
mod redis;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use redis::{MessageOutcome, NotificationSink, RedisActionSubscriber, RedisPublisher};
