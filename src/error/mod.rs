use thiserror::Error;

/// Errors raised by the action ingestion and hand-off path
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type Result<T> = std::result::Result<T, AppError>;
