//! Pool error types.

use thiserror::Error;

/// Errors surfaced by the elastic pool.
///
/// Growth, shrinking and saturation are internal transitions and never
/// appear here.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("pool is shut down")]
    ShutDown,

    #[error("no Tokio runtime available to spawn pool tasks")]
    NoRuntime,

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}

pub type PoolResult<T> = Result<T, PoolError>;
