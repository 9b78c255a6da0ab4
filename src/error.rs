use thiserror::Error;

/// Errors raised while bootstrapping the chat widget
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// No usable solution configuration could be obtained
    #[error("Config load error: {0}")]
    ConfigLoad(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool creation error: {0}")]
    PoolCreation(String),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for BootstrapError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BootstrapError::Http(format!("request timed out: {e}"))
        } else {
            BootstrapError::Http(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
