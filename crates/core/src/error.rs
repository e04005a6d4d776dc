use thiserror::Error;

pub type DripResult<T> = Result<T, DripError>;

#[derive(Error, Debug)]
pub enum DripError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audience provider error: {0}")]
    Provider(String),

    #[error("Provider rate limit: {0}")]
    RateLimited(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DripError {
    /// True for provider throttling errors, the only class retried in place.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DripError::RateLimited(_))
    }
}
