use thiserror::Error;

pub type Result<T> = std::result::Result<T, MinerError>;

#[derive(Debug, Error)]
pub enum MinerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("network error: {0}")]
    Net(#[from] RpcError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("block subscription failed: {0}")]
    Subscription(String),
}
