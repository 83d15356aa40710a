//! Top-level error types for banterbot.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Chat gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("channel not found: {name}")]
    ChannelNotFound { name: String },

    #[error("failed to fetch channel history: {0}")]
    HistoryFetch(String),

    #[error("failed to send message: {0}")]
    Send(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Completion provider errors.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("missing API key: environment variable {0} is not set")]
    MissingKey(String),

    #[error("completion request failed: {0}")]
    Request(String),

    #[error("provider returned no completion text")]
    EmptyResponse,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
