use thiserror::Error;

#[derive(Debug, Error)]
pub enum QqtgError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, QqtgError>;
