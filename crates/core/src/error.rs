use thiserror::Error;

pub type RoasResult<T> = Result<T, RoasError>;

#[derive(Error, Debug)]
pub enum RoasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Spend report error: {0}")]
    Csv(String),

    #[error("Row store error: {0}")]
    Store(String),

    #[error("Staging store error: {0}")]
    Staging(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
