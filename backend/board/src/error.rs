use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoardError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Discord request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discord responded with {status}: {body}")]
    Discord { status: u16, body: String },

    #[error("Environment variable {0} not set")]
    MissingVar(String),

    #[error("Invalid {key} value: {reason}")]
    InvalidVar { key: String, reason: String },

    #[error("Malformed CSV at line {line}: {reason}")]
    Csv { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, BoardError>;
