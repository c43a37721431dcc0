//! Errors raised while resolving Herald configuration.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A settings file is missing or holds an invalid value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed settings file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot read settings: {0}")]
    Io(#[from] std::io::Error),
}
