//! Error types for devlink

use thiserror::Error;

/// Main error type for devlink configuration and startup
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid code range: {start}..={end}")]
    InvalidCodeRange { start: u32, end: u32 },

    #[error("Code range holds {len} values, at most {max} allowed")]
    CodeRangeTooLarge { len: u64, max: u64 },
}

/// Result type alias using devlink's Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}
