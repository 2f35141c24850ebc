//! Error types for ngxgen

use thiserror::Error;

/// Result type for ngxgen model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ngxgen model operations
#[derive(Error, Debug)]
pub enum Error {
    /// Model could not be loaded or stored
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
