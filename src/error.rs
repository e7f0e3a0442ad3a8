//! Error types for memchain

use thiserror::Error;

/// Result type alias for memchain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during memchain operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("chain is at capacity ({0} blocks)")]
    ChainFull(usize),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no block at index {0}")]
    BlockNotFound(usize),

    #[error("chain verification failed: {0}")]
    Verification(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("signature verification failed")]
    SignatureVerification,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
