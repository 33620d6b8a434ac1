//! Error types for colgraph

use crate::crypto::KeyMode;
use crate::model::Address;
use thiserror::Error;

/// Result type alias for colgraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in colgraph operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Compression error: {0}")]
    Compression(String),

    /// Address resolution failure: the block is in neither the cache nor the backing store
    #[error("Address not found: {0}")]
    NotFound(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid store file: {0}")]
    InvalidFile(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// The block was sealed under a different key mode than the one supplied
    #[error("Key mode mismatch: block is {found}, keys are {expected}")]
    KeyMismatch { expected: KeyMode, found: KeyMode },

    /// Key material did not authenticate the block
    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Key error: {0}")]
    Key(String),

    #[error("Node was deleted: {0}")]
    Deleted(Address),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// Ancestor rehash could not be written; nothing was committed
    #[error("Propagation failed after {written} of {total} blocks: {source}")]
    Propagation {
        written: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Task error: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}
