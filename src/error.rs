//! Error taxonomy shared by the enumeration, scheduling and persistence
//! layers.
//!
//! Configuration and range errors are fatal. Oracle and checkpoint errors are
//! reported by the layer that hits them and the search carries on; see
//! `distributor` and `orchestrator` for where each one is absorbed.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrackError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("position {position} outside space of {total} candidates")]
    Range { position: u64, total: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("checkpoint I/O error: {0}")]
    CheckpointIo(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrackError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CrackError::Configuration(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        CrackError::NotFound(msg.into())
    }

    /// True for errors the search degrades around instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CrackError::Oracle(_) | CrackError::CheckpointIo(_))
    }
}

pub type Result<T> = std::result::Result<T, CrackError>;
