//! Session recovery snapshot storage

pub mod recovery;

use thiserror::Error;

pub use recovery::{FileRecoveryStore, InMemoryRecoveryStore, RecoverySnapshot, RecoveryStore};

/// Storage failures; callers treat these as best-effort and log them
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
