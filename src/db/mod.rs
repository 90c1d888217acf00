//! SQLite persistence for checkpoints and ledgers.

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{CycleCommit, EncodedLedger, Repository, StoredState};

use crate::codec::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Stored points ledger is corrupt: {0}")]
    Codec(#[from] CodecError),
    #[error("Stored document is corrupt: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid stored value: {0}")]
    InvalidData(String),
}
