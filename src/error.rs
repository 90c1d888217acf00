use crate::codec::CodecError;
use crate::datasource::ChainError;
use crate::db::StoreError;
use crate::domain::Address;
use crate::engine::{AccrualError, IntegrityError, SwapPointsError};
use crate::retry::RetryError;
use thiserror::Error;

/// Anything that aborts a sync cycle. No checkpoint or ledger is written
/// when a cycle ends with one of these.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("{operation} unavailable after {attempts} attempts: {source}")]
    ChainUnavailable {
        operation: String,
        attempts: u32,
        source: ChainError,
    },
    #[error("{operation} failed: {source}")]
    Chain {
        operation: String,
        source: ChainError,
    },
    #[error("state of {account} kept moving during {attempts} read attempts")]
    StateInconsistency { account: Address, attempts: u32 },
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),
    #[error("Arithmetic overflow: {0}")]
    Arithmetic(String),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CycleError {
    /// Maps a failed chain read, keeping the retry outcome.
    pub fn from_chain(operation: &str, err: RetryError<ChainError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => CycleError::ChainUnavailable {
                operation: operation.to_string(),
                attempts,
                source: last,
            },
            RetryError::Permanent(source) => CycleError::Chain {
                operation: operation.to_string(),
                source,
            },
        }
    }
}

impl From<AccrualError> for CycleError {
    fn from(err: AccrualError) -> Self {
        match err {
            AccrualError::Integrity(e) => CycleError::Integrity(e),
            overflow @ AccrualError::Overflow { .. } => CycleError::Arithmetic(overflow.to_string()),
        }
    }
}

impl From<SwapPointsError> for CycleError {
    fn from(err: SwapPointsError) -> Self {
        match err {
            SwapPointsError::Integrity(e) => CycleError::Integrity(e),
            overflow @ SwapPointsError::Overflow { .. } => CycleError::Arithmetic(overflow.to_string()),
        }
    }
}
