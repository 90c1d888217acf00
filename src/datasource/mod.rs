//! Chain and price-feed access.
//!
//! [`ChainReader`] covers everything read from the RPC node: signature walks,
//! transaction logs, and pool/tick account state. [`PriceSource`] supplies USD
//! price feeds. Implementations do not retry; callers wrap reads in
//! [`crate::retry::with_retry`] and rely on [`Transient`] to decide.

use crate::domain::{Address, PoolState, PriceFeed, Signature};
use crate::retry::Transient;
use async_trait::async_trait;
use std::fmt;

pub mod accounts;
pub mod decode;
pub mod mock;
pub mod pyth;
pub mod rpc;

pub use mock::{MockChainReader, MockPriceSource};
pub use pyth::HermesPriceSource;
pub use rpc::RpcChainReader;

#[async_trait]
pub trait ChainReader: Send + Sync + fmt::Debug {
    /// One page of signatures touching `account`, newest first.
    ///
    /// Only signatures older than `before` and newer than `until` are
    /// returned; either bound may be absent.
    async fn list_signatures(
        &self,
        account: &Address,
        before: Option<&Signature>,
        until: Option<&Signature>,
    ) -> Result<Vec<Signature>, ChainError>;

    /// Newest signature touching `account`, if any.
    async fn latest_signature(&self, account: &Address) -> Result<Option<Signature>, ChainError>;

    /// Log lines of each transaction, in the order of `signatures`.
    async fn fetch_transaction_logs(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Vec<String>>, ChainError>;

    /// Pool state with every initialized tick.
    async fn fetch_pool_state(&self, pool: &Address) -> Result<PoolState, ChainError>;
}

#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Latest readings for the requested feed ids. Unknown ids are omitted.
    async fn latest_feeds(&self, ids: &[String]) -> Result<Vec<PriceFeed>, ChainError>;
}

/// Error type for chain and price reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// Non-success HTTP status
    HttpError { status: u16, message: String },
    /// JSON-RPC error object returned by the node
    RpcError { code: i64, message: String },
    /// Rate limit exceeded
    RateLimited,
    /// Response did not have the expected shape
    ParseError(String),
    /// Account does not exist
    AccountNotFound(Address),
    /// Account data does not match the expected layout
    InvalidAccountData { account: Address, reason: String },
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ChainError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            ChainError::RpcError { code, message } => write!(f, "RPC error {}: {}", code, message),
            ChainError::RateLimited => write!(f, "Rate limited"),
            ChainError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ChainError::AccountNotFound(account) => write!(f, "Account {} not found", account),
            ChainError::InvalidAccountData { account, reason } => {
                write!(f, "Invalid data in account {}: {}", account, reason)
            }
        }
    }
}

impl std::error::Error for ChainError {}

impl Transient for ChainError {
    fn is_transient(&self) -> bool {
        match self {
            ChainError::NetworkError(_) | ChainError::RateLimited => true,
            ChainError::HttpError { status, .. } => *status >= 500,
            // Node-side errors (-32000..-32099) include "slot skipped" and
            // "node is behind"; request errors are permanent.
            ChainError::RpcError { code, .. } => (-32099..=-32000).contains(code),
            ChainError::ParseError(_)
            | ChainError::AccountNotFound(_)
            | ChainError::InvalidAccountData { .. } => false,
        }
    }
}
