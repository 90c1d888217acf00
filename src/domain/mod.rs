//! Domain types for the points engine.
//!
//! This module provides:
//! - Primitives: Address, Signature, PositionKey
//! - Protocol events decoded from transaction logs
//! - Owner ledgers (active and closed position records)
//! - Pool snapshots and USD price feeds
//! - Promoted pools and pairs

pub mod events;
pub mod ledger;
pub mod pool;
pub mod price;
pub mod primitives;
pub mod promotion;

pub use events::{CreatePositionEvent, PositionEvent, ProtocolEvent, RemovePositionEvent, SwapEvent};
pub use ledger::{ActiveRecord, ClosedRecord, OwnerLedger};
pub use pool::{PoolSnapshot, PoolState};
pub use price::{normalize_feed_id, PriceFeed};
pub use primitives::{Address, AddressParseError, PositionKey, Signature, UnixSeconds};
pub use promotion::{PromotedPair, PromotedPool};
