//! Pure computation for the points ledgers. No I/O happens below this module.

use crate::domain::{Address, PositionKey};
use thiserror::Error;

pub mod accrual;
pub mod history;
pub mod reconciler;
pub mod swap_points;
pub mod wrapping;

pub use accrual::{accrue, AccrualError, Accrued};
pub use reconciler::{reconcile, Buckets};
pub use swap_points::{select_feeds, tally_swaps, SwapContext, SwapPointsError, SwapTally};

/// Inputs that contradict each other. The cycle must not commit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("position {key} is active for more than one owner (seen again under {owner})")]
    DuplicateActivePosition { owner: Address, key: PositionKey },
    #[error("no snapshot for promoted pool {0}")]
    MissingPoolSnapshot(Address),
    #[error("swap on unpromoted pair {token_x}/{token_y}")]
    UnknownPair { token_x: Address, token_y: Address },
    #[error("no usable price for feed {0}")]
    MissingPriceFeed(String),
}
