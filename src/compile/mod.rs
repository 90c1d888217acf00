//! Cycle compilation: turns synced events into updated ledgers.
//!
//! This module provides:
//! - Per-account signature checkpoints
//! - The liquidity pipeline (reconcile, accrue, rebuild owner ledgers)
//! - The swap pipeline (price, tally, fold into the swap ledger)
//! - The leaderboard summary

use crate::domain::{Address, Signature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod liquidity;
pub mod summary;
pub mod swaps;

pub use liquidity::{compile_liquidity, BucketCounts, LiquidityOutcome};
pub use summary::{build_summary, LeaderboardRow, Summary};
pub use swaps::compile_swaps;

/// Newest processed signature per tracked account.
///
/// A checkpoint only moves once the cycle that read past it has committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoints(BTreeMap<Address, Signature>);

impl Checkpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account: &Address) -> Option<&Signature> {
        self.0.get(account)
    }

    /// Records `signature` as the newest processed for `account`.
    pub fn advance(&mut self, account: Address, signature: Signature) {
        self.0.insert(account, signature);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Signature)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Address, Signature)> for Checkpoints {
    fn from_iter<I: IntoIterator<Item = (Address, Signature)>>(iter: I) -> Self {
        Checkpoints(iter.into_iter().collect())
    }
}
