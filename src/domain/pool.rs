//! On-chain pool state and the per-cycle snapshot used for reward accrual.

use super::primitives::{Address, UnixSeconds};
use std::collections::HashMap;

/// Pool and tick state as read from the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub address: Address,
    pub liquidity: u128,
    pub current_tick: i32,
    pub seconds_per_liquidity_global: u128,
    pub last_timestamp: UnixSeconds,
    /// Tick index -> seconds-per-liquidity-outside for every initialized tick.
    pub ticks: HashMap<i32, u128>,
}

/// A promoted pool's state joined with its configured reward rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub state: PoolState,
    pub points_per_second: u128,
}

impl PoolSnapshot {
    pub fn new(state: PoolState, points_per_second: u128) -> Self {
        Self {
            state,
            points_per_second,
        }
    }

    pub fn address(&self) -> Address {
        self.state.address
    }

    /// Outside value of an uninitialized tick is zero on chain.
    pub fn tick_outside(&self, index: i32) -> u128 {
        self.state.ticks.get(&index).copied().unwrap_or(0)
    }
}
