//! Per-owner position bookkeeping carried between sync cycles.

use super::events::PositionEvent;
use super::primitives::{serde_u128, Address};
use serde::{Deserialize, Serialize};

/// An open position together with the points accrued so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRecord {
    /// Latest accrual checkpoint of the position. `current_timestamp` and
    /// `seconds_per_liquidity_inside_initial` are advanced every cycle.
    pub event: PositionEvent,
    #[serde(with = "serde_u128")]
    pub points: u128,
}

/// A closed position with its final point total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedRecord {
    /// `None` when the position was opened before tracking began.
    pub open_event: Option<PositionEvent>,
    pub close_event: PositionEvent,
    #[serde(with = "serde_u128")]
    pub points: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerLedger {
    pub owner: Address,
    pub active: Vec<ActiveRecord>,
    pub closed: Vec<ClosedRecord>,
}

impl OwnerLedger {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            active: Vec::new(),
            closed: Vec::new(),
        }
    }

    /// Sum of points over active and closed records.
    pub fn total_points(&self) -> u128 {
        let active = self.active.iter().map(|r| r.points);
        let closed = self.closed.iter().map(|r| r.points);
        active.chain(closed).fold(0u128, u128::saturating_add)
    }

    pub fn positions_amount(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u128) -> PositionEvent {
        PositionEvent {
            owner: Address::new([1u8; 32]),
            pool: Address::new([2u8; 32]),
            id,
            liquidity: 100,
            upper_tick: 10,
            current_timestamp: 0,
            lower_tick: -10,
            seconds_per_liquidity_inside_initial: 0,
        }
    }

    #[test]
    fn test_total_points_sums_active_and_closed() {
        let mut ledger = OwnerLedger::new(Address::new([1u8; 32]));
        ledger.active.push(ActiveRecord {
            event: event(1),
            points: 40,
        });
        ledger.closed.push(ClosedRecord {
            open_event: None,
            close_event: event(2),
            points: 2,
        });
        assert_eq!(ledger.total_points(), 42);
        assert_eq!(ledger.positions_amount(), 1);
    }
}
