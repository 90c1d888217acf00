//! Liquidity points for one cycle.

use crate::codec::{Lp, PointsLedger};
use crate::domain::{Address, OwnerLedger, PoolSnapshot, ProtocolEvent, UnixSeconds};
use crate::engine::{accrue, history, reconcile};
use crate::error::CycleError;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub still_open: usize,
    pub new_open: usize,
    pub new_closed: usize,
    pub new_open_closed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityOutcome {
    pub owners: BTreeMap<Address, OwnerLedger>,
    pub points: PointsLedger<Lp>,
    pub counts: BucketCounts,
}

/// Reconciles the cycle's position events against the prior owner ledgers,
/// accrues rewards from the pool snapshots, and folds the new totals into
/// the LP points ledger.
///
/// Only pools present in `pools` are treated as promoted. Totals include
/// `historical` points carried over from earlier programs.
pub fn compile_liquidity(
    prior_owners: &BTreeMap<Address, OwnerLedger>,
    prior_points: &PointsLedger<Lp>,
    historical: &HashMap<Address, u128>,
    events: &[ProtocolEvent],
    pools: &HashMap<Address, PoolSnapshot>,
    now: UnixSeconds,
) -> Result<LiquidityOutcome, CycleError> {
    let promoted: HashSet<Address> = pools.keys().copied().collect();
    let buckets = reconcile(prior_owners, events, &promoted)?;
    let counts = BucketCounts {
        still_open: buckets.still_open.len(),
        new_open: buckets.new_open.len(),
        new_closed: buckets.new_closed.len(),
        new_open_closed: buckets.new_open_closed.len(),
    };

    let accrued = accrue(buckets, pools, now)?;

    // Active records are rebuilt from scratch, closed ones accumulate.
    let mut owners: BTreeMap<Address, OwnerLedger> = prior_owners
        .iter()
        .map(|(owner, ledger)| {
            let mut ledger = ledger.clone();
            ledger.active.clear();
            (*owner, ledger)
        })
        .collect();
    for record in accrued.active {
        let owner = record.event.owner;
        owners
            .entry(owner)
            .or_insert_with(|| OwnerLedger::new(owner))
            .active
            .push(record);
    }
    for record in accrued.closed {
        let owner = record.close_event.owner;
        owners
            .entry(owner)
            .or_insert_with(|| OwnerLedger::new(owner))
            .closed
            .push(record);
    }

    let mut points = prior_points.clone();
    history::prune_all(&mut points, now);

    let addresses: BTreeSet<Address> = owners.keys().chain(historical.keys()).copied().collect();
    for address in addresses {
        let (earned, open) = owners
            .get(&address)
            .map(|l| (l.total_points(), l.positions_amount()))
            .unwrap_or((0, 0));
        let carried = historical.get(&address).copied().unwrap_or(0);
        let total = earned
            .checked_add(carried)
            .ok_or_else(|| CycleError::Arithmetic(format!("total points of {}", address)))?;

        let amount = positions_amount(&address, open)?;

        let entry = points.entry_mut(address);
        history::record(entry, total, now);
        entry.amount = amount;
    }

    info!(
        still_open = counts.still_open,
        new_open = counts.new_open,
        new_closed = counts.new_closed,
        new_open_closed = counts.new_open_closed,
        owners = owners.len(),
        "Compiled liquidity points"
    );

    Ok(LiquidityOutcome {
        owners,
        points,
        counts,
    })
}

fn positions_amount(address: &Address, open: usize) -> Result<u32, CycleError> {
    u32::try_from(open).map_err(|_| CycleError::Arithmetic(format!("open positions of {}", address)))
}
