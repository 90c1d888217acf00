//! Applies the reward formula to reconciled buckets.

use super::reconciler::Buckets;
use super::wrapping::{calculate_reward, seconds_per_liquidity_global, seconds_per_liquidity_inside};
use super::IntegrityError;
use crate::domain::{ActiveRecord, Address, ClosedRecord, PoolSnapshot, PositionEvent, UnixSeconds};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccrualError {
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("reward for position {position} in pool {pool} overflows 128 bits")]
    Overflow { pool: Address, position: u128 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accrued {
    pub active: Vec<ActiveRecord>,
    pub closed: Vec<ClosedRecord>,
}

/// Pool snapshot with its global counter advanced to `now`.
struct PoolAtNow<'a> {
    snapshot: &'a PoolSnapshot,
    global: u128,
}

impl PoolAtNow<'_> {
    fn inside(&self, event: &PositionEvent) -> u128 {
        seconds_per_liquidity_inside(
            event.lower_tick,
            event.upper_tick,
            self.snapshot.state.current_tick,
            self.snapshot.tick_outside(event.lower_tick),
            self.snapshot.tick_outside(event.upper_tick),
            self.global,
        )
    }
}

/// Accrues points for every bucket.
///
/// Open positions are measured against the pool snapshot at `now` and their
/// checkpoint is moved to `now`. Closed positions are measured up to the close
/// event, whose seconds-per-liquidity value is the reading at removal.
pub fn accrue(
    buckets: Buckets,
    pools: &HashMap<Address, PoolSnapshot>,
    now: UnixSeconds,
) -> Result<Accrued, AccrualError> {
    let mut at_now: HashMap<Address, PoolAtNow<'_>> = HashMap::with_capacity(pools.len());
    for (address, snapshot) in pools {
        let state = &snapshot.state;
        let global = seconds_per_liquidity_global(
            state.seconds_per_liquidity_global,
            state.liquidity,
            state.last_timestamp,
            now,
        );
        at_now.insert(*address, PoolAtNow { snapshot, global });
    }
    let lookup = |address: &Address| {
        at_now
            .get(address)
            .ok_or(IntegrityError::MissingPoolSnapshot(*address))
    };

    let mut out = Accrued::default();

    for record in buckets.still_open {
        let pool = lookup(&record.event.pool)?;
        out.active.push(advance(pool, record.event, record.points, now)?);
    }

    for create in buckets.new_open {
        let pool = lookup(&create.pool)?;
        out.active.push(advance(pool, create, 0, now)?);
    }

    for (record, close) in buckets.new_closed {
        let pool = lookup(&close.pool)?;
        let reward = segment(pool.snapshot.points_per_second, &record.event, &close)?;
        let points = checked_total(record.points, reward, &close)?;
        out.closed.push(ClosedRecord {
            open_event: Some(record.event),
            close_event: close,
            points,
        });
    }

    for (open, close) in buckets.new_open_closed {
        let pool = lookup(&close.pool)?;
        let points = match &open {
            Some(open) => segment(pool.snapshot.points_per_second, open, &close)?,
            None => 0,
        };
        out.closed.push(ClosedRecord {
            open_event: open,
            close_event: close,
            points,
        });
    }

    Ok(out)
}

/// Accrues an open position up to `now` and moves its checkpoint there.
fn advance(
    pool: &PoolAtNow<'_>,
    mut event: PositionEvent,
    points: u128,
    now: UnixSeconds,
) -> Result<ActiveRecord, AccrualError> {
    let spl_now = pool.inside(&event);
    let reward = calculate_reward(
        pool.snapshot.points_per_second,
        event.liquidity,
        event.seconds_per_liquidity_inside_initial,
        spl_now,
        now.saturating_sub(event.current_timestamp),
    )
    .ok_or_else(|| overflow(&event))?;
    let points = checked_total(points, reward, &event)?;

    event.current_timestamp = now;
    event.seconds_per_liquidity_inside_initial = spl_now;
    Ok(ActiveRecord { event, points })
}

/// Reward between two events of one position.
fn segment(
    points_per_second: u128,
    start: &PositionEvent,
    end: &PositionEvent,
) -> Result<u128, AccrualError> {
    calculate_reward(
        points_per_second,
        start.liquidity,
        start.seconds_per_liquidity_inside_initial,
        end.seconds_per_liquidity_inside_initial,
        end.current_timestamp.saturating_sub(start.current_timestamp),
    )
    .ok_or_else(|| overflow(end))
}

fn checked_total(points: u128, reward: u128, event: &PositionEvent) -> Result<u128, AccrualError> {
    points.checked_add(reward).ok_or_else(|| overflow(event))
}

fn overflow(event: &PositionEvent) -> AccrualError {
    AccrualError::Overflow {
        pool: event.pool,
        position: event.id,
    }
}
