//! Seconds-per-liquidity arithmetic.
//!
//! The protocol keeps its seconds-per-liquidity counters as unsigned 128-bit
//! values that wrap on overflow. Every add and subtract here is modulo 2^128
//! so results bit-match the program's own accounting. Products that can exceed
//! 128 bits go through a 256-bit intermediate and are only narrowed at the end.

use crate::domain::UnixSeconds;
use ethnum::U256;

/// Seconds-per-liquidity values carry 24 decimal places.
pub const SECONDS_PER_LIQUIDITY_DECIMALS: u32 = 24;
pub const SECONDS_PER_LIQUIDITY_SCALE: u128 = 10u128.pow(SECONDS_PER_LIQUIDITY_DECIMALS);

/// `a + b mod 2^128`.
pub fn wrapping_add(a: u128, b: u128) -> u128 {
    a.wrapping_add(b)
}

/// `a - b mod 2^128`.
pub fn wrapping_sub(a: u128, b: u128) -> u128 {
    a.wrapping_sub(b)
}

/// `a * b / d` with a 256-bit intermediate, truncating toward zero.
///
/// Returns `None` when `d == 0` or the quotient does not fit in 128 bits.
pub fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    let quotient = U256::from(a) * U256::from(b) / U256::from(d);
    if quotient > U256::from(u128::MAX) {
        None
    } else {
        Some(quotient.as_u128())
    }
}

/// Advances the pool's global counter from its last on-chain update to `now`.
///
/// The increment is `(now - last_timestamp) * SCALE / liquidity`; an empty pool
/// or a non-advancing clock leaves the counter untouched, like the program does.
pub fn seconds_per_liquidity_global(
    current_global: u128,
    liquidity: u128,
    last_timestamp: UnixSeconds,
    now: UnixSeconds,
) -> u128 {
    if liquidity == 0 || now <= last_timestamp {
        return current_global;
    }
    let delta = U256::from(now - last_timestamp) * U256::from(SECONDS_PER_LIQUIDITY_SCALE)
        / U256::from(liquidity);
    // Only the low 128 bits survive a modular add.
    wrapping_add(current_global, delta.as_u128())
}

/// Seconds-per-liquidity accumulated inside `[lower_tick, upper_tick)`.
pub fn seconds_per_liquidity_inside(
    lower_tick: i32,
    upper_tick: i32,
    current_tick: i32,
    lower_outside: u128,
    upper_outside: u128,
    global: u128,
) -> u128 {
    let below = if current_tick >= lower_tick {
        lower_outside
    } else {
        wrapping_sub(global, lower_outside)
    };
    let above = if current_tick < upper_tick {
        upper_outside
    } else {
        wrapping_sub(global, upper_outside)
    };
    wrapping_sub(wrapping_sub(global, below), above)
}

/// Liquidity-weighted seconds spent in range between two inside readings.
///
/// `None` when the result does not fit in 128 bits.
pub fn seconds_inside(liquidity: u128, spl_initial: u128, spl_now: u128) -> Option<u128> {
    mul_div(
        wrapping_sub(spl_now, spl_initial),
        liquidity,
        SECONDS_PER_LIQUIDITY_SCALE,
    )
}

/// Points owed to a position for one accrual segment.
///
/// `reward = points_per_second * elapsed * seconds_inside / elapsed`. A zero
/// length segment earns nothing.
pub fn calculate_reward(
    points_per_second: u128,
    liquidity: u128,
    spl_initial: u128,
    spl_now: u128,
    elapsed: UnixSeconds,
) -> Option<u128> {
    if elapsed == 0 {
        return Some(0);
    }
    let points_to_distribute = points_per_second.checked_mul(u128::from(elapsed))?;
    let inside = seconds_inside(liquidity, spl_initial, spl_now)?;
    mul_div(points_to_distribute, inside, u128::from(elapsed))
}
