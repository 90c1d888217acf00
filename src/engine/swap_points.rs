//! Points for swaps, priced in USD from the fee paid.

use super::IntegrityError;
use crate::domain::{normalize_feed_id, Address, PriceFeed, PromotedPair, SwapEvent};
use ethnum::U256;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SwapPointsError {
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("swap points of {swapper} overflow")]
    Overflow { swapper: Address },
}

/// Points and swap count earned by one address in a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapTally {
    pub points: u128,
    pub swaps: u32,
}

pub struct SwapContext<'a> {
    pub pairs: &'a [PromotedPair],
    /// Normalized feed id -> accepted feed.
    pub feeds: &'a HashMap<String, PriceFeed>,
    pub blacklist: &'a HashSet<Address>,
    pub points_per_usd: u128,
}

/// True when the feed is priced and its confidence interval is within
/// `max_confidence_percentage` percent of the price.
pub fn is_confidence_acceptable(price: i64, conf: u64, max_confidence_percentage: Decimal) -> bool {
    if price <= 0 {
        return false;
    }
    Decimal::from(conf)
        .checked_div(Decimal::from(price))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct <= max_confidence_percentage)
        .unwrap_or(false)
}

/// Picks the feed to price with for each id: the fresh reading when its
/// confidence is acceptable, otherwise the last accepted reading.
pub fn select_feeds(
    fresh: &[PriceFeed],
    previous: &[PriceFeed],
    max_confidence_percentage: Decimal,
) -> HashMap<String, PriceFeed> {
    let mut selected: HashMap<String, PriceFeed> = previous
        .iter()
        .map(|f| (normalize_feed_id(&f.id), f.clone()))
        .collect();

    for feed in fresh {
        let id = normalize_feed_id(&feed.id);
        if is_confidence_acceptable(feed.price, feed.conf, max_confidence_percentage) {
            selected.insert(id.clone(), PriceFeed { id, ..feed.clone() });
        } else {
            warn!(
                feed = %id,
                price = feed.price,
                conf = feed.conf,
                has_fallback = selected.contains_key(&id),
                "Price confidence too wide, keeping previous feed"
            );
        }
    }
    selected
}

/// `fee * price * points_per_usd / 10^(decimals + |expo|)`, truncated.
///
/// The exponent only contributes its magnitude: a feed's price always counts
/// `|expo|` decimal places.
///
/// `None` if the price is not positive or the result exceeds 128 bits.
pub fn points_for_swap(fee: u64, decimals: u8, price: i64, expo: i32, points_per_usd: u128) -> Option<u128> {
    if price <= 0 {
        return None;
    }
    let numerator = U256::from(fee) * U256::from(price as u64) * U256::from(points_per_usd);
    let value = match pow10(u32::from(decimals) + expo.unsigned_abs()) {
        Some(divisor) => numerator / divisor,
        // Larger than any numerator.
        None => U256::ZERO,
    };
    if value > U256::from(u128::MAX) {
        None
    } else {
        Some(value.as_u128())
    }
}

fn pow10(exp: u32) -> Option<U256> {
    (0..exp).try_fold(U256::ONE, |acc, _| acc.checked_mul(U256::from(10u8)))
}

/// Tallies points per swapper. Blacklisted swappers are skipped.
pub fn tally_swaps(
    events: &[SwapEvent],
    ctx: &SwapContext<'_>,
) -> Result<BTreeMap<Address, SwapTally>, SwapPointsError> {
    let mut tallies: BTreeMap<Address, SwapTally> = BTreeMap::new();

    for swap in events {
        if ctx.blacklist.contains(&swap.swapper) {
            continue;
        }
        let pair = ctx
            .pairs
            .iter()
            .find(|p| p.matches(&swap.token_x, &swap.token_y))
            .ok_or(IntegrityError::UnknownPair {
                token_x: swap.token_x,
                token_y: swap.token_y,
            })?;

        // The fee is charged in the input token.
        let (feed_id, decimals) = if swap.x_to_y {
            (&pair.feed_x_id, pair.x_decimal)
        } else {
            (&pair.feed_y_id, pair.y_decimal)
        };
        let feed_id = normalize_feed_id(feed_id);
        let feed = ctx
            .feeds
            .get(&feed_id)
            .ok_or_else(|| IntegrityError::MissingPriceFeed(feed_id.clone()))?;

        let points = points_for_swap(swap.fee, decimals, feed.price, feed.expo, ctx.points_per_usd)
            .ok_or(SwapPointsError::Overflow {
                swapper: swap.swapper,
            })?;

        let tally = tallies.entry(swap.swapper).or_default();
        tally.points = tally.points.checked_add(points).ok_or(SwapPointsError::Overflow {
            swapper: swap.swapper,
        })?;
        tally.swaps = tally.swaps.checked_add(1).ok_or(SwapPointsError::Overflow {
            swapper: swap.swapper,
        })?;
    }

    Ok(tallies)
}
