//! Swap points for one cycle.

use crate::codec::{PointsLedger, Swap};
use crate::domain::{SwapEvent, UnixSeconds};
use crate::engine::{history, tally_swaps, SwapContext};
use crate::error::CycleError;
use tracing::info;

/// Prices the cycle's swaps and folds them into the swap ledger.
pub fn compile_swaps(
    prior: &PointsLedger<Swap>,
    events: &[SwapEvent],
    ctx: &SwapContext<'_>,
    now: UnixSeconds,
) -> Result<PointsLedger<Swap>, CycleError> {
    let tallies = tally_swaps(events, ctx)?;

    let mut ledger = prior.clone();
    history::prune_all(&mut ledger, now);

    for (swapper, tally) in &tallies {
        let entry = ledger.entry_mut(*swapper);
        let total = entry
            .total_points
            .checked_add(tally.points)
            .ok_or_else(|| CycleError::Arithmetic(format!("swap points of {}", swapper)))?;
        let amount = entry
            .amount
            .checked_add(tally.swaps)
            .ok_or_else(|| CycleError::Arithmetic(format!("swap count of {}", swapper)))?;
        history::record(entry, total, now);
        entry.amount = amount;
    }

    info!(
        swaps = events.len(),
        swappers = tallies.len(),
        "Compiled swap points"
    );
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{HistoryEntry, PointsEntry};
    use crate::domain::{Address, PriceFeed, PromotedPair};
    use std::collections::{HashMap, HashSet};

    const USDC: Address = Address([10u8; 32]);
    const SOL: Address = Address([11u8; 32]);
    const TRADER: Address = Address([1u8; 32]);

    #[test]
    fn test_swaps_accumulate_onto_prior_ledger() {
        let pairs = vec![PromotedPair {
            token_x: USDC,
            token_y: SOL,
            x_decimal: 6,
            y_decimal: 9,
            feed_x_id: "aa".to_string(),
            feed_y_id: "bb".to_string(),
            start_signature: None,
            fee_tier_accounts: vec![],
        }];
        let feeds: HashMap<String, PriceFeed> = [(
            "aa".to_string(),
            PriceFeed {
                id: "aa".to_string(),
                price: 100_000_000,
                conf: 0,
                expo: -8,
                publish_time: 0,
            },
        )]
        .into_iter()
        .collect();
        let blacklist = HashSet::new();
        let ctx = SwapContext {
            pairs: &pairs,
            feeds: &feeds,
            blacklist: &blacklist,
            points_per_usd: 1_000,
        };

        let now = 200_000;
        let mut prior: PointsLedger<Swap> = PointsLedger::new();
        prior.insert(
            TRADER,
            PointsEntry {
                total_points: 50,
                amount: 2,
                history: vec![
                    HistoryEntry {
                        timestamp: now - 90_000,
                        diff: 20,
                    },
                    HistoryEntry {
                        timestamp: now - 1_000,
                        diff: 30,
                    },
                ],
            },
        );

        let swap = SwapEvent {
            swapper: TRADER,
            token_x: USDC,
            token_y: SOL,
            x_to_y: true,
            fee: 2_000_000,
        };
        let ledger = compile_swaps(&prior, &[swap.clone(), swap], &ctx, now).unwrap();
        let entry = ledger.get(&TRADER).unwrap();
        assert_eq!(entry.total_points, 50 + 4_000);
        assert_eq!(entry.amount, 4);
        assert_eq!(
            entry.history,
            vec![
                HistoryEntry {
                    timestamp: now - 1_000,
                    diff: 30
                },
                HistoryEntry {
                    timestamp: now,
                    diff: 4_000
                },
            ]
        );
    }

    #[test]
    fn test_swap_count_overflow_is_arithmetic_error() {
        let pairs = vec![PromotedPair {
            token_x: USDC,
            token_y: SOL,
            x_decimal: 6,
            y_decimal: 9,
            feed_x_id: "aa".to_string(),
            feed_y_id: "bb".to_string(),
            start_signature: None,
            fee_tier_accounts: vec![],
        }];
        let feeds: HashMap<String, PriceFeed> = [(
            "aa".to_string(),
            PriceFeed {
                id: "aa".to_string(),
                price: 100_000_000,
                conf: 0,
                expo: -8,
                publish_time: 0,
            },
        )]
        .into_iter()
        .collect();
        let blacklist = HashSet::new();
        let ctx = SwapContext {
            pairs: &pairs,
            feeds: &feeds,
            blacklist: &blacklist,
            points_per_usd: 1_000,
        };

        let mut prior: PointsLedger<Swap> = PointsLedger::new();
        prior.insert(
            TRADER,
            PointsEntry {
                total_points: 0,
                amount: u32::MAX,
                history: vec![],
            },
        );
        let swap = SwapEvent {
            swapper: TRADER,
            token_x: USDC,
            token_y: SOL,
            x_to_y: true,
            fee: 1_000_000,
        };

        let result = compile_swaps(&prior, &[swap], &ctx, 1_000);
        assert!(matches!(result, Err(CycleError::Arithmetic(_))));
    }
}
