//! Leaderboard summary derived from the points ledgers.

use crate::codec::{LedgerVariant, Lp, PointsLedger, Swap};
use crate::domain::primitives::serde_u128;
use crate::domain::{Address, UnixSeconds};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub address: Address,
    /// 1-based, by total points descending.
    pub rank: usize,
    #[serde(with = "serde_u128")]
    pub points: u128,
    #[serde(rename = "last24hPoints", with = "serde_u128")]
    pub last_24h_points: u128,
    /// Open positions or swaps, depending on the ledger.
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub generated_at: UnixSeconds,
    pub liquidity: Vec<LeaderboardRow>,
    pub swaps: Vec<LeaderboardRow>,
}

/// Ranks every address of a ledger. Ties are broken by address.
pub fn leaderboard<V: LedgerVariant>(ledger: &PointsLedger<V>) -> Vec<LeaderboardRow> {
    let mut rows: Vec<LeaderboardRow> = ledger
        .iter()
        .map(|(address, entry)| LeaderboardRow {
            address: *address,
            rank: 0,
            points: entry.total_points,
            last_24h_points: entry.last_24h_points(),
            amount: entry.amount,
        })
        .collect();
    rows.sort_by(|a, b| b.points.cmp(&a.points).then(a.address.cmp(&b.address)));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

pub fn build_summary(lp: &PointsLedger<Lp>, swaps: &PointsLedger<Swap>, now: UnixSeconds) -> Summary {
    Summary {
        generated_at: now,
        liquidity: leaderboard(lp),
        swaps: leaderboard(swaps),
    }
}
