//! Rolling 24-hour history of point diffs.

use crate::codec::{HistoryEntry, LedgerVariant, PointsEntry, PointsLedger, MAX_HISTORY_LEN};
use crate::domain::UnixSeconds;
use tracing::warn;

pub const DAY: UnixSeconds = 86_400;

/// Drops entries older than 24h. An entry exactly 24h old is kept.
pub fn prune(history: &mut Vec<HistoryEntry>, now: UnixSeconds) {
    history.retain(|h| h.timestamp.saturating_add(DAY) >= now);
}

/// Moves `entry` to `new_total`, recording the positive diff at `now`.
///
/// Unchanged totals append nothing. A total that went down is logged and
/// leaves the history alone. Once more than 255 entries would be kept the
/// oldest are dropped.
pub fn record(entry: &mut PointsEntry, new_total: u128, now: UnixSeconds) {
    prune(&mut entry.history, now);

    if new_total < entry.total_points {
        warn!(
            previous = %entry.total_points,
            new_total = %new_total,
            "Points total decreased, skipping history entry"
        );
    } else {
        let diff = new_total - entry.total_points;
        if diff > 0 {
            entry.history.push(HistoryEntry {
                timestamp: now,
                diff,
            });
        }
    }
    entry.total_points = new_total;

    if entry.history.len() > MAX_HISTORY_LEN {
        let excess = entry.history.len() - MAX_HISTORY_LEN;
        entry.history.drain(..excess);
    }
}

/// Prunes every entry in the ledger.
pub fn prune_all<V: LedgerVariant>(ledger: &mut PointsLedger<V>, now: UnixSeconds) {
    for (_, entry) in ledger.iter_mut() {
        prune(&mut entry.history, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(total: u128, history: &[(u64, u128)]) -> PointsEntry {
        PointsEntry {
            total_points: total,
            amount: 0,
            history: history
                .iter()
                .map(|&(timestamp, diff)| HistoryEntry { timestamp, diff })
                .collect(),
        }
    }

    #[test]
    fn test_prune_drops_entries_older_than_a_day() {
        let now = 100_000;
        let mut history = entry(0, &[(now - 90_000, 1), (now - 1_000, 2)]).history;
        prune(&mut history, now);
        assert_eq!(history, vec![HistoryEntry { timestamp: now - 1_000, diff: 2 }]);
    }

    #[test]
    fn test_prune_keeps_entry_exactly_one_day_old() {
        let now = 200_000;
        let mut history = entry(0, &[(now - DAY, 1)]).history;
        prune(&mut history, now);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_record_appends_positive_diff() {
        let mut e = entry(10, &[]);
        record(&mut e, 25, 1_000);
        assert_eq!(e.total_points, 25);
        assert_eq!(e.history, vec![HistoryEntry { timestamp: 1_000, diff: 15 }]);
    }

    #[test]
    fn test_record_is_idempotent_for_unchanged_total() {
        let mut e = entry(10, &[(900, 10)]);
        record(&mut e, 10, 1_000);
        let once = e.clone();
        record(&mut e, 10, 1_000);
        assert_eq!(e, once);
        assert_eq!(e.history.len(), 1);
    }

    #[test]
    fn test_record_skips_decrease() {
        let mut e = entry(10, &[(900, 10)]);
        record(&mut e, 4, 1_000);
        assert_eq!(e.total_points, 4);
        assert_eq!(e.history, vec![HistoryEntry { timestamp: 900, diff: 10 }]);
    }

    #[test]
    fn test_record_caps_history_length() {
        let now = 10_000;
        let full: Vec<(u64, u128)> = (0..MAX_HISTORY_LEN as u64).map(|i| (now - 1_000 + i, 1)).collect();
        let mut e = entry(MAX_HISTORY_LEN as u128, &full);
        record(&mut e, MAX_HISTORY_LEN as u128 + 7, now);
        assert_eq!(e.history.len(), MAX_HISTORY_LEN);
        assert_eq!(e.history.last().unwrap().diff, 7);
        // oldest dropped
        assert_eq!(e.history[0].timestamp, now - 999);
    }

    #[test]
    fn test_prune_all_touches_every_entry() {
        let now = 500_000;
        let mut ledger: PointsLedger<crate::codec::Swap> = PointsLedger::new();
        ledger.insert(crate::domain::Address::new([1u8; 32]), entry(1, &[(1, 1)]));
        ledger.insert(crate::domain::Address::new([2u8; 32]), entry(2, &[(now, 2)]));
        prune_all(&mut ledger, now);
        let lens: Vec<usize> = ledger.iter().map(|(_, e)| e.history.len()).collect();
        assert_eq!(lens, vec![0, 1]);
    }
}
