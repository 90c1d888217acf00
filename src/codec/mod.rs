//! Points ledgers and their persisted encodings.
//!
//! A ledger maps an address to its accrued points, a count (open positions for
//! liquidity points, swaps for swap points) and a rolling 24h history of point
//! diffs. Field widths differ per ledger variant and are declared once on the
//! [`LedgerVariant`] implementations; both the binary and JSON serializers
//! enforce them.

use crate::domain::{Address, AddressParseError};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

pub mod binary;
pub mod json;

/// The history length is stored in a single byte.
pub const MAX_HISTORY_LEN: usize = u8::MAX as usize;

/// Fixed field widths (in bytes) of one ledger variant.
pub trait LedgerVariant: fmt::Debug + Clone + Copy + PartialEq + Eq + Default + 'static {
    const NAME: &'static str;
    const TOTAL_POINTS_SIZE: usize;
    const AMOUNT_SIZE: usize = 4;
    const TIMESTAMP_SIZE: usize;
    const DIFF_SIZE: usize;
    /// Key of the count field in the JSON document.
    const AMOUNT_FIELD: &'static str;
}

/// Liquidity-provider points. Existing persisted ledgers use 4-byte
/// timestamps and 8-byte diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lp;

impl LedgerVariant for Lp {
    const NAME: &'static str = "lp";
    const TOTAL_POINTS_SIZE: usize = 16;
    const TIMESTAMP_SIZE: usize = 4;
    const DIFF_SIZE: usize = 8;
    const AMOUNT_FIELD: &'static str = "positionsAmount";
}

/// Swap points. Totals are 8 bytes and timestamps are stored at full width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Swap;

impl LedgerVariant for Swap {
    const NAME: &'static str = "swap";
    const TOTAL_POINTS_SIZE: usize = 8;
    const TIMESTAMP_SIZE: usize = 8;
    const DIFF_SIZE: usize = 8;
    const AMOUNT_FIELD: &'static str = "swapsAmount";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryEntry {
    pub timestamp: u64,
    pub diff: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PointsEntry {
    pub total_points: u128,
    /// Open positions (LP ledger) or swaps made (swap ledger).
    pub amount: u32,
    pub history: Vec<HistoryEntry>,
}

impl PointsEntry {
    /// Sum of the diffs currently in the rolling window.
    pub fn last_24h_points(&self) -> u128 {
        self.history
            .iter()
            .fold(0u128, |acc, h| acc.saturating_add(h.diff))
    }
}

/// Address -> points entry, ordered by address for deterministic encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsLedger<V: LedgerVariant> {
    entries: BTreeMap<Address, PointsEntry>,
    _variant: PhantomData<V>,
}

impl<V: LedgerVariant> Default for PointsLedger<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: LedgerVariant> PointsLedger<V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            _variant: PhantomData,
        }
    }

    pub fn get(&self, address: &Address) -> Option<&PointsEntry> {
        self.entries.get(address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut PointsEntry> {
        self.entries.get_mut(address)
    }

    pub fn entry_mut(&mut self, address: Address) -> &mut PointsEntry {
        self.entries.entry(address).or_default()
    }

    pub fn insert(&mut self, address: Address, entry: PointsEntry) -> Option<PointsEntry> {
        self.entries.insert(address, entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &PointsEntry)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Address, &mut PointsEntry)> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks every field against the variant's declared widths.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.entries.len() > u32::MAX as usize {
            return Err(CodecError::TooManyEntries(self.entries.len()));
        }
        for (address, entry) in &self.entries {
            validate_entry::<V>(address, entry)?;
        }
        Ok(())
    }
}

impl<V: LedgerVariant> FromIterator<(Address, PointsEntry)> for PointsLedger<V> {
    fn from_iter<I: IntoIterator<Item = (Address, PointsEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            _variant: PhantomData,
        }
    }
}

fn validate_entry<V: LedgerVariant>(address: &Address, entry: &PointsEntry) -> Result<(), CodecError> {
    check_width(address, "totalPoints", entry.total_points, V::TOTAL_POINTS_SIZE)?;
    check_width(address, V::AMOUNT_FIELD, u128::from(entry.amount), V::AMOUNT_SIZE)?;
    if entry.history.len() > MAX_HISTORY_LEN {
        return Err(CodecError::HistoryTooLong {
            address: *address,
            len: entry.history.len(),
        });
    }
    for item in &entry.history {
        check_width(address, "timestamp", u128::from(item.timestamp), V::TIMESTAMP_SIZE)?;
        check_width(address, "diff", item.diff, V::DIFF_SIZE)?;
    }
    Ok(())
}

/// Largest value representable in `bytes` little-endian bytes.
pub(crate) fn max_for_width(bytes: usize) -> u128 {
    if bytes >= 16 {
        u128::MAX
    } else {
        (1u128 << (bytes * 8)) - 1
    }
}

fn check_width(
    address: &Address,
    field: &'static str,
    value: u128,
    bytes: usize,
) -> Result<(), CodecError> {
    if value > max_for_width(bytes) {
        return Err(CodecError::FieldOverflow {
            address: *address,
            field,
            value,
            bytes,
        });
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{field}={value} of {address} does not fit in {bytes} bytes")]
    FieldOverflow {
        address: Address,
        field: &'static str,
        value: u128,
        bytes: usize,
    },
    #[error("history of {address} has {len} entries, at most 255 can be stored")]
    HistoryTooLong { address: Address, len: usize },
    #[error("ledger has {0} entries, more than a u32 count allows")]
    TooManyEntries(usize),
    #[error("truncated ledger: need {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("{remaining} trailing bytes after the last entry at offset {offset}")]
    TrailingBytes { offset: usize, remaining: usize },
    #[error("address {0} appears more than once")]
    DuplicateAddress(Address),
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressParseError),
    #[error("invalid number for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid JSON ledger: {0}")]
    Json(#[from] serde_json::Error),
}
