//! Fixed-layout binary encoding of points ledgers.
//!
//! Little-endian, no padding:
//! `[u32 count] { [32-byte address][total][u32 amount][u8 len][len x (timestamp, diff)] }*`
//! with `total`, `timestamp` and `diff` widths taken from the ledger variant.

use super::{CodecError, HistoryEntry, LedgerVariant, PointsEntry, PointsLedger};
use crate::domain::primitives::ADDRESS_LEN;
use crate::domain::Address;

impl<V: LedgerVariant> PointsLedger<V> {
    const HISTORY_ENTRY_SIZE: usize = V::TIMESTAMP_SIZE + V::DIFF_SIZE;
    const ENTRY_HEADER_SIZE: usize = ADDRESS_LEN + V::TOTAL_POINTS_SIZE + V::AMOUNT_SIZE + 1;

    /// Encodes the ledger. Fails instead of truncating any field.
    pub fn to_binary(&self) -> Result<Vec<u8>, CodecError> {
        self.validate()?;

        let size = 4 + self
            .iter()
            .map(|(_, e)| Self::ENTRY_HEADER_SIZE + e.history.len() * Self::HISTORY_ENTRY_SIZE)
            .sum::<usize>();
        let mut out = Vec::with_capacity(size);

        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        for (address, entry) in self.iter() {
            out.extend_from_slice(address.as_bytes());
            put_uint(&mut out, entry.total_points, V::TOTAL_POINTS_SIZE);
            put_uint(&mut out, u128::from(entry.amount), V::AMOUNT_SIZE);
            out.push(entry.history.len() as u8);
            for item in &entry.history {
                put_uint(&mut out, u128::from(item.timestamp), V::TIMESTAMP_SIZE);
                put_uint(&mut out, item.diff, V::DIFF_SIZE);
            }
        }

        debug_assert_eq!(out.len(), size);
        Ok(out)
    }

    /// Decodes a ledger, rejecting truncated input and trailing bytes.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(bytes);
        let count = reader.uint(4)? as usize;

        // Every entry needs at least its header.
        reader.require(count.saturating_mul(Self::ENTRY_HEADER_SIZE))?;

        let mut ledger = Self::new();
        for _ in 0..count {
            let mut address = [0u8; ADDRESS_LEN];
            address.copy_from_slice(reader.take(ADDRESS_LEN)?);
            let address = Address::new(address);

            let total_points = reader.uint(V::TOTAL_POINTS_SIZE)?;
            let amount = reader.uint(V::AMOUNT_SIZE)? as u32;
            let history_len = reader.uint(1)? as usize;
            reader.require(history_len * Self::HISTORY_ENTRY_SIZE)?;

            let mut history = Vec::with_capacity(history_len);
            for _ in 0..history_len {
                let timestamp = reader.uint(V::TIMESTAMP_SIZE)? as u64;
                let diff = reader.uint(V::DIFF_SIZE)?;
                history.push(HistoryEntry { timestamp, diff });
            }

            let entry = PointsEntry {
                total_points,
                amount,
                history,
            };
            if ledger.insert(address, entry).is_some() {
                return Err(CodecError::DuplicateAddress(address));
            }
        }

        if reader.remaining() > 0 {
            return Err(CodecError::TrailingBytes {
                offset: reader.offset,
                remaining: reader.remaining(),
            });
        }
        Ok(ledger)
    }
}

fn put_uint(out: &mut Vec<u8>, value: u128, width: usize) {
    out.extend_from_slice(&value.to_le_bytes()[..width]);
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn require(&self, needed: usize) -> Result<(), CodecError> {
        if self.remaining() < needed {
            return Err(CodecError::Truncated {
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.require(len)?;
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn uint(&mut self, width: usize) -> Result<u128, CodecError> {
        let slice = self.take(width)?;
        let mut buf = [0u8; 16];
        buf[..width].copy_from_slice(slice);
        Ok(u128::from_le_bytes(buf))
    }
}
