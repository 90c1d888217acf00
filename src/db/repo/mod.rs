//! Repository for the ledger database.
//!
//! Reads happen once at the start of a cycle through [`Repository::load_state`];
//! everything a cycle produces is written by [`Repository::commit_cycle`] in a
//! single transaction, so a failed cycle leaves no partial state behind.

mod checkpoints;
mod ledgers;

use crate::codec::{CodecError, LedgerVariant, Lp, PointsLedger, Swap};
use crate::compile::Checkpoints;
use crate::domain::{Address, OwnerLedger, PriceFeed, UnixSeconds};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use tracing::info;

use super::StoreError;

/// Everything carried over from the previous committed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredState {
    pub checkpoints: Checkpoints,
    pub owners: BTreeMap<Address, OwnerLedger>,
    pub lp_points: PointsLedger<Lp>,
    pub swap_points: PointsLedger<Swap>,
    pub price_feeds: HashMap<String, PriceFeed>,
    pub historical: HashMap<Address, u128>,
}

/// A points ledger in its stored binary form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedLedger<V: LedgerVariant> {
    bytes: Vec<u8>,
    entries: usize,
    _variant: PhantomData<V>,
}

impl<V: LedgerVariant> EncodedLedger<V> {
    pub fn encode(ledger: &PointsLedger<V>) -> Result<Self, CodecError> {
        Ok(Self {
            bytes: ledger.to_binary()?,
            entries: ledger.len(),
            _variant: PhantomData,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn entries(&self) -> usize {
        self.entries
    }
}

/// The output of one cycle, written atomically.
#[derive(Debug, Clone, Copy)]
pub struct CycleCommit<'a> {
    pub timestamp: UnixSeconds,
    pub checkpoints: &'a Checkpoints,
    pub owners: &'a BTreeMap<Address, OwnerLedger>,
    pub lp_points: &'a EncodedLedger<Lp>,
    pub swap_points: &'a EncodedLedger<Swap>,
    pub price_feeds: &'a HashMap<String, PriceFeed>,
    pub lp_events: usize,
    pub swap_events: usize,
}

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Cycle state
    // =========================================================================

    /// Loads the state the next cycle starts from. An empty database yields
    /// empty ledgers and no checkpoints.
    ///
    /// # Errors
    /// Returns an error if a query fails or a stored value is corrupt.
    pub async fn load_state(&self) -> Result<StoredState, StoreError> {
        Ok(StoredState {
            checkpoints: self.get_checkpoints().await?,
            owners: self.get_owner_ledgers().await?,
            lp_points: self.get_points_ledger::<Lp>().await?,
            swap_points: self.get_points_ledger::<Swap>().await?,
            price_feeds: self.get_price_feeds().await?,
            historical: self.get_historical_points().await?,
        })
    }

    /// Writes the ledgers, price feeds and advanced checkpoints of a cycle in
    /// one transaction.
    ///
    /// # Errors
    /// Returns an error if any write fails. Nothing is written in that case.
    pub async fn commit_cycle(&self, commit: &CycleCommit<'_>) -> Result<(), StoreError> {
        let updated_at = commit.timestamp as i64;

        let mut tx = self.pool.begin().await?;

        checkpoints::write_checkpoints(&mut tx, commit.checkpoints, updated_at).await?;
        ledgers::write_owner_ledgers(&mut tx, commit.owners, updated_at).await?;
        ledgers::write_points_ledger::<Lp>(
            &mut tx,
            commit.lp_points.as_bytes(),
            commit.lp_points.entries(),
            updated_at,
        )
        .await?;
        ledgers::write_points_ledger::<Swap>(
            &mut tx,
            commit.swap_points.as_bytes(),
            commit.swap_points.entries(),
            updated_at,
        )
        .await?;
        checkpoints::write_price_feeds(&mut tx, commit.price_feeds, updated_at).await?;

        sqlx::query("INSERT INTO cycles (timestamp, lp_events, swap_events) VALUES (?, ?, ?)")
            .bind(updated_at)
            .bind(commit.lp_events as i64)
            .bind(commit.swap_events as i64)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            timestamp = commit.timestamp,
            checkpoints = commit.checkpoints.len(),
            owners = commit.owners.len(),
            lp_entries = commit.lp_points.entries(),
            swap_entries = commit.swap_points.entries(),
            "Committed cycle"
        );
        Ok(())
    }

    /// Timestamp of the newest committed cycle.
    pub async fn last_cycle_timestamp(&self) -> Result<Option<UnixSeconds>, StoreError> {
        let row = sqlx::query("SELECT MAX(timestamp) AS last FROM cycles")
            .fetch_one(&self.pool)
            .await?;
        let last: Option<i64> = row.get("last");
        last.map(|ts| {
            u64::try_from(ts).map_err(|_| StoreError::InvalidData(format!("cycle timestamp {}", ts)))
        })
        .transpose()
    }

    pub async fn cycle_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM cycles")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n.max(0) as u64)
    }
}
