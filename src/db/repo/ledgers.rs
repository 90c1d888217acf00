//! Owner ledgers, encoded points ledgers and carried-over historical points.

use crate::codec::{LedgerVariant, PointsLedger};
use crate::domain::{Address, OwnerLedger};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::Repository;
use crate::db::StoreError;

impl Repository {
    /// Loads every owner ledger.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored document does not parse.
    pub async fn get_owner_ledgers(&self) -> Result<BTreeMap<Address, OwnerLedger>, StoreError> {
        let rows = sqlx::query("SELECT ledger_json FROM owner_ledgers")
            .fetch_all(&self.pool)
            .await?;

        let mut owners = BTreeMap::new();
        for row in rows {
            let json: String = row.get("ledger_json");
            let ledger: OwnerLedger = serde_json::from_str(&json)?;
            owners.insert(ledger.owner, ledger);
        }
        Ok(owners)
    }

    /// Loads and decodes the points ledger of variant `V`, empty if none was stored.
    ///
    /// # Errors
    /// Returns an error if the query fails or the stored blob does not decode.
    pub async fn get_points_ledger<V: LedgerVariant>(&self) -> Result<PointsLedger<V>, StoreError> {
        let row = sqlx::query("SELECT data FROM points_ledgers WHERE variant = ?")
            .bind(V::NAME)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let data: Vec<u8> = row.get("data");
                Ok(PointsLedger::from_binary(&data)?)
            }
            None => Ok(PointsLedger::new()),
        }
    }

    /// Points earned before tracking began, added to LP totals.
    pub async fn get_historical_points(&self) -> Result<HashMap<Address, u128>, StoreError> {
        let rows = sqlx::query("SELECT owner, points FROM historical_points")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let owner: String = row.get("owner");
                let points: String = row.get("points");
                let owner: Address = owner
                    .parse()
                    .map_err(|e| StoreError::InvalidData(format!("historical owner: {}", e)))?;
                let points: u128 = points.parse().map_err(|_| {
                    StoreError::InvalidData(format!("historical points {:?} of {}", points, owner))
                })?;
                Ok((owner, points))
            })
            .collect()
    }

    /// Replaces the carried-over historical points.
    pub async fn set_historical_points(
        &self,
        points: &HashMap<Address, u128>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM historical_points")
            .execute(&mut *tx)
            .await?;
        for (owner, value) in points {
            sqlx::query("INSERT INTO historical_points (owner, points) VALUES (?, ?)")
                .bind(owner.to_string())
                .bind(value.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

pub(super) async fn write_owner_ledgers(
    conn: &mut SqliteConnection,
    owners: &BTreeMap<Address, OwnerLedger>,
    updated_at: i64,
) -> Result<(), StoreError> {
    for (owner, ledger) in owners {
        sqlx::query(
            r#"
            INSERT INTO owner_ledgers (owner, ledger_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(owner) DO UPDATE SET
                ledger_json = excluded.ledger_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(owner.to_string())
        .bind(serde_json::to_string(ledger)?)
        .bind(updated_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub(super) async fn write_points_ledger<V: LedgerVariant>(
    conn: &mut SqliteConnection,
    blob: &[u8],
    entries: usize,
    updated_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO points_ledgers (variant, data, entries, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(variant) DO UPDATE SET
            data = excluded.data,
            entries = excluded.entries,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(V::NAME)
    .bind(blob)
    .bind(entries as i64)
    .bind(updated_at)
    .execute(&mut *conn)
    .await?;
    debug!(variant = V::NAME, bytes = blob.len(), entries, "Stored points ledger");
    Ok(())
}
