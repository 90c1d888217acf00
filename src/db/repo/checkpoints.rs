//! Signature checkpoints and cached price feeds.

use crate::compile::Checkpoints;
use crate::domain::{Address, PriceFeed, Signature};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use std::collections::HashMap;

use super::Repository;
use crate::db::StoreError;

impl Repository {
    /// Loads every stored checkpoint.
    ///
    /// # Errors
    /// Returns an error if the query fails or an account is not a valid address.
    pub async fn get_checkpoints(&self) -> Result<Checkpoints, StoreError> {
        let rows = sqlx::query("SELECT account, signature FROM checkpoints")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let account: String = row.get("account");
                let signature: String = row.get("signature");
                let account: Address = account
                    .parse()
                    .map_err(|e| StoreError::InvalidData(format!("checkpoint account: {}", e)))?;
                Ok((account, Signature::new(signature)))
            })
            .collect()
    }

    /// Price feeds used by the last committed cycle, keyed by feed id.
    pub async fn get_price_feeds(&self) -> Result<HashMap<String, PriceFeed>, StoreError> {
        let rows = sqlx::query("SELECT feed_id, feed_json FROM price_feeds")
            .fetch_all(&self.pool)
            .await?;

        let mut feeds = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("feed_id");
            let json: String = row.get("feed_json");
            feeds.insert(id, serde_json::from_str(&json)?);
        }
        Ok(feeds)
    }
}

pub(super) async fn write_checkpoints(
    conn: &mut SqliteConnection,
    checkpoints: &Checkpoints,
    updated_at: i64,
) -> Result<(), sqlx::Error> {
    for (account, signature) in checkpoints.iter() {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (account, signature, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(account) DO UPDATE SET
                signature = excluded.signature,
                updated_at = excluded.updated_at
            WHERE checkpoints.signature != excluded.signature
            "#,
        )
        .bind(account.to_string())
        .bind(signature.as_str())
        .bind(updated_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub(super) async fn write_price_feeds(
    conn: &mut SqliteConnection,
    feeds: &HashMap<String, PriceFeed>,
    updated_at: i64,
) -> Result<(), StoreError> {
    for (id, feed) in feeds {
        sqlx::query(
            r#"
            INSERT INTO price_feeds (feed_id, feed_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(feed_id) DO UPDATE SET
                feed_json = excluded.feed_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(serde_json::to_string(feed)?)
        .bind(updated_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::db::{init_db, Repository, StoreError};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_corrupt_checkpoint_account_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(temp_dir.path().join("ledger.db").to_str().unwrap())
            .await
            .unwrap();
        sqlx::query("INSERT INTO checkpoints (account, signature, updated_at) VALUES ('0OIl', 's', 0)")
            .execute(&pool)
            .await
            .unwrap();

        let repo = Repository::new(pool);
        assert!(matches!(
            repo.get_checkpoints().await,
            Err(StoreError::InvalidData(_))
        ));
    }
}
