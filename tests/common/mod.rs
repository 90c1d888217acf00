#![allow(dead_code)]

use pointsnap::config::Config;
use pointsnap::domain::{Address, PromotedPair, PromotedPool};
use pointsnap::retry::RetryPolicy;
use pointsnap::{init_db, Repository};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const PROGRAM: Address = Address([7u8; 32]);

pub async fn setup_repo() -> (Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("ledger.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Arc::new(Repository::new(pool)), temp_dir)
}

pub fn test_config(pools: Vec<PromotedPool>, pairs: Vec<PromotedPair>) -> Config {
    Config {
        database_path: ":memory:".to_string(),
        rpc_url: "http://example.invalid".to_string(),
        program_id: PROGRAM,
        hermes_url: "http://example.invalid".to_string(),
        promoted_pools: pools,
        promoted_pairs: pairs,
        swap_blacklist: HashSet::new(),
        full_snapshot_start: None,
        retry: RetryPolicy::new(2, Duration::from_millis(1)),
        max_signatures_per_call: 2,
        max_confidence_percentage: Decimal::ONE,
        points_per_usd: 1_000,
        summary_path: None,
    }
}
