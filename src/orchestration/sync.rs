//! Checkpointed chain sync.
//!
//! Walks each tracked account backward from its newest signature down to
//! the last processed one, then fetches the transaction logs in batches.
//! A walk (and a pool snapshot) only counts when the account's newest
//! signature is the same before and after the read; otherwise the read is
//! repeated under the retry policy.

use crate::datasource::{ChainError, ChainReader};
use crate::domain::{Address, PoolState, Signature};
use crate::error::CycleError;
use crate::retry::{with_retry, RetryError, RetryPolicy, Transient};
use futures::future::try_join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// An account to walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub account: Address,
    /// Newest signature already processed.
    pub checkpoint: Option<Signature>,
    /// Walk floor for an account that has no checkpoint yet.
    pub start: Option<Signature>,
}

/// Result of walking one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSync {
    pub account: Address,
    /// Signatures newer than the checkpoint, oldest first.
    pub signatures: Vec<Signature>,
    /// Checkpoint to store once the cycle commits.
    pub checkpoint: Option<Signature>,
}

/// Outcome of one consistent-read attempt.
#[derive(Debug)]
enum Attempt {
    /// The account's newest signature changed during the read.
    Moved {
        before: Option<Signature>,
        after: Option<Signature>,
    },
    Fatal(CycleError),
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::Moved { before, after } => write!(
                f,
                "newest signature moved from {} to {}",
                before.as_ref().map_or("none", Signature::as_str),
                after.as_ref().map_or("none", Signature::as_str)
            ),
            Attempt::Fatal(e) => write!(f, "{}", e),
        }
    }
}

impl Transient for Attempt {
    fn is_transient(&self) -> bool {
        matches!(self, Attempt::Moved { .. })
    }
}

fn into_cycle_error(account: Address, err: RetryError<Attempt>) -> CycleError {
    match err {
        RetryError::Exhausted { attempts, .. } => CycleError::StateInconsistency { account, attempts },
        RetryError::Permanent(Attempt::Fatal(e)) => e,
        RetryError::Permanent(Attempt::Moved { .. }) => CycleError::StateInconsistency { account, attempts: 1 },
    }
}

#[derive(Debug, Clone)]
pub struct ChainSync {
    reader: Arc<dyn ChainReader>,
    policy: RetryPolicy,
    batch_size: usize,
    full_snapshot_start: Option<Signature>,
}

impl ChainSync {
    pub fn new(reader: Arc<dyn ChainReader>, policy: RetryPolicy, batch_size: usize) -> Self {
        Self {
            reader,
            policy,
            batch_size: batch_size.max(1),
            full_snapshot_start: None,
        }
    }

    /// Floor for accounts that have neither a checkpoint nor their own start.
    pub fn with_full_snapshot_start(mut self, start: Option<Signature>) -> Self {
        self.full_snapshot_start = start;
        self
    }

    async fn latest(&self, account: &Address) -> Result<Option<Signature>, CycleError> {
        with_retry(&self.policy, "getLatestSignature", || {
            self.reader.latest_signature(account)
        })
        .await
        .map_err(|e| CycleError::from_chain("getLatestSignature", e))
    }

    /// Every signature of `account` newer than `until`, newest first.
    ///
    /// Pages are requested with `before` set to the oldest signature seen so
    /// far. Each page is retried on its own.
    pub async fn collect_signatures(
        &self,
        account: &Address,
        until: Option<&Signature>,
    ) -> Result<Vec<Signature>, RetryError<ChainError>> {
        let mut collected: Vec<Signature> = Vec::new();
        let mut before: Option<Signature> = None;

        loop {
            let page = with_retry(&self.policy, "getSignaturesForAddress", || {
                self.reader.list_signatures(account, before.as_ref(), until)
            })
            .await?;
            if page.is_empty() {
                break;
            }

            // Nodes may include the bound itself.
            if let Some(pos) = page.iter().position(|s| Some(s) == until) {
                collected.extend(page.into_iter().take(pos));
                break;
            }
            before = page.last().cloned();
            collected.extend(page);
        }

        debug!(account = %account, signatures = collected.len(), "Collected signatures");
        Ok(collected)
    }

    /// Walks one account, repeating the walk while its newest signature moves.
    pub async fn sync_account(&self, target: &SyncTarget) -> Result<AccountSync, CycleError> {
        let account = target.account;
        let until = target
            .checkpoint
            .as_ref()
            .or(target.start.as_ref())
            .or(self.full_snapshot_start.as_ref());

        let newest_first = with_retry(&self.policy, "consistent signature walk", || async {
            let before = self.latest(&account).await.map_err(Attempt::Fatal)?;
            let signatures = self
                .collect_signatures(&account, until)
                .await
                .map_err(|e| Attempt::Fatal(CycleError::from_chain("getSignaturesForAddress", e)))?;
            let after = self.latest(&account).await.map_err(Attempt::Fatal)?;
            if before != after {
                return Err(Attempt::Moved { before, after });
            }
            Ok(signatures)
        })
        .await
        .map_err(|e| into_cycle_error(account, e))?;

        let checkpoint = newest_first
            .first()
            .cloned()
            .or_else(|| target.checkpoint.clone());
        let mut signatures = newest_first;
        signatures.reverse();

        Ok(AccountSync {
            account,
            signatures,
            checkpoint,
        })
    }

    /// Walks every target concurrently. Fails if any walk fails.
    pub async fn sync_accounts(&self, targets: &[SyncTarget]) -> Result<Vec<AccountSync>, CycleError> {
        let synced = try_join_all(targets.iter().map(|t| self.sync_account(t))).await?;
        info!(
            accounts = synced.len(),
            signatures = synced.iter().map(|s| s.signatures.len()).sum::<usize>(),
            "Synced accounts"
        );
        Ok(synced)
    }

    /// Logs of each transaction, in the order of `signatures`.
    pub async fn fetch_logs(&self, signatures: &[Signature]) -> Result<Vec<Vec<String>>, CycleError> {
        let mut logs = Vec::with_capacity(signatures.len());
        for batch in signatures.chunks(self.batch_size) {
            let fetched = with_retry(&self.policy, "getTransaction", || {
                self.reader.fetch_transaction_logs(batch)
            })
            .await
            .map_err(|e| CycleError::from_chain("getTransaction", e))?;
            logs.extend(fetched);
        }
        Ok(logs)
    }

    /// Reads a pool and its ticks, repeating the read while the pool moves.
    pub async fn snapshot_pool(&self, pool: &Address) -> Result<PoolState, CycleError> {
        with_retry(&self.policy, "consistent pool snapshot", || async {
            let before = self.latest(pool).await.map_err(Attempt::Fatal)?;
            let state = with_retry(&self.policy, "getPoolState", || {
                self.reader.fetch_pool_state(pool)
            })
            .await
            .map_err(|e| Attempt::Fatal(CycleError::from_chain("getPoolState", e)))?;
            let after = self.latest(pool).await.map_err(Attempt::Fatal)?;
            if before != after {
                return Err(Attempt::Moved { before, after });
            }
            Ok(state)
        })
        .await
        .map_err(|e| into_cycle_error(*pool, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::mock::MockOp;
    use crate::datasource::MockChainReader;
    use crate::domain::PoolState;
    use std::collections::HashMap;
    use std::time::Duration;

    const PROGRAM: Address = Address([7u8; 32]);
    const ACCOUNT: Address = Address([1u8; 32]);

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    fn reader_with(count: usize, page_size: usize) -> Arc<MockChainReader> {
        let reader = MockChainReader::new(PROGRAM).with_page_size(page_size);
        for i in 0..count {
            reader.add_transaction(ACCOUNT, &format!("sig-{}", i), vec![]);
        }
        Arc::new(reader)
    }

    fn target(checkpoint: Option<&str>) -> SyncTarget {
        SyncTarget {
            account: ACCOUNT,
            checkpoint: checkpoint.map(Signature::new),
            start: None,
        }
    }

    #[tokio::test]
    async fn test_walk_paginates_to_checkpoint() {
        let reader = reader_with(10, 3);
        let sync = ChainSync::new(reader.clone(), fast_policy(), 100);

        let synced = sync.sync_account(&target(Some("sig-2"))).await.unwrap();
        let expected: Vec<Signature> = (3..10).map(|i| Signature::new(format!("sig-{}", i))).collect();
        assert_eq!(synced.signatures, expected);
        assert_eq!(synced.checkpoint, Some(Signature::new("sig-9")));
        // 7 signatures in pages of 3, plus the empty page that ends the walk
        assert_eq!(reader.calls(MockOp::ListSignatures), 4);
    }

    #[tokio::test]
    async fn test_walk_without_bound_reads_everything() {
        let reader = reader_with(5, 2);
        let sync = ChainSync::new(reader, fast_policy(), 100);

        let synced = sync.sync_account(&target(None)).await.unwrap();
        assert_eq!(synced.signatures.len(), 5);
        assert_eq!(synced.signatures[0], Signature::new("sig-0"));
    }

    #[tokio::test]
    async fn test_full_snapshot_start_bounds_first_walk() {
        let reader = reader_with(5, 2);
        let sync = ChainSync::new(reader, fast_policy(), 100)
            .with_full_snapshot_start(Some(Signature::new("sig-1")));

        let synced = sync.sync_account(&target(None)).await.unwrap();
        assert_eq!(synced.signatures.first(), Some(&Signature::new("sig-2")));
        assert_eq!(synced.signatures.len(), 3);
    }

    #[tokio::test]
    async fn test_nothing_new_keeps_checkpoint() {
        let reader = reader_with(3, 10);
        let sync = ChainSync::new(reader, fast_policy(), 100);

        let synced = sync.sync_account(&target(Some("sig-2"))).await.unwrap();
        assert!(synced.signatures.is_empty());
        assert_eq!(synced.checkpoint, Some(Signature::new("sig-2")));
    }

    #[tokio::test]
    async fn test_transient_page_failure_is_retried() {
        let reader = reader_with(4, 2);
        reader.fail_next(MockOp::ListSignatures, 2);
        let sync = ChainSync::new(reader, fast_policy(), 100);

        let synced = sync.sync_account(&target(None)).await.unwrap();
        assert_eq!(synced.signatures.len(), 4);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_chain_unavailable() {
        let reader = reader_with(4, 2);
        reader.fail_next(MockOp::ListSignatures, 10);
        let sync = ChainSync::new(reader, fast_policy(), 100);

        match sync.sync_account(&target(None)).await {
            Err(CycleError::ChainUnavailable { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected ChainUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_moving_account_is_retried_then_accepted() {
        let reader = MockChainReader::new(PROGRAM)
            .with_transaction(ACCOUNT, "sig-0", vec![])
            .with_latest_script(
                ACCOUNT,
                vec![Some(Signature::new("sig-x")), Some(Signature::new("sig-0"))],
            );
        let sync = ChainSync::new(Arc::new(reader), fast_policy(), 100);

        let synced = sync.sync_account(&target(None)).await.unwrap();
        assert_eq!(synced.signatures, vec![Signature::new("sig-0")]);
    }

    #[tokio::test]
    async fn test_always_moving_account_is_inconsistent() {
        let script: Vec<Option<Signature>> = (0..20)
            .map(|i| Some(Signature::new(format!("moving-{}", i))))
            .collect();
        let reader = MockChainReader::new(PROGRAM).with_latest_script(ACCOUNT, script);
        let sync = ChainSync::new(Arc::new(reader), fast_policy(), 100);

        match sync.sync_account(&target(None)).await {
            Err(CycleError::StateInconsistency { account, attempts }) => {
                assert_eq!(account, ACCOUNT);
                assert_eq!(attempts, 4);
            }
            other => panic!("expected StateInconsistency, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_logs_in_batches() {
        let reader = reader_with(7, 100);
        let sync = ChainSync::new(reader.clone(), fast_policy(), 3);
        let signatures: Vec<Signature> = (0..7).map(|i| Signature::new(format!("sig-{}", i))).collect();

        let logs = sync.fetch_logs(&signatures).await.unwrap();
        assert_eq!(logs.len(), 7);
        assert_eq!(reader.calls(MockOp::TransactionLogs), 3);
    }

    #[tokio::test]
    async fn test_missing_pool_is_permanent() {
        let reader = Arc::new(MockChainReader::new(PROGRAM));
        let sync = ChainSync::new(reader.clone(), fast_policy(), 100);

        let result = sync.snapshot_pool(&ACCOUNT).await;
        assert!(matches!(
            result,
            Err(CycleError::Chain {
                source: ChainError::AccountNotFound(_),
                ..
            })
        ));
        assert_eq!(reader.calls(MockOp::PoolState), 1);
    }

    #[tokio::test]
    async fn test_snapshot_pool() {
        let pool = PoolState {
            address: ACCOUNT,
            liquidity: 5,
            current_tick: 0,
            seconds_per_liquidity_global: 9,
            last_timestamp: 100,
            ticks: HashMap::new(),
        };
        let reader = Arc::new(MockChainReader::new(PROGRAM).with_pool(pool.clone()));
        let sync = ChainSync::new(reader, fast_policy(), 100);
        assert_eq!(sync.snapshot_pool(&ACCOUNT).await.unwrap(), pool);
    }
}
