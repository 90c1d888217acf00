//! In-memory chain and price sources for tests without network calls.

use super::decode::logs_for_events;
use super::{ChainError, ChainReader, PriceSource};
use crate::domain::{normalize_feed_id, Address, PoolState, PriceFeed, ProtocolEvent, Signature};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Reader operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    ListSignatures,
    LatestSignature,
    TransactionLogs,
    PoolState,
}

#[derive(Debug, Default)]
struct ChainState {
    /// Signatures per account, oldest first.
    history: HashMap<Address, Vec<Signature>>,
    logs: HashMap<Signature, Vec<String>>,
    pools: HashMap<Address, PoolState>,
    /// Scripted answers for `latest_signature`, consumed before the real one.
    latest_script: HashMap<Address, VecDeque<Option<Signature>>>,
    pending_failures: HashMap<MockOp, u32>,
    calls: HashMap<MockOp, usize>,
}

/// Mock chain that serves transactions and pools added by the test.
///
/// State sits behind a mutex so a test can keep adding transactions between
/// cycles through a shared handle.
#[derive(Debug)]
pub struct MockChainReader {
    program_id: Address,
    page_size: usize,
    state: Mutex<ChainState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockChainReader {
    pub fn new(program_id: Address) -> Self {
        Self {
            program_id,
            page_size: 1_000,
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn program_id(&self) -> Address {
        self.program_id
    }

    /// Page size of `list_signatures`, to exercise pagination.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add a transaction touching `account` that emitted `events`.
    pub fn with_transaction(self, account: Address, signature: &str, events: Vec<ProtocolEvent>) -> Self {
        self.add_transaction(account, signature, events);
        self
    }

    pub fn with_pool(self, pool: PoolState) -> Self {
        self.set_pool(pool);
        self
    }

    /// Script the next answers of `latest_signature` for `account`.
    pub fn with_latest_script(self, account: Address, answers: Vec<Option<Signature>>) -> Self {
        lock(&self.state)
            .latest_script
            .entry(account)
            .or_default()
            .extend(answers);
        self
    }

    /// Fail the next `count` calls of `op` with a network error.
    pub fn with_transient_failures(self, op: MockOp, count: u32) -> Self {
        self.fail_next(op, count);
        self
    }

    pub fn add_transaction(&self, account: Address, signature: &str, events: Vec<ProtocolEvent>) {
        let logs = logs_for_events(&self.program_id, &events);
        self.add_transaction_logs(account, signature, logs);
    }

    pub fn add_transaction_logs(&self, account: Address, signature: &str, logs: Vec<String>) {
        let signature = Signature::new(signature);
        let mut state = lock(&self.state);
        state.history.entry(account).or_default().push(signature.clone());
        state.logs.insert(signature, logs);
    }

    pub fn set_pool(&self, pool: PoolState) {
        lock(&self.state).pools.insert(pool.address, pool);
    }

    pub fn fail_next(&self, op: MockOp, count: u32) {
        *lock(&self.state).pending_failures.entry(op).or_default() += count;
    }

    pub fn calls(&self, op: MockOp) -> usize {
        lock(&self.state).calls.get(&op).copied().unwrap_or(0)
    }

    /// Counts the call and returns an injected failure, if one is pending.
    fn enter(&self, op: MockOp) -> Result<MutexGuard<'_, ChainState>, ChainError> {
        let mut state = lock(&self.state);
        *state.calls.entry(op).or_default() += 1;
        if let Some(pending) = state.pending_failures.get_mut(&op) {
            if *pending > 0 {
                *pending -= 1;
                return Err(ChainError::NetworkError(format!("injected {:?} failure", op)));
            }
        }
        Ok(state)
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn list_signatures(
        &self,
        account: &Address,
        before: Option<&Signature>,
        until: Option<&Signature>,
    ) -> Result<Vec<Signature>, ChainError> {
        let state = self.enter(MockOp::ListSignatures)?;
        let Some(history) = state.history.get(account) else {
            return Ok(Vec::new());
        };

        let mut newest_first = history.iter().rev();
        if let Some(before) = before {
            // Unknown cursor yields nothing, like the node.
            if !history.contains(before) {
                return Ok(Vec::new());
            }
            for sig in newest_first.by_ref() {
                if sig == before {
                    break;
                }
            }
        }

        Ok(newest_first
            .take_while(|sig| Some(*sig) != until)
            .take(self.page_size)
            .cloned()
            .collect())
    }

    async fn latest_signature(&self, account: &Address) -> Result<Option<Signature>, ChainError> {
        let mut state = self.enter(MockOp::LatestSignature)?;
        if let Some(answer) = state.latest_script.get_mut(account).and_then(VecDeque::pop_front) {
            return Ok(answer);
        }
        Ok(state.history.get(account).and_then(|h| h.last()).cloned())
    }

    async fn fetch_transaction_logs(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Vec<String>>, ChainError> {
        let state = self.enter(MockOp::TransactionLogs)?;
        signatures
            .iter()
            .map(|sig| {
                state
                    .logs
                    .get(sig)
                    .cloned()
                    .ok_or_else(|| ChainError::ParseError(format!("Unknown transaction {}", sig)))
            })
            .collect()
    }

    async fn fetch_pool_state(&self, pool: &Address) -> Result<PoolState, ChainError> {
        let state = self.enter(MockOp::PoolState)?;
        state
            .pools
            .get(pool)
            .cloned()
            .ok_or(ChainError::AccountNotFound(*pool))
    }
}

/// Mock price source returning fixed feeds.
#[derive(Debug, Default)]
pub struct MockPriceSource {
    feeds: Mutex<Vec<PriceFeed>>,
    failing: Mutex<bool>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(self, feed: PriceFeed) -> Self {
        lock(&self.feeds).push(feed);
        self
    }

    pub fn set_feeds(&self, feeds: Vec<PriceFeed>) {
        *lock(&self.feeds) = feeds;
    }

    /// Make every request fail with a network error.
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn latest_feeds(&self, ids: &[String]) -> Result<Vec<PriceFeed>, ChainError> {
        if *lock(&self.failing) {
            return Err(ChainError::NetworkError("price source unavailable".to_string()));
        }
        let wanted: Vec<String> = ids.iter().map(|id| normalize_feed_id(id)).collect();
        Ok(lock(&self.feeds)
            .iter()
            .filter(|f| wanted.contains(&normalize_feed_id(&f.id)))
            .cloned()
            .collect())
    }
}
