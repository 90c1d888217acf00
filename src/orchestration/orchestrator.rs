use crate::compile::{build_summary, compile_liquidity, compile_swaps, BucketCounts};
use crate::config::Config;
use crate::datasource::{decode, ChainReader, PriceSource};
use crate::db::{CycleCommit, EncodedLedger, Repository};
use crate::domain::{normalize_feed_id, Address, PoolSnapshot, PriceFeed, PromotedPool, Signature, UnixSeconds};
use crate::engine::{select_feeds, SwapContext};
use crate::error::CycleError;
use crate::orchestration::sync::{AccountSync, ChainSync, SyncTarget};
use crate::retry::with_retry;
use futures::future::try_join_all;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// What a committed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub timestamp: UnixSeconds,
    pub lp_signatures: usize,
    pub lp_events: usize,
    pub buckets: BucketCounts,
    pub swap_signatures: usize,
    pub swap_events: usize,
    pub feeds: usize,
}

/// Runs sync cycles: read prior state, walk the chain, recompute both
/// ledgers, and commit everything at once.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    sync: ChainSync,
    prices: Arc<dyn PriceSource>,
    repo: Arc<Repository>,
    config: Config,
}

impl Orchestrator {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        prices: Arc<dyn PriceSource>,
        repo: Arc<Repository>,
        config: Config,
    ) -> Self {
        let sync = ChainSync::new(reader, config.retry, config.max_signatures_per_call)
            .with_full_snapshot_start(config.full_snapshot_start.clone());
        Self {
            sync,
            prices,
            repo,
            config,
        }
    }

    /// Runs one cycle as of `now`.
    ///
    /// Nothing is written unless every step succeeds. A failed cycle can be
    /// rerun and resumes from the last committed checkpoints.
    pub async fn run_cycle(&self, now: UnixSeconds) -> Result<CycleReport, CycleError> {
        let state = self.repo.load_state().await?;
        let mut checkpoints = state.checkpoints.clone();

        // Liquidity
        let live_pools: Vec<&PromotedPool> = self
            .config
            .promoted_pools
            .iter()
            .filter(|p| p.is_live(now))
            .collect();
        let lp_accounts: BTreeSet<Address> = live_pools.iter().map(|p| p.event_account()).collect();
        let lp_targets: Vec<SyncTarget> = lp_accounts
            .iter()
            .map(|account| SyncTarget {
                account: *account,
                checkpoint: checkpoints.get(account).cloned(),
                start: None,
            })
            .collect();

        let lp_synced = self.sync.sync_accounts(&lp_targets).await?;
        let lp_signatures = unique_signatures(&lp_synced);
        let lp_logs = self.sync.fetch_logs(&lp_signatures).await?;
        let lp_events = decode::position_events(&lp_logs, &self.config.program_id);

        let snapshots: HashMap<Address, PoolSnapshot> = try_join_all(live_pools.iter().map(|pool| async move {
            let state = self.sync.snapshot_pool(&pool.address).await?;
            Ok::<_, CycleError>((pool.address, PoolSnapshot::new(state, pool.points_per_second)))
        }))
        .await?
        .into_iter()
        .collect();

        let liquidity = compile_liquidity(
            &state.owners,
            &state.lp_points,
            &state.historical,
            &lp_events,
            &snapshots,
            now,
        )?;

        // Swaps
        let swap_targets: Vec<SyncTarget> = self
            .config
            .promoted_pairs
            .iter()
            .flat_map(|pair| {
                pair.fee_tier_accounts.iter().map(|account| SyncTarget {
                    account: *account,
                    checkpoint: checkpoints.get(account).cloned(),
                    start: pair.start_signature.clone(),
                })
            })
            .collect();

        let swap_synced = self.sync.sync_accounts(&swap_targets).await?;
        let swap_signatures = unique_signatures(&swap_synced);
        let swap_logs = self.sync.fetch_logs(&swap_signatures).await?;
        let swap_events = decode::swap_events(&swap_logs);

        let feeds = self.refresh_feeds(&state.price_feeds).await;
        let ctx = SwapContext {
            pairs: &self.config.promoted_pairs,
            feeds: &feeds,
            blacklist: &self.config.swap_blacklist,
            points_per_usd: self.config.points_per_usd,
        };
        let swap_points = compile_swaps(&state.swap_points, &swap_events, &ctx, now)?;

        // Commit
        for synced in lp_synced.iter().chain(swap_synced.iter()) {
            if let Some(signature) = &synced.checkpoint {
                checkpoints.advance(synced.account, signature.clone());
            }
        }

        let lp_encoded = EncodedLedger::encode(&liquidity.points)?;
        let swap_encoded = EncodedLedger::encode(&swap_points)?;

        self.repo
            .commit_cycle(&CycleCommit {
                timestamp: now,
                checkpoints: &checkpoints,
                owners: &liquidity.owners,
                lp_points: &lp_encoded,
                swap_points: &swap_encoded,
                price_feeds: &feeds,
                lp_events: lp_events.len(),
                swap_events: swap_events.len(),
            })
            .await?;

        if let Some(path) = &self.config.summary_path {
            let summary = build_summary(&liquidity.points, &swap_points, now);
            // Already committed, so export failures only warn.
            match serde_json::to_vec_pretty(&summary) {
                Ok(bytes) => {
                    if let Err(e) = tokio::fs::write(path, bytes).await {
                        warn!(path = %path, error = %e, "Failed to write summary");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode summary"),
            }
        }

        let report = CycleReport {
            timestamp: now,
            lp_signatures: lp_signatures.len(),
            lp_events: lp_events.len(),
            buckets: liquidity.counts,
            swap_signatures: swap_signatures.len(),
            swap_events: swap_events.len(),
            feeds: feeds.len(),
        };
        info!(
            timestamp = now,
            lp_signatures = report.lp_signatures,
            lp_events = report.lp_events,
            swap_signatures = report.swap_signatures,
            swap_events = report.swap_events,
            "Cycle committed"
        );
        Ok(report)
    }

    /// Fresh feeds where acceptable, the stored ones otherwise. A failing
    /// price source leaves the stored feeds in place.
    async fn refresh_feeds(&self, previous: &HashMap<String, PriceFeed>) -> HashMap<String, PriceFeed> {
        let ids: Vec<String> = self
            .config
            .promoted_pairs
            .iter()
            .flat_map(|p| [normalize_feed_id(&p.feed_x_id), normalize_feed_id(&p.feed_y_id)])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let previous: Vec<PriceFeed> = previous.values().cloned().collect();
        if ids.is_empty() {
            return select_feeds(&[], &previous, self.config.max_confidence_percentage);
        }

        let fresh = match with_retry(&self.config.retry, "latestPriceUpdates", || {
            self.prices.latest_feeds(&ids)
        })
        .await
        {
            Ok(feeds) => feeds,
            Err(e) => {
                warn!(error = %e, feeds = ids.len(), "Price source unavailable, using stored feeds");
                Vec::new()
            }
        };
        select_feeds(&fresh, &previous, self.config.max_confidence_percentage)
    }
}

/// Signatures of all walked accounts, each once, oldest first per account.
fn unique_signatures(synced: &[AccountSync]) -> Vec<Signature> {
    let mut seen = HashSet::new();
    synced
        .iter()
        .flat_map(|s| s.signatures.iter())
        .filter(|sig| seen.insert(*sig))
        .cloned()
        .collect()
}
