//! End-to-end swap cycles: pricing, blacklist, and price-feed fallback.

mod common;

use common::{setup_repo, test_config, PROGRAM};
use pointsnap::domain::{Address, PriceFeed, PromotedPair, ProtocolEvent, Signature, SwapEvent};
use pointsnap::{CycleError, MockChainReader, MockPriceSource, Orchestrator};
use std::sync::Arc;

const USDC: Address = Address([10u8; 32]);
const SOL: Address = Address([11u8; 32]);
const FEE_TIER: Address = Address([20u8; 32]);
const TRADER: Address = Address([1u8; 32]);
const BOT: Address = Address([9u8; 32]);

fn pair() -> PromotedPair {
    PromotedPair {
        token_x: USDC,
        token_y: SOL,
        x_decimal: 6,
        y_decimal: 9,
        feed_x_id: "0xAA".to_string(),
        feed_y_id: "0xBB".to_string(),
        start_signature: None,
        fee_tier_accounts: vec![FEE_TIER],
    }
}

fn feed(id: &str, price: i64, conf: u64) -> PriceFeed {
    PriceFeed {
        id: id.to_string(),
        price,
        conf,
        expo: -8,
        publish_time: 1_000,
    }
}

fn swap(swapper: Address, x_to_y: bool, fee: u64) -> ProtocolEvent {
    ProtocolEvent::Swap(SwapEvent {
        swapper,
        token_x: USDC,
        token_y: SOL,
        x_to_y,
        fee,
    })
}

#[tokio::test]
async fn test_swaps_priced_with_blacklist_and_fallback() {
    let (repo, _temp) = setup_repo().await;
    let mut config = test_config(vec![], vec![pair()]);
    config.swap_blacklist.insert(BOT);

    let chain = Arc::new(
        MockChainReader::new(PROGRAM)
            .with_transaction(
                FEE_TIER,
                "swap-1",
                // 2 USDC fee at $1; the bot's swap earns nothing
                vec![swap(TRADER, true, 2_000_000), swap(BOT, true, 5_000_000)],
            )
            // 1 SOL fee at $150
            .with_transaction(FEE_TIER, "swap-2", vec![swap(TRADER, false, 1_000_000_000)]),
    );
    let prices = Arc::new(
        MockPriceSource::new()
            .with_feed(feed("aa", 100_000_000, 0))
            .with_feed(feed("bb", 15_000_000_000, 1_000_000)),
    );
    let orch = Orchestrator::new(chain.clone(), prices.clone(), repo.clone(), config);

    let report = orch.run_cycle(1_000).await.expect("cycle 1 failed");
    assert_eq!(report.swap_signatures, 2);
    assert_eq!(report.swap_events, 3);

    let state = repo.load_state().await.unwrap();
    let entry = state.swap_points.get(&TRADER).unwrap();
    assert_eq!(entry.total_points, 2_000 + 150_000);
    assert_eq!(entry.amount, 2);
    assert!(state.swap_points.get(&BOT).is_none());
    assert_eq!(state.checkpoints.get(&FEE_TIER), Some(&Signature::new("swap-2")));
    assert_eq!(state.price_feeds.len(), 2);

    // Price source down: the stored feeds price the next swap.
    prices.set_failing(true);
    chain.add_transaction(FEE_TIER, "swap-3", vec![swap(TRADER, true, 1_000_000)]);
    orch.run_cycle(2_000).await.expect("cycle 2 failed");

    let entry = repo.load_state().await.unwrap().swap_points.get(&TRADER).cloned().unwrap();
    assert_eq!(entry.total_points, 153_000);
    assert_eq!(entry.amount, 3);
    assert_eq!(entry.history.len(), 2);
    assert_eq!(entry.history[1].diff, 1_000);
}

#[tokio::test]
async fn test_wide_confidence_keeps_previous_feed() {
    let (repo, _temp) = setup_repo().await;
    let chain = Arc::new(
        MockChainReader::new(PROGRAM)
            .with_transaction(FEE_TIER, "swap-1", vec![swap(TRADER, true, 1_000_000)]),
    );
    let prices = Arc::new(
        MockPriceSource::new()
            .with_feed(feed("aa", 100_000_000, 0))
            .with_feed(feed("bb", 15_000_000_000, 0)),
    );
    let orch = Orchestrator::new(
        chain.clone(),
        prices.clone(),
        repo.clone(),
        test_config(vec![], vec![pair()]),
    );
    orch.run_cycle(1_000).await.unwrap();

    // $2 with a 10% interval is rejected
    prices.set_feeds(vec![
        feed("aa", 200_000_000, 20_000_000),
        feed("bb", 15_000_000_000, 0),
    ]);
    chain.add_transaction(FEE_TIER, "swap-2", vec![swap(TRADER, true, 1_000_000)]);
    orch.run_cycle(1_100).await.unwrap();

    let state = repo.load_state().await.unwrap();
    assert_eq!(state.swap_points.get(&TRADER).unwrap().total_points, 2_000);
    assert_eq!(state.price_feeds["aa"].price, 100_000_000);
}

#[tokio::test]
async fn test_swap_without_any_feed_aborts() {
    let (repo, _temp) = setup_repo().await;
    let chain = Arc::new(
        MockChainReader::new(PROGRAM)
            .with_transaction(FEE_TIER, "swap-1", vec![swap(TRADER, true, 1_000_000)]),
    );
    let prices = Arc::new(MockPriceSource::new());
    let orch = Orchestrator::new(chain, prices, repo.clone(), test_config(vec![], vec![pair()]));

    let result = orch.run_cycle(1_000).await;
    assert!(matches!(result, Err(CycleError::Integrity(_))));
    assert!(repo.load_state().await.unwrap().checkpoints.is_empty());
}

#[tokio::test]
async fn test_pair_start_signature_bounds_first_walk() {
    let (repo, _temp) = setup_repo().await;
    let mut pair = pair();
    pair.start_signature = Some(Signature::new("swap-1"));

    let chain = Arc::new(
        MockChainReader::new(PROGRAM)
            .with_transaction(FEE_TIER, "swap-1", vec![swap(TRADER, true, 9_000_000)])
            .with_transaction(FEE_TIER, "swap-2", vec![swap(TRADER, true, 1_000_000)]),
    );
    let prices = Arc::new(MockPriceSource::new().with_feed(feed("aa", 100_000_000, 0)));
    let orch = Orchestrator::new(chain, prices, repo.clone(), test_config(vec![], vec![pair]));

    let report = orch.run_cycle(1_000).await.unwrap();
    assert_eq!(report.swap_signatures, 1);
    let state = repo.load_state().await.unwrap();
    assert_eq!(state.swap_points.get(&TRADER).unwrap().total_points, 1_000);
}

#[tokio::test]
async fn test_total_beyond_stored_width_aborts_with_codec_error() {
    let (repo, _temp) = setup_repo().await;
    let mut config = test_config(vec![], vec![pair()]);
    // 1 USDC at $1 earns exactly `points_per_usd`, one past the 8-byte swap total.
    config.points_per_usd = u128::from(u64::MAX) + 1;

    let chain = Arc::new(
        MockChainReader::new(PROGRAM)
            .with_transaction(FEE_TIER, "swap-1", vec![swap(TRADER, true, 1_000_000)]),
    );
    let prices = Arc::new(MockPriceSource::new().with_feed(feed("aa", 100_000_000, 0)));
    let orch = Orchestrator::new(chain, prices, repo.clone(), config);

    let result = orch.run_cycle(1_000).await;
    assert!(matches!(result, Err(CycleError::Codec(_))));
    assert!(repo.load_state().await.unwrap().checkpoints.is_empty());
    assert_eq!(repo.cycle_count().await.unwrap(), 0);
}
