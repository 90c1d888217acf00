use pointsnap::datasource::{ChainReader, PriceSource};
use pointsnap::{init_db, Config, HermesPriceSource, Orchestrator, Repository, RpcChainReader};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let reader: Arc<dyn ChainReader> =
        Arc::new(RpcChainReader::new(config.rpc_url.clone(), config.program_id));
    let prices: Arc<dyn PriceSource> = Arc::new(HermesPriceSource::new(config.hermes_url.clone()));

    tracing::info!(
        pools = config.promoted_pools.len(),
        pairs = config.promoted_pairs.len(),
        "Starting sync cycle"
    );

    let orchestrator = Orchestrator::new(reader, prices, repo, config);
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    if let Err(e) = orchestrator.run_cycle(now).await {
        eprintln!("Cycle failed: {}", e);
        std::process::exit(1);
    }
}
