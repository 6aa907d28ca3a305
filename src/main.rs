mod aggregator;
mod api;
mod config;
mod durable;
mod error;
mod hotstore;
mod mode;
mod query;
mod source;
mod types;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::aggregator::Aggregator;
use crate::api::health::HealthState;
use crate::api::{router, ApiState};
use crate::config::{Config, INGRESS_CHANNEL_CAPACITY, SHUTDOWN_TIMEOUT_SECS};
use crate::durable::{DurableStore, SqliteDurableStore};
use crate::error::Result;
use crate::hotstore::HotStore;
use crate::mode::ModeManager;
use crate::query::QueryService;
use crate::worker::WorkerPool;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let durable: Arc<dyn DurableStore> = Arc::new(SqliteDurableStore::connect(&cfg.db_path).await?);

    let hot_store = Arc::new(HotStore::new());

    let (tick_tx, tick_rx) = mpsc::channel(INGRESS_CHANNEL_CAPACITY);

    let worker_pool = Arc::new(WorkerPool::new(Arc::clone(&hot_store)));
    worker_pool.spawn(cfg.worker_count, tick_rx);
    info!(workers = cfg.worker_count, "worker pool started");

    let mode_manager = Arc::new(ModeManager::start(cfg.live_feeds.clone(), tick_tx).await?);
    info!("ingestion started in LIVE mode");

    let mut exchanges: Vec<String> = cfg.live_feeds.iter().map(|f| f.exchange.clone()).collect();
    exchanges.extend(crate::config::TEST_EXCHANGES.iter().map(|s| s.to_string()));
    exchanges.sort();
    exchanges.dedup();

    let aggregator_token = CancellationToken::new();
    let aggregator = Aggregator::new(Arc::clone(&hot_store), Arc::clone(&durable), exchanges);
    let aggregator_task = {
        let token = aggregator_token.clone();
        tokio::spawn(async move { aggregator.run(token).await })
    };

    let query = Arc::new(QueryService::new(Arc::clone(&durable)));
    let health = HealthState { durable: Arc::clone(&durable) };
    let api_state = ApiState { query, mode_manager: Arc::clone(&mode_manager), health };
    let app = router(api_state);

    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    aggregator_token.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), aggregator_task).await;
    mode_manager.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
