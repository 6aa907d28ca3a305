use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{AGGREGATION_RANGE_SECS, AGGREGATOR_INTERVAL_SECS, SYMBOL_UNIVERSE};
use crate::durable::DurableStore;
use crate::hotstore::HotStore;
use crate::types::AggregateRecord;

/// Ticks once per `AGGREGATOR_INTERVAL_SECS`, scans every `(symbol, exchange)`
/// pair in its key universe, and turns each non-empty window snapshot into
/// one durable aggregate record. Never fails a tick: a persistence error for
/// one key is logged and the loop moves to the next key.
pub struct Aggregator {
    hot_store: Arc<HotStore>,
    durable: Arc<dyn DurableStore>,
    exchanges: Vec<String>,
}

impl Aggregator {
    pub fn new(hot_store: Arc<HotStore>, durable: Arc<dyn DurableStore>, exchanges: Vec<String>) -> Self {
        Self { hot_store, durable, exchanges }
    }

    /// Runs until `token` is cancelled. The first tick fires one full
    /// interval after this is called, not immediately — the initial
    /// `interval.tick()` is consumed before entering the loop.
    pub async fn run(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(AGGREGATOR_INTERVAL_SECS));
        interval.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("aggregator stopping");
                    return;
                }
                _ = interval.tick() => {
                    self.run_once().await;
                }
            }
        }
    }

    async fn run_once(&self) {
        let now_s = Utc::now().timestamp();
        let window_start = now_s - AGGREGATION_RANGE_SECS;

        for &symbol in SYMBOL_UNIVERSE {
            for exchange in &self.exchanges {
                let key = (symbol.to_string(), exchange.clone());
                let prices = self.hot_store.range_by_score(&key, window_start, now_s).await;
                if prices.is_empty() {
                    continue;
                }

                let record = summarize(symbol, exchange, &prices);
                if let Err(e) = self.durable.insert(record).await {
                    error!(symbol, exchange, "failed to persist aggregate: {e}");
                }
            }
        }
    }
}

fn summarize(symbol: &str, exchange: &str, prices: &[f64]) -> AggregateRecord {
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = prices.iter().sum::<f64>() / prices.len() as f64;

    AggregateRecord {
        pair: symbol.to_string(),
        exchange: exchange.to_string(),
        bucket_end: Utc::now(),
        avg,
        min,
        max,
    }
}
