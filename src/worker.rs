use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::config::{PRUNE_HORIZON_SECS, SYMBOL_UNIVERSE};
use crate::hotstore::HotStore;
use crate::types::Tick;

/// Fixed-size pool of consumer tasks that drain the ingress channel into the
/// hot store. Since a `tokio::sync::mpsc::Receiver` cannot be
/// cloned, all workers share one receiver behind an async mutex — the
/// standard fan-out-over-one-receiver idiom; ticks are still distributed
/// across workers because each worker only holds the lock for the instant
/// it takes to pull the next tick.
pub struct WorkerPool {
    store: Arc<HotStore>,
    symbol_universe: HashSet<&'static str>,
}

impl WorkerPool {
    pub fn new(store: Arc<HotStore>) -> Self {
        Self {
            store,
            symbol_universe: SYMBOL_UNIVERSE.iter().copied().collect(),
        }
    }

    /// Spawns `worker_count` tasks draining `rx`. Returns once all workers
    /// are spawned; they run until the channel is closed and drained.
    pub fn spawn(self: Arc<Self>, worker_count: usize, rx: mpsc::Receiver<Tick>) {
        let rx = Arc::new(Mutex::new(rx));
        for id in 0..worker_count {
            let pool = Arc::clone(&self);
            let rx = Arc::clone(&rx);
            tokio::spawn(async move { pool.run(id, rx).await });
        }
    }

    async fn run(&self, id: usize, rx: Arc<Mutex<mpsc::Receiver<Tick>>>) {
        loop {
            let tick = {
                let mut rx = rx.lock().await;
                rx.recv().await
            };
            let Some(tick) = tick else {
                break;
            };
            self.handle_tick(tick);
        }
        tracing::debug!(worker_id = id, "worker exiting, channel closed");
    }

    fn handle_tick(&self, tick: Tick) {
        if !self.symbol_universe.contains(tick.symbol.as_str()) {
            return;
        }

        let now_s = now_unix_secs();
        let key = (tick.symbol, tick.exchange);
        let store = Arc::clone(&self.store);
        let key_for_prune = key.clone();

        // Hot-store ops are async (per-key RwLock); spawn so a slow insert
        // on one key never blocks this worker from pulling its next tick.
        tokio::spawn(async move {
            store.add(key, now_s, tick.price).await;
            store
                .remove_by_score_range(&key_for_prune, i64::MIN, now_s - PRUNE_HORIZON_SECS)
                .await;
        });
    }
}

fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn symbols_outside_universe_are_dropped() {
        let store = Arc::new(HotStore::new());
        let pool = Arc::new(WorkerPool::new(Arc::clone(&store)));
        let (tx, rx) = mpsc::channel(16);
        Arc::clone(&pool).spawn(1, rx);

        tx.send(Tick {
            symbol: "NOTREAL".to_string(),
            exchange: "EX1".to_string(),
            price: 42.0,
            event_time: 0,
        })
        .await
        .unwrap();
        drop(tx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let key = ("NOTREAL".to_string(), "EX1".to_string());
        assert!(store.range_by_score(&key, i64::MIN, i64::MAX).await.is_empty());
    }

    #[tokio::test]
    async fn ticks_land_in_the_hot_store() {
        let store = Arc::new(HotStore::new());
        let pool = Arc::new(WorkerPool::new(Arc::clone(&store)));
        let (tx, rx) = mpsc::channel(16);
        Arc::clone(&pool).spawn(2, rx);

        tx.send(Tick {
            symbol: "BTCUSDT".to_string(),
            exchange: "EX1".to_string(),
            price: 100.0,
            event_time: 0,
        })
        .await
        .unwrap();
        drop(tx);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let key = ("BTCUSDT".to_string(), "EX1".to_string());
        let prices = store.range_by_score(&key, i64::MIN, i64::MAX).await;
        assert_eq!(prices, vec![100.0]);
    }
}
