use std::collections::BTreeMap;

use dashmap::DashMap;
use tokio::sync::RwLock;

/// Key identifying one rolling window: `(symbol, exchange)`.
pub type WindowKey = (String, String);

/// In-memory time-indexed rolling window store.
///
/// Keyed by `(symbol, exchange)`; each key owns a `BTreeMap` from
/// ingest-second to the prices ingested in that second (bursts within one
/// second are kept as a list, per spec — no deduplication). The per-key
/// `RwLock` makes `add`/`range_by_score`/`remove_by_score_range` atomic with
/// respect to concurrent readers and writers on the same key; there is no
/// coordination across keys.
#[derive(Default)]
pub struct HotStore {
    windows: DashMap<WindowKey, RwLock<BTreeMap<i64, Vec<f64>>>>,
}

impl HotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one `(timestamp, price)` observation for `key`.
    pub async fn add(&self, key: WindowKey, timestamp_s: i64, price: f64) {
        let entry = self.windows.entry(key).or_default();
        let mut window = entry.write().await;
        window.entry(timestamp_s).or_default().push(price);
    }

    /// All prices with timestamp in the closed range `[min_s, max_s]`.
    pub async fn range_by_score(&self, key: &WindowKey, min_s: i64, max_s: i64) -> Vec<f64> {
        let Some(entry) = self.windows.get(key) else {
            return Vec::new();
        };
        let window = entry.read().await;
        window
            .range(min_s..=max_s)
            .flat_map(|(_, prices)| prices.iter().copied())
            .collect()
    }

    /// Remove all entries with timestamp in the closed range `[min_s, max_s]`.
    pub async fn remove_by_score_range(&self, key: &WindowKey, min_s: i64, max_s: i64) {
        let Some(entry) = self.windows.get(key) else {
            return;
        };
        let mut window = entry.write().await;
        let to_drop: Vec<i64> = window.range(min_s..=max_s).map(|(&ts, _)| ts).collect();
        for ts in to_drop {
            window.remove(&ts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(symbol: &str, exchange: &str) -> WindowKey {
        (symbol.to_string(), exchange.to_string())
    }

    #[tokio::test]
    async fn range_returns_only_entries_in_window() {
        let store = HotStore::new();
        let k = key("BTCUSDT", "Exchange1");
        store.add(k.clone(), 0, 100.0).await;
        store.add(k.clone(), 30, 110.0).await;
        store.add(k.clone(), 70, 120.0).await;

        // Read at T=65: window is [5, 65] — entry at t=70 must not appear.
        let prices = store.range_by_score(&k, 65 - 60, 65).await;
        assert_eq!(prices, vec![110.0]);
    }

    #[tokio::test]
    async fn burst_ticks_same_timestamp_all_retained() {
        let store = HotStore::new();
        let k = key("BTCUSDT", "EX1");
        store.add(k.clone(), 10, 10.0).await;
        store.add(k.clone(), 10, 20.0).await;
        store.add(k.clone(), 10, 30.0).await;

        let mut prices = store.range_by_score(&k, 0, 20).await;
        prices.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(prices, vec![10.0, 20.0, 30.0]);
    }

    #[tokio::test]
    async fn pruning_makes_old_entries_unreachable() {
        let store = HotStore::new();
        let k = key("BTCUSDT", "EX1");
        store.add(k.clone(), 0, 100.0).await;
        store.add(k.clone(), 65, 200.0).await;

        store.remove_by_score_range(&k, i64::MIN, 65 - 61).await;

        let prices = store.range_by_score(&k, i64::MIN, i64::MAX).await;
        assert_eq!(prices, vec![200.0]);
    }

    #[tokio::test]
    async fn unknown_key_returns_empty() {
        let store = HotStore::new();
        let k = key("UNKNOWN", "EX1");
        assert!(store.range_by_score(&k, 0, 1000).await.is_empty());
    }
}
