use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::durable::DurableStore;
use crate::error::Result;
use crate::types::AggregateRecord;

/// In-memory stand-in for `SqliteDurableStore`, used by tests that exercise
/// the query and aggregation layers without a real database. Records are
/// kept in insertion order; queries do the same linear scan a small SQLite
/// table would, so a test asserting behavior here says something about the
/// SQL-backed store too.
#[derive(Default)]
pub struct InMemoryDurableStore {
    records: RwLock<Vec<AggregateRecord>>,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn insert(&self, record: AggregateRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn latest_by_symbol(&self, symbol: &str) -> Result<Option<AggregateRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.pair == symbol)
            .max_by_key(|r| r.bucket_end)
            .cloned())
    }

    async fn latest_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<AggregateRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.pair == symbol && r.exchange == exchange)
            .max_by_key(|r| r.bucket_end)
            .cloned())
    }

    async fn highest_by_symbol(&self, symbol: &str) -> Result<Option<AggregateRecord>> {
        Ok(max_by_avg(self.records.read().await.iter().filter(|r| r.pair == symbol)))
    }

    async fn lowest_by_symbol(&self, symbol: &str) -> Result<Option<AggregateRecord>> {
        Ok(min_by_avg(self.records.read().await.iter().filter(|r| r.pair == symbol)))
    }

    async fn highest_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<AggregateRecord>> {
        Ok(max_by_avg(
            self.records.read().await.iter().filter(|r| r.pair == symbol && r.exchange == exchange),
        ))
    }

    async fn lowest_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<AggregateRecord>> {
        Ok(min_by_avg(
            self.records.read().await.iter().filter(|r| r.pair == symbol && r.exchange == exchange),
        ))
    }

    async fn highest_since(&self, symbol: &str, since: DateTime<Utc>) -> Result<Option<AggregateRecord>> {
        Ok(max_by_avg(
            self.records.read().await.iter().filter(|r| r.pair == symbol && r.bucket_end >= since),
        ))
    }

    async fn lowest_since(&self, symbol: &str, since: DateTime<Utc>) -> Result<Option<AggregateRecord>> {
        Ok(min_by_avg(
            self.records.read().await.iter().filter(|r| r.pair == symbol && r.bucket_end >= since),
        ))
    }

    async fn highest_since_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AggregateRecord>> {
        Ok(max_by_avg(self.records.read().await.iter().filter(|r| {
            r.pair == symbol && r.exchange == exchange && r.bucket_end >= since
        })))
    }

    async fn lowest_since_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AggregateRecord>> {
        Ok(min_by_avg(self.records.read().await.iter().filter(|r| {
            r.pair == symbol && r.exchange == exchange && r.bucket_end >= since
        })))
    }

    async fn avg_by_symbol(&self, symbol: &str) -> Result<Option<f64>> {
        Ok(mean(self.records.read().await.iter().filter(|r| r.pair == symbol)))
    }

    async fn avg_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<f64>> {
        Ok(mean(
            self.records.read().await.iter().filter(|r| r.pair == symbol && r.exchange == exchange),
        ))
    }

    async fn avg_since_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        Ok(mean(self.records.read().await.iter().filter(|r| {
            r.pair == symbol && r.exchange == exchange && r.bucket_end >= since
        })))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn max_by_avg<'a>(iter: impl Iterator<Item = &'a AggregateRecord>) -> Option<AggregateRecord> {
    iter.max_by(|a, b| a.avg.total_cmp(&b.avg)).cloned()
}

fn min_by_avg<'a>(iter: impl Iterator<Item = &'a AggregateRecord>) -> Option<AggregateRecord> {
    iter.min_by(|a, b| a.avg.total_cmp(&b.avg)).cloned()
}

fn mean<'a>(iter: impl Iterator<Item = &'a AggregateRecord>) -> Option<f64> {
    let (sum, count) = iter.fold((0.0, 0usize), |(sum, count), r| (sum + r.avg, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pair: &str, exchange: &str, secs: i64, avg: f64) -> AggregateRecord {
        AggregateRecord {
            pair: pair.to_string(),
            exchange: exchange.to_string(),
            bucket_end: DateTime::from_timestamp(secs, 0).unwrap(),
            avg,
            min: avg - 1.0,
            max: avg + 1.0,
        }
    }

    #[tokio::test]
    async fn latest_by_symbol_picks_most_recent_bucket() {
        let store = InMemoryDurableStore::new();
        store.insert(record("BTCUSDT", "EX1", 10, 100.0)).await.unwrap();
        store.insert(record("BTCUSDT", "EX1", 70, 105.0)).await.unwrap();

        let latest = store.latest_by_symbol("BTCUSDT").await.unwrap().unwrap();
        assert_eq!(latest.avg, 105.0);
    }

    #[tokio::test]
    async fn highest_and_lowest_are_scoped_to_symbol() {
        let store = InMemoryDurableStore::new();
        store.insert(record("BTCUSDT", "EX1", 10, 100.0)).await.unwrap();
        store.insert(record("BTCUSDT", "EX1", 70, 200.0)).await.unwrap();
        store.insert(record("ETHUSDT", "EX1", 10, 9000.0)).await.unwrap();

        assert_eq!(store.highest_by_symbol("BTCUSDT").await.unwrap().unwrap().avg, 200.0);
        assert_eq!(store.lowest_by_symbol("BTCUSDT").await.unwrap().unwrap().avg, 100.0);
    }

    #[tokio::test]
    async fn avg_by_symbol_averages_across_exchanges() {
        let store = InMemoryDurableStore::new();
        store.insert(record("BTCUSDT", "EX1", 10, 100.0)).await.unwrap();
        store.insert(record("BTCUSDT", "EX2", 10, 200.0)).await.unwrap();

        assert_eq!(store.avg_by_symbol("BTCUSDT").await.unwrap().unwrap(), 150.0);
    }

    #[tokio::test]
    async fn no_matching_rows_yields_none() {
        let store = InMemoryDurableStore::new();
        assert!(store.latest_by_symbol("BTCUSDT").await.unwrap().is_none());
        assert!(store.avg_by_symbol("BTCUSDT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn since_filter_excludes_older_buckets() {
        let store = InMemoryDurableStore::new();
        store.insert(record("BTCUSDT", "EX1", 10, 100.0)).await.unwrap();
        store.insert(record("BTCUSDT", "EX1", 1000, 300.0)).await.unwrap();

        let since = DateTime::from_timestamp(500, 0).unwrap();
        let highest = store.highest_since("BTCUSDT", since).await.unwrap().unwrap();
        assert_eq!(highest.avg, 300.0);
    }
}
