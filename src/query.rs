use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::durable::DurableStore;
use crate::error::{AppError, Result};
use crate::types::AggregateResponse;

/// Normalizes path parameters and turns durable-store lookups into the
/// HTTP-facing `AggregateResponse`/error shape. Holds no state of its own
/// beyond the store handle — everything here is pure request shaping.
pub struct QueryService {
    store: Arc<dyn DurableStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    pub async fn latest(&self, symbol: &str) -> Result<AggregateResponse> {
        let symbol = normalize(symbol, "symbol")?;
        self.store
            .latest_by_symbol(&symbol)
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("no data found for symbol: {symbol}")))
    }

    pub async fn latest_by_exchange(&self, exchange: &str, symbol: &str) -> Result<AggregateResponse> {
        let symbol = normalize(symbol, "symbol")?;
        let exchange = normalize(exchange, "exchange")?;
        self.store
            .latest_by_exchange(&exchange, &symbol)
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("no data found for {exchange}/{symbol}")))
    }

    pub async fn highest(&self, symbol: &str, period: Option<&str>) -> Result<AggregateResponse> {
        let symbol = normalize(symbol, "symbol")?;
        let record = match period {
            Some(p) => self.store.highest_since(&symbol, since(p)?).await?,
            None => self.store.highest_by_symbol(&symbol).await?,
        };
        record
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("no data found for symbol: {symbol}")))
    }

    pub async fn highest_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        period: Option<&str>,
    ) -> Result<AggregateResponse> {
        let symbol = normalize(symbol, "symbol")?;
        let exchange = normalize(exchange, "exchange")?;
        let record = match period {
            Some(p) => self.store.highest_since_by_exchange(&exchange, &symbol, since(p)?).await?,
            None => self.store.highest_by_exchange(&exchange, &symbol).await?,
        };
        record
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("no data found for {exchange}/{symbol}")))
    }

    pub async fn lowest(&self, symbol: &str, period: Option<&str>) -> Result<AggregateResponse> {
        let symbol = normalize(symbol, "symbol")?;
        let record = match period {
            Some(p) => self.store.lowest_since(&symbol, since(p)?).await?,
            None => self.store.lowest_by_symbol(&symbol).await?,
        };
        record
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("no data found for symbol: {symbol}")))
    }

    pub async fn lowest_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        period: Option<&str>,
    ) -> Result<AggregateResponse> {
        let symbol = normalize(symbol, "symbol")?;
        let exchange = normalize(exchange, "exchange")?;
        let record = match period {
            Some(p) => self.store.lowest_since_by_exchange(&exchange, &symbol, since(p)?).await?,
            None => self.store.lowest_by_exchange(&exchange, &symbol).await?,
        };
        record
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("no data found for {exchange}/{symbol}")))
    }

    pub async fn average(&self, symbol: &str) -> Result<f64> {
        let symbol = normalize(symbol, "symbol")?;
        self.store
            .avg_by_symbol(&symbol)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no data found for symbol: {symbol}")))
    }

    pub async fn average_by_exchange(&self, exchange: &str, symbol: &str, period: Option<&str>) -> Result<f64> {
        let symbol = normalize(symbol, "symbol")?;
        let exchange = normalize(exchange, "exchange")?;
        let avg = match period {
            Some(p) => self.store.avg_since_by_exchange(&exchange, &symbol, since(p)?).await?,
            None => self.store.avg_by_exchange(&exchange, &symbol).await?,
        };
        avg.ok_or_else(|| AppError::NotFound(format!("no data found for {exchange}/{symbol}")))
    }
}

fn normalize(raw: &str, field: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidArgument(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_ascii_uppercase())
}

fn since(period: &str) -> Result<chrono::DateTime<Utc>> {
    let d = parse_duration(period)?;
    Ok(Utc::now() - chrono::Duration::from_std(d).map_err(|_| {
        AppError::InvalidArgument(format!("period '{period}' out of range"))
    })?)
}

/// Parses durations of the form `<number><unit>` where unit is one of
/// `ns|us|ms|s|m|h` — the subset of Go's `time.ParseDuration` this service
/// needs, hand-rolled because neither `humantime` nor `time`'s own parser
/// accepts this exact unit set with no compound suffixes.
fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let invalid = || AppError::InvalidArgument(format!("invalid period: {raw}"));

    let split_at = raw.find(|c: char| !c.is_ascii_digit() && c != '.').ok_or_else(invalid)?;
    let (number, unit) = raw.split_at(split_at);
    let value: f64 = number.parse().map_err(|_| invalid())?;
    if value < 0.0 {
        return Err(invalid());
    }

    let nanos_per_unit: f64 = match unit {
        "ns" => 1.0,
        "us" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        "m" => 60.0 * 1_000_000_000.0,
        "h" => 3_600.0 * 1_000_000_000.0,
        _ => return Err(invalid()),
    };

    Ok(Duration::from_nanos((value * nanos_per_unit) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::InMemoryDurableStore;
    use crate::types::AggregateRecord;

    fn record(pair: &str, exchange: &str, secs: i64, avg: f64) -> AggregateRecord {
        AggregateRecord {
            pair: pair.to_string(),
            exchange: exchange.to_string(),
            bucket_end: chrono::DateTime::from_timestamp(secs, 0).unwrap(),
            avg,
            min: avg - 1.0,
            max: avg + 1.0,
        }
    }

    #[test]
    fn parses_seconds_minutes_hours() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("not-a-duration").is_err());
    }

    #[tokio::test]
    async fn blank_symbol_is_rejected() {
        let store: Arc<dyn DurableStore> = Arc::new(InMemoryDurableStore::new());
        let service = QueryService::new(store);
        let err = service.latest("   ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let store: Arc<dyn DurableStore> = Arc::new(InMemoryDurableStore::new());
        let service = QueryService::new(store);
        let err = service.latest("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn symbol_is_uppercased_before_lookup() {
        let store = Arc::new(InMemoryDurableStore::new());
        store.insert(record("BTCUSDT", "EX1", 10, 100.0)).await.unwrap();
        let service = QueryService::new(store as Arc<dyn DurableStore>);
        let resp = service.latest("btcusdt").await.unwrap();
        assert_eq!(resp.pair, "BTCUSDT");
    }

    #[tokio::test]
    async fn highest_without_period_scans_all_history() {
        let store = Arc::new(InMemoryDurableStore::new());
        store.insert(record("BTCUSDT", "EX1", 10, 10.0)).await.unwrap();
        store.insert(record("BTCUSDT", "EX1", 20, 30.0)).await.unwrap();
        let service = QueryService::new(store as Arc<dyn DurableStore>);
        let resp = service.highest("BTCUSDT", None).await.unwrap();
        assert_eq!(resp.avg, 30.0);
    }

    #[tokio::test]
    async fn average_by_exchange_rejects_blank_exchange() {
        let store: Arc<dyn DurableStore> = Arc::new(InMemoryDurableStore::new());
        let service = QueryService::new(store);
        let err = service.average_by_exchange("", "BTCUSDT", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
}
