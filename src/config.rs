use crate::error::{AppError, Result};

/// Fixed symbol universe. Ticks for symbols outside this set are
/// dropped silently by the worker pool.
pub const SYMBOL_UNIVERSE: &[&str] = &["BTCUSDT", "ETHUSDT", "DOGEUSDT", "TONUSDT", "SOLUSDT"];

/// Virtual exchange names used by the TEST-mode synthetic generator.
pub const TEST_EXCHANGES: &[&str] = &["Exchange1", "Exchange2", "Exchange3"];

/// Window retention horizon (seconds) — entries older than this are pruned.
pub const PRUNE_HORIZON_SECS: i64 = 61;

/// Aggregation range (seconds) scanned by each aggregator tick.
pub const AGGREGATION_RANGE_SECS: i64 = 60;

/// Aggregator tick interval.
pub const AGGREGATOR_INTERVAL_SECS: u64 = 60;

/// TCP source reconnect backoff.
pub const RECONNECT_BACKOFF_SECS: u64 = 2;

/// Synthetic generator tick interval.
pub const GENERATOR_INTERVAL_SECS: u64 = 1;

/// Bounded ingress channel capacity.
pub const INGRESS_CHANNEL_CAPACITY: usize = 1000;

/// Default worker pool size.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Graceful HTTP shutdown budget.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// One configured LIVE TCP feed: an exchange name paired with its `host:port`.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    pub exchange: String,
    pub addr: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    pub worker_count: usize,
    pub live_feeds: Vec<LiveFeed>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "marketflow.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            worker_count: std::env::var("WORKER_COUNT")
                .unwrap_or_else(|_| DEFAULT_WORKER_COUNT.to_string())
                .parse::<usize>()
                .map_err(|_| AppError::Config("WORKER_COUNT must be a positive integer".to_string()))?,
            live_feeds: parse_live_feeds(&std::env::var("LIVE_FEEDS").unwrap_or_default())?,
        })
    }
}

/// Parses `LIVE_FEEDS` as a comma-separated list of `exchange@host:port` entries.
/// Example: `Exchange1@127.0.0.1:9001,Exchange2@127.0.0.1:9002`.
fn parse_live_feeds(raw: &str) -> Result<Vec<LiveFeed>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (exchange, addr) = entry.split_once('@').ok_or_else(|| {
                AppError::Config(format!("LIVE_FEEDS entry '{entry}' must be 'exchange@host:port'"))
            })?;
            Ok(LiveFeed {
                exchange: exchange.to_string(),
                addr: addr.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_feeds() {
        let feeds = parse_live_feeds("Exchange1@127.0.0.1:9001,Exchange2@127.0.0.1:9002").unwrap();
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].exchange, "Exchange1");
        assert_eq!(feeds[0].addr, "127.0.0.1:9001");
        assert_eq!(feeds[1].exchange, "Exchange2");
    }

    #[test]
    fn empty_string_yields_no_feeds() {
        assert!(parse_live_feeds("").unwrap().is_empty());
    }

    #[test]
    fn missing_at_sign_is_an_error() {
        assert!(parse_live_feeds("Exchange1-127.0.0.1:9001").is_err());
    }
}
