use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tick — transient, produced by a source, consumed by a worker.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub exchange: String,
    pub price: f64,
    /// Source-supplied event time (seconds since epoch). Never used for
    /// window keying — the worker's ingest-time clock is authoritative.
    pub event_time: i64,
}

/// Wire shape of one line on the newline-delimited JSON TCP feed:
/// `{"symbol":"BTCUSDT","price":64250.12,"timestamp":1700000000}`.
/// The exchange name is not on the wire — it is supplied by the adapter
/// that owns the connection.
#[derive(Debug, Deserialize)]
pub struct RawTickLine {
    pub symbol: String,
    pub price: f64,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Ingestion mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    Test,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Live => write!(f, "live"),
            Mode::Test => write!(f, "test"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "test" => Ok(Mode::Test),
            other => Err(crate::error::AppError::InvalidMode(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate record — durable, written once per aggregation tick per
// (pair, exchange) when the corresponding window is non-empty.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AggregateRecord {
    pub pair: String,
    pub exchange: String,
    pub bucket_end: chrono::DateTime<chrono::Utc>,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// HTTP response envelope for price queries.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResponse {
    pub pair: String,
    pub exchange: String,
    pub timestamp: String,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl From<AggregateRecord> for AggregateResponse {
    fn from(r: AggregateRecord) -> Self {
        Self {
            pair: r.pair,
            exchange: r.exchange,
            timestamp: r.bucket_end.to_rfc3339(),
            avg: r.avg,
            min: r.min,
            max: r.max,
        }
    }
}
