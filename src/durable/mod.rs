pub mod memory_store;
pub mod sqlite_store;

pub use memory_store::InMemoryDurableStore;
pub use sqlite_store::SqliteDurableStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::AggregateRecord;

/// Append-only repository of aggregate records. `None` results
/// mean "no matching row" — a normal outcome distinguished from an I/O
/// error, which surfaces as `Err`.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn insert(&self, record: AggregateRecord) -> Result<()>;

    async fn latest_by_symbol(&self, symbol: &str) -> Result<Option<AggregateRecord>>;
    async fn latest_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<AggregateRecord>>;

    async fn highest_by_symbol(&self, symbol: &str) -> Result<Option<AggregateRecord>>;
    async fn lowest_by_symbol(&self, symbol: &str) -> Result<Option<AggregateRecord>>;

    async fn highest_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<AggregateRecord>>;
    async fn lowest_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<AggregateRecord>>;

    async fn highest_since(&self, symbol: &str, since: DateTime<Utc>) -> Result<Option<AggregateRecord>>;
    async fn lowest_since(&self, symbol: &str, since: DateTime<Utc>) -> Result<Option<AggregateRecord>>;

    async fn highest_since_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AggregateRecord>>;
    async fn lowest_since_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AggregateRecord>>;

    async fn avg_by_symbol(&self, symbol: &str) -> Result<Option<f64>>;
    async fn avg_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<f64>>;
    async fn avg_since_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>>;

    async fn health_check(&self) -> bool;
}
