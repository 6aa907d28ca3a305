use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row, SqlitePool};
use tracing::{error, info};

use crate::durable::DurableStore;
use crate::error::Result;
use crate::types::AggregateRecord;

/// SQLite-backed durable store. Deliberately uses runtime-checked
/// `sqlx::query`/`sqlx::query_as` rather than the `query!` family — those
/// require a live database (or a checked-in `.sqlx` query cache) at compile
/// time, which this crate cannot assume. See DESIGN.md.
pub struct SqliteDurableStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct AggregateRow {
    pair_name: String,
    exchange: String,
    timestamp: DateTime<Utc>,
    average_price: f64,
    min_price: f64,
    max_price: f64,
}

impl From<AggregateRow> for AggregateRecord {
    fn from(r: AggregateRow) -> Self {
        AggregateRecord {
            pair: r.pair_name,
            exchange: r.exchange,
            bucket_end: r.timestamp,
            avg: r.average_price,
            min: r.min_price,
            max: r.max_price,
        }
    }
}

impl SqliteDurableStore {
    pub async fn connect(db_path: &str) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{db_path}?mode=rwc")).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(db_path, "durable store ready");
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl DurableStore for SqliteDurableStore {
    async fn insert(&self, record: AggregateRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO aggregated_prices (pair_name, exchange, timestamp, average_price, min_price, max_price)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.pair)
        .bind(&record.exchange)
        .bind(record.bucket_end)
        .bind(record.avg)
        .bind(record.min)
        .bind(record.max)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_by_symbol(&self, symbol: &str) -> Result<Option<AggregateRecord>> {
        fetch_one(
            &self.pool,
            "SELECT pair_name, exchange, timestamp, average_price, min_price, max_price
             FROM aggregated_prices WHERE pair_name = ? ORDER BY timestamp DESC LIMIT 1",
            &[Bind::Text(symbol)],
        )
        .await
    }

    async fn latest_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<AggregateRecord>> {
        fetch_one(
            &self.pool,
            "SELECT pair_name, exchange, timestamp, average_price, min_price, max_price
             FROM aggregated_prices WHERE pair_name = ? AND exchange = ? ORDER BY timestamp DESC LIMIT 1",
            &[Bind::Text(symbol), Bind::Text(exchange)],
        )
        .await
    }

    async fn highest_by_symbol(&self, symbol: &str) -> Result<Option<AggregateRecord>> {
        fetch_one(
            &self.pool,
            "SELECT pair_name, exchange, timestamp, average_price, min_price, max_price
             FROM aggregated_prices WHERE pair_name = ? ORDER BY average_price DESC LIMIT 1",
            &[Bind::Text(symbol)],
        )
        .await
    }

    async fn lowest_by_symbol(&self, symbol: &str) -> Result<Option<AggregateRecord>> {
        fetch_one(
            &self.pool,
            "SELECT pair_name, exchange, timestamp, average_price, min_price, max_price
             FROM aggregated_prices WHERE pair_name = ? ORDER BY average_price ASC LIMIT 1",
            &[Bind::Text(symbol)],
        )
        .await
    }

    async fn highest_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<AggregateRecord>> {
        fetch_one(
            &self.pool,
            "SELECT pair_name, exchange, timestamp, average_price, min_price, max_price
             FROM aggregated_prices WHERE pair_name = ? AND exchange = ? ORDER BY average_price DESC LIMIT 1",
            &[Bind::Text(symbol), Bind::Text(exchange)],
        )
        .await
    }

    async fn lowest_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<AggregateRecord>> {
        fetch_one(
            &self.pool,
            "SELECT pair_name, exchange, timestamp, average_price, min_price, max_price
             FROM aggregated_prices WHERE pair_name = ? AND exchange = ? ORDER BY average_price ASC LIMIT 1",
            &[Bind::Text(symbol), Bind::Text(exchange)],
        )
        .await
    }

    async fn highest_since(&self, symbol: &str, since: DateTime<Utc>) -> Result<Option<AggregateRecord>> {
        fetch_one(
            &self.pool,
            "SELECT pair_name, exchange, timestamp, average_price, min_price, max_price
             FROM aggregated_prices WHERE pair_name = ? AND timestamp >= ? ORDER BY average_price DESC LIMIT 1",
            &[Bind::Text(symbol), Bind::Time(since)],
        )
        .await
    }

    async fn lowest_since(&self, symbol: &str, since: DateTime<Utc>) -> Result<Option<AggregateRecord>> {
        fetch_one(
            &self.pool,
            "SELECT pair_name, exchange, timestamp, average_price, min_price, max_price
             FROM aggregated_prices WHERE pair_name = ? AND timestamp >= ? ORDER BY average_price ASC LIMIT 1",
            &[Bind::Text(symbol), Bind::Time(since)],
        )
        .await
    }

    async fn highest_since_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AggregateRecord>> {
        fetch_one(
            &self.pool,
            "SELECT pair_name, exchange, timestamp, average_price, min_price, max_price
             FROM aggregated_prices WHERE pair_name = ? AND exchange = ? AND timestamp >= ?
             ORDER BY average_price DESC LIMIT 1",
            &[Bind::Text(symbol), Bind::Text(exchange), Bind::Time(since)],
        )
        .await
    }

    async fn lowest_since_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AggregateRecord>> {
        fetch_one(
            &self.pool,
            "SELECT pair_name, exchange, timestamp, average_price, min_price, max_price
             FROM aggregated_prices WHERE pair_name = ? AND exchange = ? AND timestamp >= ?
             ORDER BY average_price ASC LIMIT 1",
            &[Bind::Text(symbol), Bind::Text(exchange), Bind::Time(since)],
        )
        .await
    }

    async fn avg_by_symbol(&self, symbol: &str) -> Result<Option<f64>> {
        fetch_avg(
            &self.pool,
            "SELECT AVG(average_price) as avg FROM aggregated_prices WHERE pair_name = ?",
            &[Bind::Text(symbol)],
        )
        .await
    }

    async fn avg_by_exchange(&self, exchange: &str, symbol: &str) -> Result<Option<f64>> {
        fetch_avg(
            &self.pool,
            "SELECT AVG(average_price) as avg FROM aggregated_prices WHERE pair_name = ? AND exchange = ?",
            &[Bind::Text(symbol), Bind::Text(exchange)],
        )
        .await
    }

    async fn avg_since_by_exchange(
        &self,
        exchange: &str,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        fetch_avg(
            &self.pool,
            "SELECT AVG(average_price) as avg FROM aggregated_prices
             WHERE pair_name = ? AND exchange = ? AND timestamp >= ?",
            &[Bind::Text(symbol), Bind::Text(exchange), Bind::Time(since)],
        )
        .await
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// A query parameter to bind, abstracted so the fetch helpers below can take
/// a uniform slice regardless of the underlying scalar type.
enum Bind<'a> {
    Text(&'a str),
    Time(DateTime<Utc>),
}

async fn fetch_one(
    pool: &SqlitePool,
    sql: &str,
    binds: &[Bind<'_>],
) -> Result<Option<AggregateRecord>> {
    let mut query = sqlx::query_as::<_, AggregateRow>(sql);
    for b in binds {
        query = match b {
            Bind::Text(s) => query.bind(*s),
            Bind::Time(t) => query.bind(*t),
        };
    }
    match query.fetch_optional(pool).await {
        Ok(row) => Ok(row.map(AggregateRecord::from)),
        Err(e) => {
            error!("durable store query failed: {e}");
            Err(e.into())
        }
    }
}

async fn fetch_avg(pool: &SqlitePool, sql: &str, binds: &[Bind<'_>]) -> Result<Option<f64>> {
    let mut query = sqlx::query(sql);
    for b in binds {
        query = match b {
            Bind::Text(s) => query.bind(*s),
            Bind::Time(t) => query.bind(*t),
        };
    }
    let row = query.fetch_one(pool).await?;
    let avg: Option<f64> = row.try_get("avg")?;
    Ok(avg)
}
