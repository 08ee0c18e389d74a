//! Financial History Store
//!
//! SQLite persistence for per-ticker financial periods and archived metric
//! snapshots. Both tables are append-only: a period or snapshot that already
//! exists is never overwritten.

use analysis_core::{AnalysisError, FinancialPeriod, HistoricalSeries, HistoryReader, MetricRecord, PeriodType};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Internal DB row type with string dates
#[derive(Debug, FromRow)]
struct PeriodRow {
    period_end_date: String,
    period_type: String,
    revenue: Option<f64>,
    net_income: Option<f64>,
}

impl PeriodRow {
    fn into_period(self) -> Option<FinancialPeriod> {
        let period_end = NaiveDate::parse_from_str(&self.period_end_date, DATE_FORMAT).ok()?;
        let period_type = PeriodType::parse(&self.period_type)?;
        Some(FinancialPeriod {
            period_end,
            period_type,
            revenue: self.revenue,
            net_income: self.net_income,
        })
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    fetched_at: String,
    data: String,
}

/// Fixed-width UTC timestamps so that text order is time order.
fn timestamp_key(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    /// Opens (creating if missing) the database at `database_url`.
    /// An in-memory database is limited to one connection, since every
    /// SQLite connection would otherwise see its own empty database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::new(pool).await
    }

    /// Wraps an existing pool, creating the tables if needed.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");

        // sqlx runs one statement per query
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    /// Stores every period of `series`. Periods already stored for the same
    /// (ticker, period end, type) are left untouched. Returns the number of
    /// new rows.
    pub async fn append_series(&self, series: &HistoricalSeries) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for period in series.periods() {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO financial_history (
                    ticker, period_end_date, period_type, revenue, net_income
                )
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(series.ticker())
            .bind(period.period_end.format(DATE_FORMAT).to_string())
            .bind(period.period_type.as_str())
            .bind(period.revenue)
            .bind(period.net_income)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!("{}: stored {} new periods of {}", series.ticker(), inserted, series.len());
        Ok(inserted)
    }

    /// Full stored history for `ticker`, oldest first. Empty when unknown.
    pub async fn load_series(&self, ticker: &str) -> Result<HistoricalSeries> {
        let rows: Vec<PeriodRow> = sqlx::query_as(
            r#"
            SELECT period_end_date, period_type, revenue, net_income
            FROM financial_history
            WHERE ticker = ?
            ORDER BY period_end_date ASC
            "#,
        )
        .bind(ticker)
        .fetch_all(&self.pool)
        .await?;

        let mut series = HistoricalSeries::new(ticker);
        for row in rows {
            let raw_date = row.period_end_date.clone();
            match row.into_period() {
                Some(period) => {
                    series.insert(period);
                }
                None => warn!("{}: skipping unreadable stored period {}", ticker, raw_date),
            }
        }
        Ok(series)
    }

    /// Archives `record` as an immutable snapshot keyed by (ticker, fetched_at).
    /// Returns `false` when that snapshot already exists.
    pub async fn archive_snapshot(&self, record: &MetricRecord) -> Result<bool> {
        let data = serde_json::to_string(record)?;
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO metric_snapshots (ticker, fetched_at, data)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&record.ticker)
        .bind(timestamp_key(record.fetched_at))
        .bind(&data)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Archived snapshots for `ticker`, newest first.
    pub async fn snapshots(&self, ticker: &str, limit: Option<i64>) -> Result<Vec<MetricRecord>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT fetched_at, data
            FROM metric_snapshots
            WHERE ticker = ?
            ORDER BY fetched_at DESC
            LIMIT ?
            "#,
        )
        .bind(ticker)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<MetricRecord>(&row.data) {
                Ok(record) => records.push(record),
                Err(e) => warn!("{}: skipping unreadable snapshot at {}: {}", ticker, row.fetched_at, e),
            }
        }
        Ok(records)
    }

    pub async fn latest_snapshot(&self, ticker: &str) -> Result<Option<MetricRecord>> {
        Ok(self.snapshots(ticker, Some(1)).await?.into_iter().next())
    }

    /// Tickers with any stored data, alphabetically.
    pub async fn tickers(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT ticker FROM financial_history
            UNION
            SELECT ticker FROM metric_snapshots
            ORDER BY ticker
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(t,)| t).collect())
    }
}

fn database_error(e: anyhow::Error) -> AnalysisError {
    AnalysisError::Database(e.to_string())
}

#[async_trait]
impl HistoryReader for HistoryStore {
    async fn load_series(&self, ticker: &str) -> Result<HistoricalSeries, AnalysisError> {
        HistoryStore::load_series(self, ticker).await.map_err(database_error)
    }

    async fn latest_snapshot(&self, ticker: &str) -> Result<Option<MetricRecord>, AnalysisError> {
        HistoryStore::latest_snapshot(self, ticker).await.map_err(database_error)
    }
}
