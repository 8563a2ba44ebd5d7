pub mod db;
pub mod dump;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mexcbot_core::{DatabaseConfig, StoreError, TableName, TickerRow, TickerSnapshot, TickerStore};
use tokio::sync::RwLock;

/// A PostgreSQL-backed ticker store.
pub struct PostgresTickerStore {
    pub pool: sqlx::PgPool,
    pub table: TableName,
}

impl PostgresTickerStore {
    pub fn new(pool: sqlx::PgPool, table: TableName) -> Self {
        Self { pool, table }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = db::connect(config)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self::new(pool, config.table.clone()))
    }

    /// A store whose connection is opened on first use. Never fails up front;
    /// an unreachable database surfaces as `StoreError::Database` per call.
    pub fn connect_lazy(config: &DatabaseConfig, acquire_timeout: Duration) -> Self {
        Self::new(db::connect_lazy(config, acquire_timeout), config.table.clone())
    }
}

#[async_trait]
impl TickerStore for PostgresTickerStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        db::ensure_table(&self.pool, &self.table)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn upsert(&self, tickers: &[TickerSnapshot]) -> Result<u64, StoreError> {
        db::upsert_tickers(&self.pool, &self.table, tickers)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn load_all(&self) -> Result<Vec<TickerRow>, StoreError> {
        db::load_rows(&self.pool, &self.table)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

/// An in-memory ticker store with the same last-write-wins semantics.
#[derive(Default)]
pub struct MemoryTickerStore {
    rows: RwLock<BTreeMap<String, TickerRow>>,
}

impl MemoryTickerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub async fn get(&self, symbol: &str) -> Option<TickerRow> {
        self.rows.read().await.get(symbol).cloned()
    }
}

#[async_trait]
impl TickerStore for MemoryTickerStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(&self, tickers: &[TickerSnapshot]) -> Result<u64, StoreError> {
        let now = Utc::now().naive_utc();
        let mut rows = self.rows.write().await;
        for t in tickers {
            rows.insert(
                t.symbol.clone(),
                TickerRow {
                    symbol: t.symbol.clone(),
                    last_price: t.last_price,
                    price_change_percent: t.price_change_percent,
                    high_price: t.high_price,
                    low_price: t.low_price,
                    volume: t.volume,
                    timestamp: now,
                },
            );
        }
        Ok(tickers.len() as u64)
    }

    async fn load_all(&self) -> Result<Vec<TickerRow>, StoreError> {
        Ok(self.rows.read().await.values().cloned().collect())
    }
}
