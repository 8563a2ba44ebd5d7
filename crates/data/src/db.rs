use std::time::Duration;

use mexcbot_core::{DatabaseConfig, TableName, TickerRow, TickerSnapshot};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

/// Connection options built from discrete settings, so passwords never have to
/// be URL-escaped.
pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.name)
        .username(&config.user)
        .password(&config.password)
}

/// Open a pool with a single connection: the collector is the only writer.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(config))
        .await?;
    info!(host = %config.host, port = config.port, database = %config.name, "Connected to PostgreSQL");
    Ok(pool)
}

/// Build a single-connection pool without touching the network.
///
/// Connections are opened on first use, and every acquire gives up after
/// `acquire_timeout`, so an unreachable server fails a call instead of
/// blocking the caller.
pub fn connect_lazy(config: &DatabaseConfig, acquire_timeout: Duration) -> PgPool {
    info!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        acquire_timeout_ms = acquire_timeout.as_millis() as u64,
        "PostgreSQL pool created (lazy)"
    );
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(acquire_timeout)
        .connect_lazy_with(connect_options(config))
}

/// Create the ticker table if it does not exist.
pub async fn ensure_table(pool: &PgPool, table: &TableName) -> Result<(), sqlx::Error> {
    let quoted = table.quoted();
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {quoted} (
            symbol TEXT PRIMARY KEY,
            last_price NUMERIC,
            price_change_percent NUMERIC,
            high_price NUMERIC,
            low_price NUMERIC,
            volume NUMERIC,
            timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )"
    );
    sqlx::query(&sql).execute(pool).await?;
    info!(table = %table, "Ticker table ready");
    Ok(())
}

/// Insert or overwrite one row per symbol, refreshing its timestamp.
/// All rows of a batch are written in one transaction.
pub async fn upsert_tickers(
    pool: &PgPool,
    table: &TableName,
    tickers: &[TickerSnapshot],
) -> Result<u64, sqlx::Error> {
    let quoted = table.quoted();
    let sql = format!(
        "INSERT INTO {quoted} (symbol, last_price, price_change_percent, high_price, low_price, volume)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (symbol) DO UPDATE
         SET last_price = EXCLUDED.last_price,
             price_change_percent = EXCLUDED.price_change_percent,
             high_price = EXCLUDED.high_price,
             low_price = EXCLUDED.low_price,
             volume = EXCLUDED.volume,
             timestamp = CURRENT_TIMESTAMP"
    );

    let mut tx = pool.begin().await?;
    let mut count = 0u64;
    for ticker in tickers {
        sqlx::query(&sql)
            .bind(&ticker.symbol)
            .bind(ticker.last_price)
            .bind(ticker.price_change_percent)
            .bind(ticker.high_price)
            .bind(ticker.low_price)
            .bind(ticker.volume)
            .execute(&mut *tx)
            .await?;
        count += 1;
    }
    tx.commit().await?;

    debug!(table = %table, rows = count, "Upserted tickers");
    Ok(count)
}

/// Load every row of the ticker table, ordered by symbol.
pub async fn load_rows(pool: &PgPool, table: &TableName) -> Result<Vec<TickerRow>, sqlx::Error> {
    let quoted = table.quoted();
    let sql = format!(
        "SELECT symbol, last_price, price_change_percent, high_price, low_price, volume, timestamp
         FROM {quoted}
         ORDER BY symbol ASC"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    rows.iter()
        .map(|r| -> Result<TickerRow, sqlx::Error> {
            Ok(TickerRow {
                symbol: r.try_get("symbol")?,
                last_price: r.try_get("last_price")?,
                price_change_percent: r.try_get("price_change_percent")?,
                high_price: r.try_get("high_price")?,
                low_price: r.try_get("low_price")?,
                volume: r.try_get("volume")?,
                timestamp: r.try_get("timestamp")?,
            })
        })
        .collect()
}
