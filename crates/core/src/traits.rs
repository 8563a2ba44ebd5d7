use crate::models::*;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Exchange Traits
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the exchange.
///
/// `Request`, `Status` and `Decode` form the network family: the caller may
/// skip the cycle and try again later. A rejected signature or API key is
/// reported as `Status` with the exchange's body attached.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

impl ExchangeError {
    /// Whether the failure happened on the wire (as opposed to local validation).
    pub fn is_network(&self) -> bool {
        !matches!(self, ExchangeError::InvalidOrder(_))
    }
}

/// Source of 24h ticker snapshots.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the snapshots of every traded symbol.
    async fn fetch_tickers(&self) -> Result<Vec<TickerSnapshot>, ExchangeError>;
}

/// Authenticated account and order operations.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Fetch account information, including balances.
    async fn account(&self) -> Result<AccountInfo, ExchangeError>;

    /// Fetch the balance of every asset.
    async fn get_balances(&self) -> Result<Vec<Balance>, ExchangeError> {
        Ok(self.account().await?.balances)
    }

    /// Submit an order for execution.
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, ExchangeError>;

    /// Submit an order to the validation-only endpoint. Nothing is executed.
    async fn test_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, ExchangeError>;
}

// ---------------------------------------------------------------------------
// Storage Trait
// ---------------------------------------------------------------------------

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),
}

/// Keyed storage of the latest snapshot per symbol.
#[async_trait]
pub trait TickerStore: Send + Sync {
    /// Create the backing table if it does not exist yet.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Insert or overwrite one row per symbol. Returns the number of rows written.
    async fn upsert(&self, tickers: &[TickerSnapshot]) -> Result<u64, StoreError>;

    /// Every stored row, ordered by symbol.
    async fn load_all(&self) -> Result<Vec<TickerRow>, StoreError>;
}
