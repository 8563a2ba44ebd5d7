//! Public market data.

use async_trait::async_trait;
use mexcbot_core::{find_ticker, ExchangeConfig, ExchangeError, MarketDataSource, TickerSnapshot};
use reqwest::Client;
use tracing::debug;

use crate::endpoints::TICKER_24HR;
use crate::http::{build_client, handle_response};

/// Unauthenticated client for the ticker endpoint.
pub struct MarketDataClient {
    client: Client,
    base_url: String,
}

impl MarketDataClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ExchangeError> {
        Ok(Self::with_client(build_client()?, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        Self::new(config.base_url.clone())
    }

    /// Fetch 24h statistics of every traded symbol.
    pub async fn fetch_tickers(&self) -> Result<Vec<TickerSnapshot>, ExchangeError> {
        let url = format!("{}{}", self.base_url, TICKER_24HR);
        debug!("GET (public) {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::Request(e.to_string()))?;

        let tickers: Vec<TickerSnapshot> = handle_response(response).await?;
        debug!(count = tickers.len(), "Fetched tickers");
        Ok(tickers)
    }

    /// Fetch the snapshot of a single symbol, `None` if the exchange does not list it.
    pub async fn fetch_ticker(&self, symbol: &str) -> Result<Option<TickerSnapshot>, ExchangeError> {
        let tickers = self.fetch_tickers().await?;
        Ok(find_ticker(&tickers, symbol).cloned())
    }
}

#[async_trait]
impl MarketDataSource for MarketDataClient {
    async fn fetch_tickers(&self) -> Result<Vec<TickerSnapshot>, ExchangeError> {
        MarketDataClient::fetch_tickers(self).await
    }
}
