use std::time::Duration;

use mexcbot_core::ExchangeError;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// Timeout applied to every request made through [`build_client`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_client() -> Result<Client, ExchangeError> {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| ExchangeError::Request(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a response into `T`, mapping non-2xx statuses to [`ExchangeError::Status`].
pub(crate) async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ExchangeError::Request(e.to_string()))?;

    if !status.is_success() {
        return Err(ExchangeError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| ExchangeError::Decode(e.to_string()))
}
