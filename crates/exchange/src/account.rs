//! Signed account and order endpoints.

use async_trait::async_trait;
use mexcbot_core::{
    AccountApi, AccountInfo, Credentials, ExchangeError, OrderConfirmation, OrderRequest, OrderType,
};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::endpoints::{ACCOUNT, ORDER, ORDER_TEST};
use crate::http::{build_client, handle_response};
use crate::request::{RequestBuilder, SignedRequest};
use crate::signing::Params;

/// Exchange symbols are plain `[A-Z0-9]+`. Anything else would need
/// percent-encoding and would no longer match the signed string.
fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Build the parameter set for a new order.
///
/// Validation happens here, before anything is signed or sent: the quantity
/// must still be positive after rounding, and a limit order needs a positive
/// price. Market orders never carry a price.
pub fn order_params(order: &OrderRequest) -> Result<Params, ExchangeError> {
    if !is_valid_symbol(&order.symbol) {
        return Err(ExchangeError::InvalidOrder(format!(
            "symbol {:?} must be non-empty uppercase letters and digits",
            order.symbol
        )));
    }

    let quantity = order.rounded_quantity();
    if quantity <= Decimal::ZERO {
        return Err(ExchangeError::InvalidOrder(format!(
            "quantity {} is not positive after rounding",
            order.quantity
        )));
    }

    let mut params = Params::new();
    params.insert("symbol".to_string(), order.symbol.clone());
    params.insert("side".to_string(), order.side.as_str().to_string());
    params.insert("type".to_string(), order.order_type.as_str().to_string());
    params.insert("quantity".to_string(), quantity.to_string());

    match order.order_type {
        OrderType::Limit => match order.price {
            Some(price) if price > Decimal::ZERO => {
                params.insert("price".to_string(), price.normalize().to_string());
            }
            Some(price) => {
                return Err(ExchangeError::InvalidOrder(format!(
                    "limit price {} is not positive",
                    price
                )));
            }
            None => {
                return Err(ExchangeError::InvalidOrder(
                    "Limit order requires price".to_string(),
                ));
            }
        },
        OrderType::Market => {
            if order.price.is_some() {
                debug!(symbol = %order.symbol, "Ignoring price on market order");
            }
        }
    }

    Ok(params)
}

/// Authenticated client for account and order endpoints.
pub struct AccountClient {
    client: Client,
    base_url: String,
    builder: RequestBuilder,
}

impl AccountClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Result<Self, ExchangeError> {
        Ok(Self::with_client(build_client()?, base_url, credentials))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            builder: RequestBuilder::new(credentials),
        }
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        request: SignedRequest,
    ) -> Result<T, ExchangeError> {
        debug!("{} (signed) {}", method, request.path);

        let mut http = self.client.request(method, request.url(&self.base_url));
        for (name, value) in &request.headers {
            http = http.header(*name, value);
        }

        let response = http
            .send()
            .await
            .map_err(|e| ExchangeError::Request(e.to_string()))?;

        handle_response(response).await
    }

    async fn submit(&self, path: &'static str, order: &OrderRequest) -> Result<OrderConfirmation, ExchangeError> {
        let params = order_params(order)?;
        let request = self.builder.build(path, params);

        info!(
            symbol = %order.symbol,
            side = %order.side,
            order_type = %order.order_type,
            quantity = %request.params["quantity"],
            path,
            "Submitting order"
        );

        self.send_signed(Method::POST, request).await
    }
}

#[async_trait]
impl AccountApi for AccountClient {
    async fn account(&self) -> Result<AccountInfo, ExchangeError> {
        let request = self.builder.build(ACCOUNT, Params::new());
        self.send_signed(Method::GET, request).await
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, ExchangeError> {
        self.submit(ORDER, order).await
    }

    async fn test_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, ExchangeError> {
        self.submit(ORDER_TEST, order).await
    }
}
