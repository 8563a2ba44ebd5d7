//! MEXC spot REST adapter.
//!
//! Public ticker data, plus HMAC-SHA256 signed account and order calls.

pub mod account;
pub mod endpoints;
mod http;
pub mod market;
pub mod request;
pub mod signing;

pub use account::{order_params, AccountClient};
pub use http::DEFAULT_TIMEOUT;
pub use market::MarketDataClient;
pub use request::{timestamp_ms, RequestBuilder, SignedRequest};
pub use signing::{canonical_query, sign, sign_query, Params};
