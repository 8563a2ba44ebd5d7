//! MEXC spot REST paths, relative to the API base (e.g. `https://api.mexc.com/api/v3`).

/// Header carrying the API key on signed requests.
pub const API_KEY_HEADER: &str = "X-MEXC-APIKEY";

/// 24h rolling ticker statistics for every symbol (public).
pub const TICKER_24HR: &str = "/ticker/24hr";

/// Account information and balances (signed GET).
pub const ACCOUNT: &str = "/account";

/// New order (signed POST).
pub const ORDER: &str = "/order";

/// New order, validated but never sent to the matching engine (signed POST).
pub const ORDER_TEST: &str = "/order/test";
