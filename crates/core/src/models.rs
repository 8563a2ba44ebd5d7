use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits an order quantity is rounded to before transmission.
pub const QUANTITY_DECIMALS: u32 = 6;

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// 24-hour rolling window statistics for one trading pair.
///
/// The exchange sends every numeric field as a decimal string; they are parsed
/// into exact decimals on the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerSnapshot {
    pub symbol: String,
    pub last_price: Decimal,
    pub price_change_percent: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub volume: Decimal,
}

/// Find the snapshot for `symbol` (exact match) in a ticker list.
pub fn find_ticker<'a>(tickers: &'a [TickerSnapshot], symbol: &str) -> Option<&'a TickerSnapshot> {
    tickers.iter().find(|t| t.symbol == symbol)
}

/// A persisted ticker row, including the write timestamp set by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerRow {
    pub symbol: String,
    pub last_price: Decimal,
    pub price_change_percent: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub volume: Decimal,
    pub timestamp: NaiveDateTime,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown order side: {other}")),
        }
    }
}

/// The type of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LIMIT" => Ok(OrderType::Limit),
            "MARKET" => Ok(OrderType::Market),
            other => Err(format!("unknown order type: {other}")),
        }
    }
}

/// An order to be submitted to the exchange.
///
/// `quantity` is kept at full precision; it is rounded to
/// [`QUANTITY_DECIMALS`] only when the request parameters are built.
/// The timestamp is not part of the request: it is assigned at signing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
}

impl OrderRequest {
    /// Create a new market order.
    pub fn market(symbol: &str, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
        }
    }

    /// Create a new limit order.
    pub fn limit(symbol: &str, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
        }
    }

    /// The quantity as it goes on the wire.
    pub fn rounded_quantity(&self) -> Decimal {
        self.quantity.round_dp(QUANTITY_DECIMALS).normalize()
    }
}

/// Exchange acknowledgement of a new order.
///
/// Every field is optional: the test-order endpoint answers with `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default, rename = "type")]
    pub order_type: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub orig_qty: Option<String>,
    #[serde(default)]
    pub transact_time: Option<i64>,
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Holdings of a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

/// Response of the signed account endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub can_trade: Option<bool>,
    #[serde(default)]
    pub balances: Vec<Balance>,
}

impl AccountInfo {
    pub fn balance(&self, asset: &str) -> Option<&Balance> {
        self.balances.iter().find(|b| b.asset == asset)
    }

    /// Free amount of `asset`, zero when the account holds none.
    pub fn free(&self, asset: &str) -> Decimal {
        self.balance(asset).map(|b| b.free).unwrap_or(Decimal::ZERO)
    }
}
