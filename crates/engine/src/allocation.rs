use mexcbot_core::{find_ticker, TickerSnapshot};
use rust_decimal::Decimal;

/// Reasons a budget cannot be turned into an order quantity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocationError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("Invalid last price for {symbol}: {price}")]
    InvalidPrice { symbol: String, price: Decimal },
    #[error("Budget must be positive, got {0}")]
    InvalidBudget(Decimal),
}

/// Convert a quote-asset budget into a base-asset quantity at the last traded price.
///
/// The result is not rounded; rounding happens once, when the order
/// parameters are built.
pub fn quantity_for_budget(
    symbol: &str,
    usdt_budget: Decimal,
    tickers: &[TickerSnapshot],
) -> Result<Decimal, AllocationError> {
    if usdt_budget <= Decimal::ZERO {
        return Err(AllocationError::InvalidBudget(usdt_budget));
    }

    let ticker = find_ticker(tickers, symbol)
        .ok_or_else(|| AllocationError::SymbolNotFound(symbol.to_string()))?;

    let invalid_price = || AllocationError::InvalidPrice {
        symbol: symbol.to_string(),
        price: ticker.last_price,
    };
    if ticker.last_price <= Decimal::ZERO {
        return Err(invalid_price());
    }

    usdt_budget.checked_div(ticker.last_price).ok_or_else(invalid_price)
}
