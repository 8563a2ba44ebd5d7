use mexcbot_core::{AccountApi, ExchangeError, MarketDataSource, OrderConfirmation, OrderRequest, OrderType, Side};
use rust_decimal::Decimal;
use tracing::info;

use crate::allocation::{quantity_for_budget, AllocationError};

/// Default share of the free quote balance spent on one order.
pub const DEFAULT_ALLOCATION: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Default quote asset budgets are drawn from.
pub const DEFAULT_QUOTE_ASSET: &str = "USDT";

#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("No free {0} balance to allocate")]
    NoBalance(String),
    #[error("Allocation must be in (0, 1], got {0}")]
    InvalidAllocation(Decimal),
}

/// A budget-driven order: spend `allocation` of the free `quote_asset`
/// balance on `symbol` at its last price.
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price. Ignored for market orders.
    pub price: Option<Decimal>,
    pub quote_asset: String,
    pub allocation: Decimal,
}

impl TradeRequest {
    pub fn new(symbol: &str, side: Side, order_type: OrderType) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type,
            price: None,
            quote_asset: DEFAULT_QUOTE_ASSET.to_string(),
            allocation: DEFAULT_ALLOCATION,
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_allocation(mut self, allocation: Decimal) -> Self {
        self.allocation = allocation;
        self
    }

    pub fn with_quote_asset(mut self, asset: &str) -> Self {
        self.quote_asset = asset.to_string();
        self
    }
}

/// Result of an executed trade request.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    /// Free quote balance before the order.
    pub available: Decimal,
    /// Part of `available` allocated to the order.
    pub budget: Decimal,
    pub order: OrderRequest,
    pub confirmation: OrderConfirmation,
    /// False when the order only went through the validation endpoint.
    pub live: bool,
}

/// Runs the balance → allocation → order flow.
pub struct Trader<M, A> {
    market: M,
    account: A,
    live: bool,
}

impl<M: MarketDataSource, A: AccountApi> Trader<M, A> {
    pub fn new(market: M, account: A, live: bool) -> Self {
        Self { market, account, live }
    }

    pub async fn execute(&self, request: &TradeRequest) -> Result<TradeOutcome, TradeError> {
        if request.allocation <= Decimal::ZERO || request.allocation > Decimal::ONE {
            return Err(TradeError::InvalidAllocation(request.allocation));
        }

        let balances = self.account.get_balances().await?;
        let available = balances
            .iter()
            .find(|b| b.asset == request.quote_asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO);
        if available <= Decimal::ZERO {
            return Err(TradeError::NoBalance(request.quote_asset.clone()));
        }
        let budget = available * request.allocation;

        let tickers = self.market.fetch_tickers().await?;
        let quantity = quantity_for_budget(&request.symbol, budget, &tickers)?;

        let order = match request.order_type {
            OrderType::Market => OrderRequest::market(&request.symbol, request.side, quantity),
            OrderType::Limit => OrderRequest {
                symbol: request.symbol.clone(),
                side: request.side,
                order_type: OrderType::Limit,
                quantity,
                price: request.price,
            },
        };

        info!(
            symbol = %order.symbol,
            side = %order.side,
            order_type = %order.order_type,
            %available,
            %budget,
            quantity = %order.rounded_quantity(),
            live = self.live,
            "Submitting order"
        );

        let confirmation = if self.live {
            self.account.place_order(&order).await?
        } else {
            self.account.test_order(&order).await?
        };

        Ok(TradeOutcome {
            available,
            budget,
            order,
            confirmation,
            live: self.live,
        })
    }
}
