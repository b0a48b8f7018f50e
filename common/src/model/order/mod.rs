//! Order models and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::instrument::{validate_currency, validate_ticker};
use crate::units::{notional, Price, Qty};

/// Order direction (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// The side an incoming order matches against
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Limit order executed at the stated price or better
    Limit,
    /// Market order executed immediately against available liquidity
    Market,
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Admitted, nothing filled yet
    New,
    /// Some quantity filled, remainder still open
    PartiallyExecuted,
    /// Fully filled
    Executed,
    /// Cancelled by the owner
    Cancelled,
    /// Cancelled by the engine (market order remainder with no liquidity)
    SystemCancelled,
}

impl OrderStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Executed | OrderStatus::Cancelled | OrderStatus::SystemCancelled
        )
    }
}

/// Order model
///
/// Orders are mutable only through `filled_qty`/status transitions driven by
/// matching, or terminal cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Instrument ticker
    pub ticker: String,
    /// Direction (buy or sell)
    pub direction: Direction,
    /// Order type
    pub order_type: OrderType,
    /// Limit price; present iff the order is a limit order
    pub price: Option<Price>,
    /// Original quantity
    pub qty: Qty,
    /// Cumulative matched quantity, `filled_qty <= qty` at every state
    pub filled_qty: Qty,
    /// Settlement currency (3-letter code)
    pub currency: String,
    /// Current status
    pub status: OrderStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new limit order, enforcing the shape constraints.
    pub fn new_limit(
        user_id: Uuid,
        ticker: impl Into<String>,
        direction: Direction,
        price: Price,
        qty: Qty,
        currency: impl Into<String>,
    ) -> Result<Self> {
        if price <= 0 {
            return Err(Error::ValidationError(format!(
                "limit price must be positive, got {}",
                price
            )));
        }
        // The full notional must be representable; this is also the buy-side
        // reservation amount.
        notional(price, qty)?;
        Self::new(user_id, ticker, direction, OrderType::Limit, Some(price), qty, currency)
    }

    /// Create a new market order. Market orders carry no price.
    pub fn new_market(
        user_id: Uuid,
        ticker: impl Into<String>,
        direction: Direction,
        qty: Qty,
        currency: impl Into<String>,
    ) -> Result<Self> {
        Self::new(user_id, ticker, direction, OrderType::Market, None, qty, currency)
    }

    fn new(
        user_id: Uuid,
        ticker: impl Into<String>,
        direction: Direction,
        order_type: OrderType,
        price: Option<Price>,
        qty: Qty,
        currency: impl Into<String>,
    ) -> Result<Self> {
        let ticker = ticker.into();
        let currency = currency.into();
        validate_ticker(&ticker)?;
        validate_currency(&currency)?;
        if qty < 1 {
            return Err(Error::ValidationError(format!(
                "order qty must be >= 1, got {}",
                qty
            )));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            ticker,
            direction,
            order_type,
            price,
            qty,
            filled_qty: 0,
            currency,
            status: OrderStatus::New,
            created_at: now,
            updated_at: now,
        })
    }

    /// Quantity still open for matching
    pub fn remaining(&self) -> Qty {
        self.qty - self.filled_qty
    }

    /// Check if the order reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check if the order is fully filled
    pub fn is_filled(&self) -> bool {
        self.filled_qty == self.qty
    }

    /// Apply a fill of `qty` units, transitioning the status.
    ///
    /// The fill quantity must not exceed the remaining quantity; matching
    /// always trades `min` of the two remainders so a violation here is an
    /// engine bug, not a caller error.
    pub fn apply_fill(&mut self, qty: Qty) -> Result<()> {
        if qty < 1 || qty > self.remaining() {
            return Err(Error::Internal(format!(
                "fill of {} exceeds remaining {} on order {}",
                qty,
                self.remaining(),
                self.id
            )));
        }
        self.filled_qty += qty;
        self.status = if self.is_filled() {
            OrderStatus::Executed
        } else {
            OrderStatus::PartiallyExecuted
        };
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transition to a terminal cancellation status.
    pub fn cancel(&mut self, status: OrderStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_requires_positive_price() {
        let user = Uuid::new_v4();
        assert!(Order::new_limit(user, "MEMCOIN", Direction::Buy, 0, 10, "RUB").is_err());
        assert!(Order::new_limit(user, "MEMCOIN", Direction::Buy, -5, 10, "RUB").is_err());
        assert!(Order::new_limit(user, "MEMCOIN", Direction::Buy, 100, 10, "RUB").is_ok());
    }

    #[test]
    fn qty_must_be_at_least_one() {
        let user = Uuid::new_v4();
        assert!(Order::new_market(user, "MEMCOIN", Direction::Sell, 0, "RUB").is_err());
        assert!(Order::new_market(user, "MEMCOIN", Direction::Sell, 1, "RUB").is_ok());
    }

    #[test]
    fn market_order_has_no_price() {
        let order = Order::new_market(Uuid::new_v4(), "MEMCOIN", Direction::Buy, 5, "RUB").unwrap();
        assert_eq!(order.price, None);
        assert_eq!(order.status, OrderStatus::New);
    }

    #[test]
    fn fills_drive_status_transitions() {
        let mut order =
            Order::new_limit(Uuid::new_v4(), "MEMCOIN", Direction::Buy, 100, 10, "RUB").unwrap();
        order.apply_fill(4).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyExecuted);
        assert_eq!(order.remaining(), 6);

        order.apply_fill(6).unwrap();
        assert_eq!(order.status, OrderStatus::Executed);
        assert!(order.is_terminal());
    }

    #[test]
    fn overfill_is_rejected() {
        let mut order =
            Order::new_limit(Uuid::new_v4(), "MEMCOIN", Direction::Buy, 100, 10, "RUB").unwrap();
        assert!(order.apply_fill(11).is_err());
        assert_eq!(order.filled_qty, 0);
    }
}
