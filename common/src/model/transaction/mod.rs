//! Transaction models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::units::{Price, Qty};

/// Immutable audit record of one fill
///
/// Order references are weak: a parent order may later be purged and the
/// reference nulled, but the trade's ticker, price, quantity and currency are
/// denormalized here and remain as historical fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID
    pub id: Uuid,
    /// Buy-side parent order, if it still exists
    pub buy_order_id: Option<Uuid>,
    /// Sell-side parent order, if it still exists
    pub sell_order_id: Option<Uuid>,
    /// Instrument ticker shared by both parent orders
    pub ticker: String,
    /// Execution price (the resting order's price)
    pub price: Price,
    /// Quantity traded
    pub qty: Qty,
    /// Settlement currency shared by both parent orders
    pub currency: String,
    /// Time of the fill
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Record a fill between two orders.
    pub fn new(
        buy_order_id: Uuid,
        sell_order_id: Uuid,
        ticker: impl Into<String>,
        price: Price,
        qty: Qty,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            buy_order_id: Some(buy_order_id),
            sell_order_id: Some(sell_order_id),
            ticker: ticker.into(),
            price,
            qty,
            currency: currency.into(),
            created_at: Utc::now(),
        }
    }
}
