//! Aggregated orderbook views for external consumers

use serde::{Deserialize, Serialize};

use crate::model::order::Direction;
use crate::units::{Price, Qty};

/// One aggregated price level: the sum of resting quantity at that price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Price of the level
    pub price: Price,
    /// Total resting quantity at this exact price
    pub qty: Qty,
}

/// Aggregate row keyed by (ticker, price, side, currency)
///
/// Derived from order book state; never an independent source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRow {
    /// Instrument ticker
    pub ticker: String,
    /// Price of the level
    pub price: Price,
    /// Side of the book
    pub side: Direction,
    /// Settlement currency
    pub currency: String,
    /// Total resting quantity
    pub qty: Qty,
}

/// Two-sided aggregated book for one ticker
///
/// Bids sorted by descending price, asks by ascending price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L2Orderbook {
    /// Instrument ticker
    pub ticker: String,
    /// Bid levels, best (highest) first
    pub bid_levels: Vec<Level>,
    /// Ask levels, best (lowest) first
    pub ask_levels: Vec<Level>,
}
