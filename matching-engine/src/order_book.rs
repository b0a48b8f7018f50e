//! Order book implementation for price-time priority matching

use std::collections::{BTreeMap, HashMap, VecDeque};

use common::error::{Error, Result};
use common::model::order::{Direction, Order};
use common::model::orderbook::Level;
use common::units::{Cash, Price, Qty};
use uuid::Uuid;

/// One side of the order book
///
/// Price levels are kept in a `BTreeMap`; within a level, resting orders are
/// a FIFO queue in arrival order. Arrival order at a price level is never
/// reordered once admitted: that, plus best-price-first traversal, is the
/// entire price-time priority law.
pub struct BookSide {
    /// Which direction rests on this side
    side: Direction,
    /// Price levels; best bid is the highest key, best ask the lowest
    limits: BTreeMap<Price, VecDeque<Order>>,
    /// Index for order lookup by ID
    index: HashMap<Uuid, Price>,
}

impl BookSide {
    /// Create a new empty side
    pub fn new(side: Direction) -> Self {
        Self {
            side,
            limits: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    /// Whether any orders rest on this side
    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    /// Get the best price on this side
    pub fn best_price(&self) -> Option<Price> {
        match self.side {
            Direction::Buy => self.limits.keys().next_back().copied(),
            Direction::Sell => self.limits.keys().next().copied(),
        }
    }

    /// Append a resting order behind any existing orders at its price
    pub fn add(&mut self, order: Order) {
        debug_assert_eq!(order.direction, self.side);
        if let Some(price) = order.price {
            self.index.insert(order.id, price);
            self.limits.entry(price).or_default().push_back(order);
        }
    }

    /// Peek the first resting order at the given price
    pub fn front(&self, price: Price) -> Option<&Order> {
        self.limits.get(&price).and_then(|level| level.front())
    }

    /// Fill the front order at `price` by `qty`, removing it if filled.
    ///
    /// Returns the updated order.
    pub fn fill_front(&mut self, price: Price, qty: Qty) -> Result<Order> {
        let level = self
            .limits
            .get_mut(&price)
            .ok_or_else(|| Error::Internal(format!("no price level at {}", price)))?;
        let order = level
            .front_mut()
            .ok_or_else(|| Error::Internal(format!("empty price level at {}", price)))?;
        order.apply_fill(qty)?;
        let updated = order.clone();

        if updated.is_filled() {
            level.pop_front();
            self.index.remove(&updated.id);
            if level.is_empty() {
                self.limits.remove(&price);
            }
        }
        Ok(updated)
    }

    /// Remove a resting order by ID (cancellation)
    pub fn remove(&mut self, order_id: Uuid) -> Option<Order> {
        let price = self.index.remove(&order_id)?;
        let level = self.limits.get_mut(&price)?;
        let position = level.iter().position(|o| o.id == order_id)?;
        let order = level.remove(position);
        if level.is_empty() {
            self.limits.remove(&price);
        }
        order
    }

    /// Aggregate price levels, best first, for the projection
    pub fn price_levels(&self, limit: usize) -> Vec<Level> {
        let aggregate = |(price, orders): (&Price, &VecDeque<Order>)| Level {
            price: *price,
            qty: orders.iter().map(|o| o.remaining()).sum(),
        };
        match self.side {
            Direction::Buy => self.limits.iter().rev().take(limit).map(aggregate).collect(),
            Direction::Sell => self.limits.iter().take(limit).map(aggregate).collect(),
        }
    }

    /// Cost of sweeping the first `qty` units off this side at maker prices
    ///
    /// Walks levels best-first and sums price * taken quantity. If the side
    /// holds less than `qty`, the cost covers only the available liquidity.
    /// This is the exact worst-case cash a market order crossing this side
    /// can spend, used to size market-buy reservations.
    pub fn sweep_cost(&self, qty: Qty) -> Result<Cash> {
        let mut remaining = qty;
        let mut cost: Cash = 0;
        let levels: Box<dyn Iterator<Item = (&Price, &VecDeque<Order>)>> = match self.side {
            Direction::Buy => Box::new(self.limits.iter().rev()),
            Direction::Sell => Box::new(self.limits.iter()),
        };
        for (price, orders) in levels {
            if remaining == 0 {
                break;
            }
            let level_qty: Qty = orders.iter().map(|o| o.remaining()).sum();
            let taken = level_qty.min(remaining);
            let level_cost = price.checked_mul(taken).ok_or_else(|| {
                Error::ValidationError(format!("sweep cost overflows at price {}", price))
            })?;
            cost = cost.checked_add(level_cost).ok_or_else(|| {
                Error::ValidationError("sweep cost overflows".to_string())
            })?;
            remaining -= taken;
        }
        Ok(cost)
    }
}

/// Order book for a single ticker
///
/// All orders in one book share the ticker and the settlement currency, so
/// cross-ticker and cross-currency matches are impossible by construction.
pub struct TickerBook {
    /// Instrument ticker
    pub ticker: String,
    /// Settlement currency shared by every order in this book
    pub currency: String,
    /// Buy side (bids)
    bids: BookSide,
    /// Sell side (asks)
    asks: BookSide,
    /// Last traded price
    pub last_price: Option<Price>,
}

impl TickerBook {
    /// Create a new empty book
    pub fn new(ticker: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            currency: currency.into(),
            bids: BookSide::new(Direction::Buy),
            asks: BookSide::new(Direction::Sell),
            last_price: None,
        }
    }

    /// The side where orders of `direction` rest
    pub fn side(&self, direction: Direction) -> &BookSide {
        match direction {
            Direction::Buy => &self.bids,
            Direction::Sell => &self.asks,
        }
    }

    /// Mutable access to the side where orders of `direction` rest
    pub fn side_mut(&mut self, direction: Direction) -> &mut BookSide {
        match direction {
            Direction::Buy => &mut self.bids,
            Direction::Sell => &mut self.asks,
        }
    }

    /// Best price an incoming order of `direction` would match against
    pub fn best_opposite(&self, direction: Direction) -> Option<Price> {
        self.side(direction.opposite()).best_price()
    }

    /// Insert a resting order on its own side
    pub fn insert(&mut self, order: Order) {
        self.side_mut(order.direction).add(order);
    }

    /// Remove a resting order (cancellation)
    pub fn remove(&mut self, order_id: Uuid, direction: Direction) -> Option<Order> {
        self.side_mut(direction).remove(order_id)
    }

    /// Bid levels, best first
    pub fn bid_levels(&self, limit: usize) -> Vec<Level> {
        self.bids.price_levels(limit)
    }

    /// Ask levels, best first
    pub fn ask_levels(&self, limit: usize) -> Vec<Level> {
        self.asks.price_levels(limit)
    }
}
