//! Admission control: shape validation and reservation sizing
//!
//! Every rejection here happens before any state change; an order that fails
//! admission was never created and reserved nothing.

use common::error::{Error, Result};
use common::model::order::{Direction, Order, OrderType};
use common::units::{notional, Qty};
use tracing::debug;

use crate::order_book::TickerBook;

/// Funds to hold against an order before it reaches the matching loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservePlan {
    /// Asset to reserve: the settlement currency for buys, the instrument
    /// ticker for sells
    pub asset: String,
    /// Amount in smallest units
    pub amount: Qty,
}

/// Compute the reservation for an admitted order.
///
/// - BUY LIMIT reserves `price * qty` of the settlement currency.
/// - BUY MARKET reserves the book's sweep cost for `qty`: the exact
///   maker-priced cash the order can spend against liquidity visible under
///   the ticker lock. Any unused portion is released when matching ends.
/// - SELL reserves `qty` of the instrument itself.
pub fn reserve_plan(order: &Order, book: &TickerBook) -> Result<ReservePlan> {
    let plan = match (order.direction, order.order_type) {
        (Direction::Buy, OrderType::Limit) => {
            let price = order.price.ok_or_else(|| {
                Error::ValidationError("limit order without a price".to_string())
            })?;
            ReservePlan {
                asset: order.currency.clone(),
                amount: notional(price, order.qty)?,
            }
        }
        (Direction::Buy, OrderType::Market) => ReservePlan {
            asset: order.currency.clone(),
            amount: book.side(Direction::Sell).sweep_cost(order.qty)?,
        },
        (Direction::Sell, _) => ReservePlan {
            asset: order.ticker.clone(),
            amount: order.qty,
        },
    };
    debug!(
        "Reservation for order {}: {} {}",
        order.id, plan.amount, plan.asset
    );
    Ok(plan)
}
