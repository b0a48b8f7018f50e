//! Monetary unit types for exact integer accounting
//!
//! All quantities and prices are expressed in the smallest unit of the
//! instrument or currency, so every balance mutation is exact integer
//! arithmetic with no rounding anywhere in the engine.

use crate::error::{Error, Result};

/// Price in smallest currency units per one instrument unit
pub type Price = i64;

/// Quantity in smallest instrument units
pub type Qty = i64;

/// Cash amount in smallest currency units (typically Price * Qty)
pub type Cash = i64;

/// Compute the cash value of `qty` units at `price`.
///
/// Overflow is a validation failure, not a wrap: an order whose notional
/// does not fit in an `i64` cannot be admitted.
pub fn notional(price: Price, qty: Qty) -> Result<Cash> {
    price.checked_mul(qty).ok_or_else(|| {
        Error::ValidationError(format!(
            "order notional overflows: price {} x qty {}",
            price, qty
        ))
    })
}
