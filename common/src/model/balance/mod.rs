//! Balance models and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::units::Qty;

/// Per-user, per-ticker balance
///
/// `available` and `reserved` are both non-negative at all times; a negative
/// transient state is never observable because every mutation checks before
/// it applies. The externally reported amount is their sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    /// Owning user
    pub user_id: Uuid,
    /// Instrument ticker or currency code
    pub ticker: String,
    /// Funds free to reserve or withdraw
    pub available: Qty,
    /// Funds held against pending orders
    pub reserved: Qty,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Create a new zero balance
    pub fn new(user_id: Uuid, ticker: impl Into<String>) -> Self {
        Self {
            user_id,
            ticker: ticker.into(),
            available: 0,
            reserved: 0,
            updated_at: Utc::now(),
        }
    }

    /// Total holding (available + reserved)
    pub fn amount(&self) -> Qty {
        self.available + self.reserved
    }

    /// Add funds to the available balance
    pub fn deposit(&mut self, amount: Qty) -> Result<(), String> {
        self.available = self.available.checked_add(amount).ok_or_else(|| {
            format!(
                "deposit of {} overflows holding of {} {}",
                amount, self.available, self.ticker
            )
        })?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Remove funds from the available balance
    pub fn withdraw(&mut self, amount: Qty) -> Result<(), String> {
        if amount > self.available {
            return Err(format!(
                "available {} {} is less than {}",
                self.available, self.ticker, amount
            ));
        }
        self.available -= amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Hold funds against a pending order
    pub fn reserve(&mut self, amount: Qty) -> Result<(), String> {
        if amount > self.available {
            return Err(format!(
                "available {} {} is less than {}",
                self.available, self.ticker, amount
            ));
        }
        self.available -= amount;
        self.reserved += amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Return held funds to the available balance (order cancelled or
    /// reservation unused)
    pub fn release(&mut self, amount: Qty) -> Result<(), String> {
        if amount > self.reserved {
            return Err(format!(
                "reserved {} {} is less than {}",
                self.reserved, self.ticker, amount
            ));
        }
        self.reserved -= amount;
        self.available += amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Consume held funds as the debit leg of a settlement
    pub fn debit_reserved(&mut self, amount: Qty) -> Result<(), String> {
        if amount > self.reserved {
            return Err(format!(
                "reserved {} {} is less than {}",
                self.reserved, self.ticker, amount
            ));
        }
        self.reserved -= amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Receive funds as the credit leg of a settlement
    pub fn credit(&mut self, amount: Qty) {
        self.available += amount;
        self.updated_at = Utc::now();
    }
}
