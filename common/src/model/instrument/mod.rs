//! Instrument models and ticker/currency validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default settlement currency
pub const DEFAULT_CURRENCY: &str = "RUB";

/// Validate a ticker against the `^[A-Z]{2,10}$` format.
pub fn validate_ticker(ticker: &str) -> Result<()> {
    let valid = (2..=10).contains(&ticker.len())
        && ticker.bytes().all(|b| b.is_ascii_uppercase());
    if valid {
        Ok(())
    } else {
        Err(Error::ValidationError(format!(
            "ticker must match [A-Z]{{2,10}}: {:?}",
            ticker
        )))
    }
}

/// Validate a currency code against the `^[A-Z]{3}$` format.
pub fn validate_currency(currency: &str) -> Result<()> {
    let valid = currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_uppercase());
    if valid {
        Ok(())
    } else {
        Err(Error::ValidationError(format!(
            "currency must be a 3-letter uppercase code: {:?}",
            currency
        )))
    }
}

/// Tradable instrument
///
/// Instruments are never deleted while orders or balances reference them;
/// deactivation retires them from new order admission instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    /// Unique ticker, `[A-Z]{2,10}`
    pub ticker: String,
    /// Display name
    pub name: String,
    /// Whether new orders may reference this instrument
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Instrument {
    /// Create a new active instrument, validating the ticker format.
    pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let ticker = ticker.into();
        let name = name.into();
        validate_ticker(&ticker)?;
        if name.is_empty() || name.len() > 100 {
            return Err(Error::ValidationError(format!(
                "instrument name must be 1..=100 characters, got {}",
                name.len()
            )));
        }
        Ok(Self {
            ticker,
            name,
            is_active: true,
            created_at: Utc::now(),
        })
    }
}
