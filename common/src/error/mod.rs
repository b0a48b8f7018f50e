//! Error types for the exchange engine
//!
//! This module provides a unified error handling system for all services of
//! the matching and settlement engine. Admission failures are always
//! side-effect free: an order rejected with any of the validation or funds
//! errors below was never created and reserved nothing.

use std::fmt::Display;
use thiserror::Error;

/// Exchange engine error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed order or instrument shape, rejected before any state change
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Referenced instrument does not exist
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    /// Instrument exists but has been deactivated for new orders
    #[error("Instrument inactive: {0}")]
    InstrumentInactive(String),

    /// Reservation failed: the user does not hold the required funds
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Order lookup or cancellation target does not exist
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Cancellation of an order that already reached a terminal status
    #[error("Order already terminal: {0}")]
    AlreadyTerminal(String),

    /// Referenced user does not exist
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// A settlement leg could not complete; the fill was rolled back
    #[error("Settlement failure: {0}")]
    SettlementFailure(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait to add context to error results
pub trait ErrorExt<T> {
    /// Add context information to an error
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T> ErrorExt<T> for Result<T> {
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        self.map_err(|e| {
            let context = context_fn().to_string();
            match e {
                Error::ValidationError(msg) => {
                    Error::ValidationError(format!("{}: {}", context, msg))
                }
                Error::InstrumentNotFound(msg) => {
                    Error::InstrumentNotFound(format!("{}: {}", context, msg))
                }
                Error::InstrumentInactive(msg) => {
                    Error::InstrumentInactive(format!("{}: {}", context, msg))
                }
                Error::InsufficientFunds(msg) => {
                    Error::InsufficientFunds(format!("{}: {}", context, msg))
                }
                Error::OrderNotFound(msg) => Error::OrderNotFound(format!("{}: {}", context, msg)),
                Error::AlreadyTerminal(msg) => {
                    Error::AlreadyTerminal(format!("{}: {}", context, msg))
                }
                Error::UserNotFound(msg) => Error::UserNotFound(format!("{}: {}", context, msg)),
                Error::SettlementFailure(msg) => {
                    Error::SettlementFailure(format!("{}: {}", context, msg))
                }
                Error::Internal(msg) => Error::Internal(format!("{}: {}", context, msg)),
                Error::Serialization(e) => Error::Serialization(e),
            }
        })
    }
}

/// Convert string messages into an error
impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Internal(message)
    }
}

/// Convert static string references into an error
impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Internal(message.to_string())
    }
}
