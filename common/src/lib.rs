//! Common types and utilities for the exchange engine
//!
//! This library contains the shared types used across all services of the
//! matching and settlement engine. It provides a unified approach to error
//! handling, monetary units, and domain models.

pub mod error;
pub mod model;
pub mod units;

/// Re-export important types
pub use error::{Error, ErrorExt, Result};
pub use units::*;
