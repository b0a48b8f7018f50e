//! Configuration for the matching engine

use std::env;

/// Configuration for the matching engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Settlement currency for newly registered instruments
    pub default_currency: String,
    /// Number of price levels pushed to the orderbook projection
    pub projection_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "RUB".to_string()),
            projection_depth: env::var("PROJECTION_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(25),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration using environment variables
    pub fn from_env() -> Self {
        Self::default()
    }
}
