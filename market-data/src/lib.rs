//! Orderbook projection and transaction stream for external consumers

pub mod channel;
mod service;

pub use channel::{MarketDataChannel, MarketEvent, Topic};
pub use service::MarketDataService;
