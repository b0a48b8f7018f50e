//! Matching engine: admission, price-time matching, and settlement

pub mod admission;
pub mod config;
pub mod engine;
mod order_book;

pub use config::EngineConfig;
pub use engine::{MatchingEngine, OrderAck, OrderRequest};
pub use order_book::{BookSide, TickerBook};
