//! Domain models for the exchange engine

pub mod balance;
pub mod instrument;
pub mod order;
pub mod orderbook;
pub mod transaction;
pub mod user;
