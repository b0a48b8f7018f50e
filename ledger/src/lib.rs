//! Balance ledger for user funds and instrument holdings

pub mod repository;
pub mod service;
pub mod users;

pub use repository::{BalanceRepository, InMemoryBalanceRepository};
pub use service::{FillSettlement, LedgerService};
pub use users::UserDirectory;
