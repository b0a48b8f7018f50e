//! Metapackage tying the exchange services together for integration tests.

pub use common;
pub use ledger;
pub use market_data;
pub use matching_engine;
