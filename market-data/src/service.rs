//! Market data service implementation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::model::order::Direction;
use common::model::orderbook::{BookRow, L2Orderbook, Level};
use common::model::transaction::Transaction;
use dashmap::DashMap;
use tracing::debug;

use crate::channel::{MarketDataChannel, MarketEvent, Topic};

/// Depth cap on orderbook reads
const MAX_DEPTH: usize = 25;

/// History cap on transaction reads and retention
const MAX_TRANSACTIONS: usize = 100;

/// Aggregated two-sided depth of one ticker
#[derive(Debug, Clone)]
struct TickerDepth {
    currency: String,
    bids: Vec<Level>,
    asks: Vec<Level>,
    updated_at: DateTime<Utc>,
}

/// Read model over order book state and the fill stream
///
/// Everything here is derived from engine pushes; the service never
/// originates a mutation of book or ledger state.
pub struct MarketDataService {
    /// Pub/sub channel for external consumers
    channel: Arc<MarketDataChannel>,
    /// Latest aggregated depth per ticker
    depths: DashMap<String, TickerDepth>,
    /// Recent transactions per ticker, newest first
    recent_transactions: DashMap<String, Vec<Transaction>>,
}

impl MarketDataService {
    /// Create a new market data service
    pub fn new() -> Self {
        Self {
            channel: Arc::new(MarketDataChannel::new()),
            depths: DashMap::new(),
            recent_transactions: DashMap::new(),
        }
    }

    /// Get the market data channel
    pub fn channel(&self) -> Arc<MarketDataChannel> {
        self.channel.clone()
    }

    /// Replace the aggregate rows of a ticker with a fresh book snapshot
    ///
    /// Levels arrive best-first and already exclude zero quantities, so a
    /// level that emptied since the last push simply disappears from the
    /// projection.
    pub async fn apply_book_update(
        &self,
        ticker: &str,
        currency: &str,
        bids: Vec<Level>,
        asks: Vec<Level>,
    ) {
        debug!(
            "Book update for {}: {} bid levels, {} ask levels",
            ticker,
            bids.len(),
            asks.len()
        );
        let depth = TickerDepth {
            currency: currency.to_string(),
            bids,
            asks,
            updated_at: Utc::now(),
        };
        self.depths.insert(ticker.to_string(), depth.clone());

        self.channel
            .publish(
                Topic::Orderbook(ticker.to_string()),
                MarketEvent::BookUpdate(L2Orderbook {
                    ticker: ticker.to_string(),
                    bid_levels: depth.bids,
                    ask_levels: depth.asks,
                }),
            )
            .await;
    }

    /// Aggregated two-sided book for a ticker, best levels first
    pub fn l2_orderbook(&self, ticker: &str, limit: usize) -> Option<L2Orderbook> {
        let limit = limit.min(MAX_DEPTH);
        self.depths.get(ticker).map(|depth| L2Orderbook {
            ticker: ticker.to_string(),
            bid_levels: depth.bids.iter().take(limit).copied().collect(),
            ask_levels: depth.asks.iter().take(limit).copied().collect(),
        })
    }

    /// Aggregate rows for a ticker, keyed by (ticker, price, side, currency)
    pub fn book_rows(&self, ticker: &str) -> Vec<BookRow> {
        let Some(depth) = self.depths.get(ticker) else {
            return Vec::new();
        };
        let row = |side: Direction, level: &Level| BookRow {
            ticker: ticker.to_string(),
            price: level.price,
            side,
            currency: depth.currency.clone(),
            qty: level.qty,
        };
        depth
            .bids
            .iter()
            .map(|level| row(Direction::Buy, level))
            .chain(depth.asks.iter().map(|level| row(Direction::Sell, level)))
            .collect()
    }

    /// Time of the last book update for a ticker
    pub fn last_update(&self, ticker: &str) -> Option<DateTime<Utc>> {
        self.depths.get(ticker).map(|depth| depth.updated_at)
    }

    /// Record a fill and publish it on the transaction stream
    pub async fn record_transaction(&self, transaction: Transaction) {
        let ticker = transaction.ticker.clone();
        {
            let mut recent = self.recent_transactions.entry(ticker.clone()).or_default();
            recent.insert(0, transaction.clone());
            recent.truncate(MAX_TRANSACTIONS);
        }
        self.channel
            .publish(
                Topic::Transactions(ticker),
                MarketEvent::Transaction(transaction),
            )
            .await;
    }

    /// Recent transactions for a ticker, newest first
    pub fn transactions(&self, ticker: &str, limit: usize) -> Vec<Transaction> {
        let limit = limit.min(MAX_TRANSACTIONS);
        self.recent_transactions
            .get(ticker)
            .map(|recent| recent.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MarketDataService {
    fn default() -> Self {
        Self::new()
    }
}
