//! Channel for market data distribution

use std::collections::HashMap;

use common::model::orderbook::L2Orderbook;
use common::model::transaction::Transaction;
use crossbeam_channel::{self, Receiver, Sender};
use tokio::sync::Mutex;

/// Topic types for market data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Orderbook updates for one ticker
    Orderbook(String),
    /// Transactions for one ticker
    Transactions(String),
    /// All orderbook updates
    AllOrderbooks,
    /// All transactions
    AllTransactions,
}

/// Events published to market data consumers
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// The aggregated book for a ticker changed
    BookUpdate(L2Orderbook),
    /// A fill was recorded
    Transaction(Transaction),
}

/// Market data channel
pub struct MarketDataChannel {
    /// Senders by topic
    senders: Mutex<HashMap<Topic, Vec<Sender<MarketEvent>>>>,
}

impl MarketDataChannel {
    /// Create a new market data channel
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a topic
    pub async fn subscribe(&self, topic: Topic) -> Receiver<MarketEvent> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut senders = self.senders.lock().await;
        senders.entry(topic).or_default().push(sender);
        receiver
    }

    /// Publish an event to a topic and its all-tickers counterpart
    pub async fn publish(&self, topic: Topic, event: MarketEvent) {
        let mut senders = self.senders.lock().await;

        let fan_out = |topic_senders: &mut Vec<Sender<MarketEvent>>, event: &MarketEvent| {
            topic_senders.retain(|sender| sender.send(event.clone()).is_ok());
        };

        if let Some(topic_senders) = senders.get_mut(&topic) {
            fan_out(topic_senders, &event);
        }

        let all_topic = match &topic {
            Topic::Orderbook(_) => Some(Topic::AllOrderbooks),
            Topic::Transactions(_) => Some(Topic::AllTransactions),
            Topic::AllOrderbooks | Topic::AllTransactions => None,
        };
        if let Some(all_topic) = all_topic {
            if let Some(all_senders) = senders.get_mut(&all_topic) {
                fan_out(all_senders, &event);
            }
        }
    }
}

impl Default for MarketDataChannel {
    fn default() -> Self {
        Self::new()
    }
}
