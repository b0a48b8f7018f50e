//! The matching engine: admission, per-ticker matching, settlement

use std::sync::Arc;

use common::error::{Error, Result};
use common::model::instrument::Instrument;
use common::model::order::{Direction, Order, OrderStatus, OrderType};
use common::model::transaction::Transaction;
use common::units::{Cash, Price, Qty};
use dashmap::DashMap;
use ledger::{FillSettlement, LedgerService};
use market_data::MarketDataService;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::admission;
use crate::config::EngineConfig;
use crate::order_book::TickerBook;

/// Submitted order parameters, before validation
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Submitting user
    pub user_id: Uuid,
    /// Instrument ticker
    pub ticker: String,
    /// Buy or sell
    pub direction: Direction,
    /// Limit or market
    pub order_type: OrderType,
    /// Limit price; required iff `order_type` is `Limit`
    pub price: Option<Price>,
    /// Quantity, >= 1
    pub qty: Qty,
    /// Settlement currency; defaults to the engine's default currency
    pub currency: Option<String>,
}

/// Result of order admission and matching
#[derive(Debug, Clone)]
pub struct OrderAck {
    /// Assigned order ID
    pub order_id: Uuid,
    /// Status after matching completed
    pub status: OrderStatus,
    /// Quantity filled during the immediate matching pass
    pub filled_qty: Qty,
    /// Fills produced by the immediate matching pass
    pub transactions: Vec<Transaction>,
}

/// The matching engine
///
/// One book per ticker behind its own lock: all admission, matching and
/// cancellation for a ticker observe a single total order, while independent
/// tickers process concurrently.
pub struct MatchingEngine {
    /// Registered instruments by ticker
    instruments: DashMap<String, Instrument>,
    /// Order books by ticker
    books: DashMap<String, Arc<Mutex<TickerBook>>>,
    /// Every admitted order by ID, resting or terminal
    orders: DashMap<Uuid, Order>,
    /// Balance ledger
    ledger: Arc<LedgerService>,
    /// Orderbook projection and transaction stream
    market_data: Arc<MarketDataService>,
    /// Engine configuration
    config: EngineConfig,
}

impl MatchingEngine {
    /// Create a new matching engine
    pub fn new(ledger: Arc<LedgerService>, market_data: Arc<MarketDataService>) -> Self {
        Self::with_config(ledger, market_data, EngineConfig::default())
    }

    /// Create a new matching engine with a specific configuration
    pub fn with_config(
        ledger: Arc<LedgerService>,
        market_data: Arc<MarketDataService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            instruments: DashMap::new(),
            books: DashMap::new(),
            orders: DashMap::new(),
            ledger,
            market_data,
            config,
        }
    }

    /// Register a new tradable instrument and open its book
    ///
    /// Tickers are unique: re-registration is rejected so an existing book
    /// and its resting orders are never replaced.
    pub fn register_instrument(
        &self,
        ticker: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Instrument> {
        let instrument = Instrument::new(ticker, name)?;
        if self.instruments.contains_key(&instrument.ticker) {
            return Err(Error::ValidationError(format!(
                "instrument {} already exists",
                instrument.ticker
            )));
        }
        info!("Registering instrument {}", instrument.ticker);
        self.books.insert(
            instrument.ticker.clone(),
            Arc::new(Mutex::new(TickerBook::new(
                instrument.ticker.clone(),
                self.config.default_currency.clone(),
            ))),
        );
        self.instruments
            .insert(instrument.ticker.clone(), instrument.clone());
        Ok(instrument)
    }

    /// Retire an instrument from new order admission
    ///
    /// Resting orders stay cancellable and balances are untouched;
    /// instruments referenced by orders or transactions are never deleted.
    pub fn deactivate_instrument(&self, ticker: &str) -> Result<Instrument> {
        let mut entry = self.instruments.get_mut(ticker).ok_or_else(|| {
            Error::InstrumentNotFound(format!("instrument {} does not exist", ticker))
        })?;
        entry.is_active = false;
        info!("Deactivated instrument {}", ticker);
        Ok(entry.clone())
    }

    /// Look up an instrument
    pub fn instrument(&self, ticker: &str) -> Option<Instrument> {
        self.instruments.get(ticker).map(|i| i.clone())
    }

    /// List instruments, optionally filtered to active ones
    pub fn instruments(&self, active_only: bool) -> Vec<Instrument> {
        self.instruments
            .iter()
            .filter(|entry| !active_only || entry.value().is_active)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Get an order by ID
    pub fn get_order(&self, order_id: Uuid) -> Option<Order> {
        self.orders.get(&order_id).map(|o| o.clone())
    }

    /// Get all orders submitted by a user
    pub fn orders_for_user(&self, user_id: Uuid) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Admit and match an incoming order.
    ///
    /// Validation and reservation happen before the order exists; a rejected
    /// admission is fully side-effect free. On success the order is created
    /// with status `New` and matched immediately under the ticker lock.
    pub async fn submit_order(&self, request: OrderRequest) -> Result<OrderAck> {
        let order = self.build_order(request)?;

        let instrument = self.instruments.get(&order.ticker).ok_or_else(|| {
            Error::InstrumentNotFound(format!("instrument {} does not exist", order.ticker))
        })?;
        if !instrument.is_active {
            return Err(Error::InstrumentInactive(format!(
                "instrument {} is not active",
                order.ticker
            )));
        }
        drop(instrument);

        let book = self
            .books
            .get(&order.ticker)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                Error::InstrumentNotFound(format!("no book for ticker {}", order.ticker))
            })?;

        // Admission and matching form one critical section per ticker.
        let mut book = book.lock().await;
        if order.currency != book.currency {
            return Err(Error::ValidationError(format!(
                "instrument {} settles in {}, order is in {}",
                order.ticker, book.currency, order.currency
            )));
        }

        let plan = admission::reserve_plan(&order, &book)?;
        self.ledger
            .reserve(order.user_id, &plan.asset, plan.amount)
            .await?;

        debug!(
            "Admitted order {}: {:?} {:?} {} x {:?} {}",
            order.id, order.direction, order.order_type, order.qty, order.price, order.ticker
        );
        self.orders.insert(order.id, order.clone());

        let ack = self.match_order(order, plan.amount, &mut book).await;
        self.refresh_projection(&book).await;
        ack
    }

    fn build_order(&self, request: OrderRequest) -> Result<Order> {
        let currency = request
            .currency
            .unwrap_or_else(|| self.config.default_currency.clone());
        match request.order_type {
            OrderType::Limit => {
                let price = request.price.ok_or_else(|| {
                    Error::ValidationError("limit order requires a price".to_string())
                })?;
                Order::new_limit(
                    request.user_id,
                    request.ticker,
                    request.direction,
                    price,
                    request.qty,
                    currency,
                )
            }
            OrderType::Market => {
                if request.price.is_some() {
                    return Err(Error::ValidationError(
                        "market order must not carry a price".to_string(),
                    ));
                }
                Order::new_market(
                    request.user_id,
                    request.ticker,
                    request.direction,
                    request.qty,
                    currency,
                )
            }
        }
    }

    /// The matching loop of one incoming order.
    ///
    /// `reserved` is the admission reservation (cash for buys, quantity for
    /// sells); the unused portion is released when the order terminates
    /// without resting.
    async fn match_order(
        &self,
        mut order: Order,
        reserved: Qty,
        book: &mut TickerBook,
    ) -> Result<OrderAck> {
        let mut transactions = Vec::new();
        let mut spent: Cash = 0;

        while order.remaining() > 0 {
            let Some(best) = book.best_opposite(order.direction) else {
                break;
            };
            if !crosses(&order, best) {
                break;
            }

            let opposite = book.side_mut(order.direction.opposite());
            let maker = opposite
                .front(best)
                .cloned()
                .ok_or_else(|| Error::Internal(format!("empty best level at {}", best)))?;
            let trade_qty = order.remaining().min(maker.remaining());

            // Trade executes at the resting order's price: price improvement
            // favors the maker side.
            let trade_price = best;
            let (buyer, seller) = match order.direction {
                Direction::Buy => (order.user_id, maker.user_id),
                Direction::Sell => (maker.user_id, order.user_id),
            };
            let fill = FillSettlement {
                buyer,
                seller,
                ticker: book.ticker.clone(),
                currency: book.currency.clone(),
                price: trade_price,
                qty: trade_qty,
            };

            // Settle before mutating either order: a failed fill leaves both
            // in their pre-fill state.
            if let Err(e) = self.ledger.settle_fill(&fill).await {
                error!(
                    "Fill of {} x {} between orders {} and {} rejected: {}",
                    trade_qty, book.ticker, order.id, maker.id, e
                );
                break;
            }

            order.apply_fill(trade_qty)?;
            let maker_after = book
                .side_mut(order.direction.opposite())
                .fill_front(trade_price, trade_qty)?;
            self.orders.insert(maker_after.id, maker_after.clone());
            book.last_price = Some(trade_price);
            spent += fill.cash();

            // A buy taker filled below its limit spends less cash than was
            // reserved for these units; return the difference at once.
            if order.direction == Direction::Buy {
                if let Some(limit) = order.price {
                    let delta = (limit - trade_price) * trade_qty;
                    self.ledger
                        .release(order.user_id, &order.currency, delta)
                        .await?;
                    spent += delta;
                }
            }

            let (buy_order_id, sell_order_id) = match order.direction {
                Direction::Buy => (order.id, maker_after.id),
                Direction::Sell => (maker_after.id, order.id),
            };
            let transaction = Transaction::new(
                buy_order_id,
                sell_order_id,
                book.ticker.clone(),
                trade_price,
                trade_qty,
                book.currency.clone(),
            );
            self.market_data.record_transaction(transaction.clone()).await;
            transactions.push(transaction);
        }

        if order.remaining() > 0 {
            match order.order_type {
                OrderType::Limit => {
                    // The remainder rests at its price, FIFO behind any
                    // existing orders at that level; its reservation stays.
                    debug!("Order {} rests with {} remaining", order.id, order.remaining());
                    book.insert(order.clone());
                }
                OrderType::Market => {
                    // Market orders never rest: the unfilled remainder is
                    // system-cancelled and its reservation released.
                    order.cancel(OrderStatus::SystemCancelled);
                    let leftover = match order.direction {
                        Direction::Buy => reserved - spent,
                        Direction::Sell => order.remaining(),
                    };
                    let asset = match order.direction {
                        Direction::Buy => order.currency.clone(),
                        Direction::Sell => order.ticker.clone(),
                    };
                    self.ledger.release(order.user_id, &asset, leftover).await?;
                    debug!(
                        "Market order {} terminated with {} unfilled",
                        order.id,
                        order.remaining()
                    );
                }
            }
        } else if order.direction == Direction::Buy && reserved > spent {
            // Fully filled buy with reservation residue (market order whose
            // sweep estimate exceeded actual spend).
            self.ledger
                .release(order.user_id, &order.currency, reserved - spent)
                .await?;
        }

        self.orders.insert(order.id, order.clone());
        Ok(OrderAck {
            order_id: order.id,
            status: order.status,
            filled_qty: order.filled_qty,
            transactions,
        })
    }

    /// Cancel a resting order.
    ///
    /// The request is serialized into the same per-ticker sequence as
    /// incoming orders, so it cannot race an in-flight match for the order.
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order> {
        let known = self
            .get_order(order_id)
            .ok_or_else(|| Error::OrderNotFound(format!("order {} does not exist", order_id)))?;
        if known.is_terminal() {
            return Err(Error::AlreadyTerminal(format!(
                "order {} is already {:?}",
                order_id, known.status
            )));
        }

        let book = self
            .books
            .get(&known.ticker)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                Error::InstrumentNotFound(format!("no book for ticker {}", known.ticker))
            })?;
        let mut book = book.lock().await;

        // Re-read under the lock: the order may have filled while the cancel
        // request waited its turn.
        let current = self
            .get_order(order_id)
            .ok_or_else(|| Error::OrderNotFound(format!("order {} does not exist", order_id)))?;
        if current.is_terminal() {
            return Err(Error::AlreadyTerminal(format!(
                "order {} is already {:?}",
                order_id, current.status
            )));
        }

        let mut removed = book.remove(order_id, current.direction).ok_or_else(|| {
            Error::Internal(format!("open order {} missing from its book", order_id))
        })?;

        // Return the unfilled portion of the reservation.
        let (asset, amount) = match removed.direction {
            Direction::Buy => {
                let price = removed.price.ok_or_else(|| {
                    Error::Internal(format!("resting order {} has no price", order_id))
                })?;
                (removed.currency.clone(), price * removed.remaining())
            }
            Direction::Sell => (removed.ticker.clone(), removed.remaining()),
        };
        self.ledger.release(removed.user_id, &asset, amount).await?;

        removed.cancel(OrderStatus::Cancelled);
        self.orders.insert(removed.id, removed.clone());
        info!("Cancelled order {} with {} unfilled", order_id, removed.remaining());

        self.refresh_projection(&book).await;
        Ok(removed)
    }

    /// Push the aggregated view of a book to the projection
    async fn refresh_projection(&self, book: &TickerBook) {
        let depth = self.config.projection_depth;
        self.market_data
            .apply_book_update(
                &book.ticker,
                &book.currency,
                book.bid_levels(depth),
                book.ask_levels(depth),
            )
            .await;
    }
}

/// A limit buy crosses when the best ask is at or below its price, a limit
/// sell when the best bid is at or above; market orders always cross.
fn crosses(order: &Order, best_opposite: Price) -> bool {
    match (order.order_type, order.direction) {
        (OrderType::Market, _) => true,
        (OrderType::Limit, Direction::Buy) => {
            order.price.map_or(false, |p| p >= best_opposite)
        }
        (OrderType::Limit, Direction::Sell) => {
            order.price.map_or(false, |p| p <= best_opposite)
        }
    }
}
