use std::sync::Arc;

use common::error::Error;
use common::model::order::{Direction, OrderStatus, OrderType};
use common::units::{Price, Qty};
use ledger::LedgerService;
use market_data::MarketDataService;
use matching_engine::{MatchingEngine, OrderRequest};
use uuid::Uuid;

fn engine() -> (Arc<LedgerService>, Arc<MarketDataService>, MatchingEngine) {
    let ledger = Arc::new(LedgerService::new());
    let market_data = Arc::new(MarketDataService::new());
    let engine = MatchingEngine::new(ledger.clone(), market_data.clone());
    engine.register_instrument("MEMCOIN", "Meme Coin").unwrap();
    (ledger, market_data, engine)
}

fn limit(user: Uuid, direction: Direction, price: Price, qty: Qty) -> OrderRequest {
    OrderRequest {
        user_id: user,
        ticker: "MEMCOIN".to_string(),
        direction,
        order_type: OrderType::Limit,
        price: Some(price),
        qty,
        currency: None,
    }
}

fn market(user: Uuid, direction: Direction, qty: Qty) -> OrderRequest {
    OrderRequest {
        user_id: user,
        ticker: "MEMCOIN".to_string(),
        direction,
        order_type: OrderType::Market,
        price: None,
        qty,
        currency: None,
    }
}

async fn fund(ledger: &LedgerService, user: Uuid, asset: &str, amount: Qty) {
    ledger.deposit(user, asset, amount).await.unwrap();
}

#[tokio::test]
async fn exact_limit_match_settles_both_sides() {
    let (ledger, _, engine) = engine();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    fund(&ledger, alice, "RUB", 1000).await;
    fund(&ledger, bob, "MEMCOIN", 10).await;

    let buy = engine
        .submit_order(limit(alice, Direction::Buy, 100, 10))
        .await
        .unwrap();
    assert_eq!(buy.status, OrderStatus::New);
    assert!(buy.transactions.is_empty());

    let sell = engine
        .submit_order(limit(bob, Direction::Sell, 100, 10))
        .await
        .unwrap();
    assert_eq!(sell.status, OrderStatus::Executed);
    assert_eq!(sell.filled_qty, 10);
    assert_eq!(sell.transactions.len(), 1);

    let tx = &sell.transactions[0];
    assert_eq!(tx.price, 100);
    assert_eq!(tx.qty, 10);
    assert_eq!(tx.currency, "RUB");

    // Both orders terminal, balances settled
    let buy_order = engine.get_order(buy.order_id).unwrap();
    assert_eq!(buy_order.status, OrderStatus::Executed);

    assert_eq!(ledger.balance(alice, "MEMCOIN").await.unwrap().unwrap().available, 10);
    assert_eq!(ledger.balance(alice, "RUB").await.unwrap().unwrap().amount(), 0);
    assert_eq!(ledger.balance(bob, "RUB").await.unwrap().unwrap().available, 1000);
    assert_eq!(ledger.balance(bob, "MEMCOIN").await.unwrap().unwrap().amount(), 0);
}

#[tokio::test]
async fn partial_fill_leaves_remainder_resting() {
    let (ledger, _, engine) = engine();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    fund(&ledger, alice, "RUB", 1000).await;
    fund(&ledger, bob, "MEMCOIN", 4).await;

    engine
        .submit_order(limit(alice, Direction::Buy, 100, 10))
        .await
        .unwrap();
    let sell = engine
        .submit_order(limit(bob, Direction::Sell, 100, 4))
        .await
        .unwrap();
    assert_eq!(sell.status, OrderStatus::Executed);

    let buy_orders = engine.orders_for_user(alice);
    assert_eq!(buy_orders.len(), 1);
    let buy = &buy_orders[0];
    assert_eq!(buy.status, OrderStatus::PartiallyExecuted);
    assert_eq!(buy.filled_qty, 4);
    assert!(buy.filled_qty <= buy.qty);

    // 600 RUB still reserved for the open remainder
    assert_eq!(ledger.balance(alice, "RUB").await.unwrap().unwrap().reserved, 600);
}

#[tokio::test]
async fn price_time_priority_within_a_level() {
    let (ledger, _, engine) = engine();
    let first_seller = Uuid::new_v4();
    let second_seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    fund(&ledger, first_seller, "MEMCOIN", 5).await;
    fund(&ledger, second_seller, "MEMCOIN", 5).await;
    fund(&ledger, buyer, "RUB", 500).await;

    let first = engine
        .submit_order(limit(first_seller, Direction::Sell, 100, 5))
        .await
        .unwrap();
    let second = engine
        .submit_order(limit(second_seller, Direction::Sell, 100, 5))
        .await
        .unwrap();

    // A buy for 5 at the level must consume the earlier sell entirely.
    engine
        .submit_order(limit(buyer, Direction::Buy, 100, 5))
        .await
        .unwrap();

    assert_eq!(engine.get_order(first.order_id).unwrap().status, OrderStatus::Executed);
    assert_eq!(engine.get_order(second.order_id).unwrap().status, OrderStatus::New);
}

#[tokio::test]
async fn better_priced_opposite_matches_first() {
    let (ledger, _, engine) = engine();
    let cheap = Uuid::new_v4();
    let dear = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    fund(&ledger, cheap, "MEMCOIN", 5).await;
    fund(&ledger, dear, "MEMCOIN", 5).await;
    fund(&ledger, buyer, "RUB", 1000).await;

    let dear_ack = engine
        .submit_order(limit(dear, Direction::Sell, 110, 5))
        .await
        .unwrap();
    let cheap_ack = engine
        .submit_order(limit(cheap, Direction::Sell, 100, 5))
        .await
        .unwrap();

    let buy = engine
        .submit_order(limit(buyer, Direction::Buy, 110, 5))
        .await
        .unwrap();

    // Lower ask wins even though it arrived later.
    assert_eq!(engine.get_order(cheap_ack.order_id).unwrap().status, OrderStatus::Executed);
    assert_eq!(engine.get_order(dear_ack.order_id).unwrap().status, OrderStatus::New);
    assert_eq!(buy.transactions[0].price, 100);
}

#[tokio::test]
async fn taker_pays_maker_price_and_excess_reservation_returns() {
    let (ledger, _, engine) = engine();
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    fund(&ledger, seller, "MEMCOIN", 10).await;
    fund(&ledger, buyer, "RUB", 1100).await;

    engine
        .submit_order(limit(seller, Direction::Sell, 100, 10))
        .await
        .unwrap();
    let buy = engine
        .submit_order(limit(buyer, Direction::Buy, 110, 10))
        .await
        .unwrap();

    // Fill at the resting price, never above the buyer's limit.
    assert_eq!(buy.transactions[0].price, 100);
    assert_eq!(buy.status, OrderStatus::Executed);

    // Buyer spent 1000 of the 1100 reserved; the difference is available again.
    let cash = ledger.balance(buyer, "RUB").await.unwrap().unwrap();
    assert_eq!(cash.available, 100);
    assert_eq!(cash.reserved, 0);
}

#[tokio::test]
async fn market_buy_sweeps_the_ladder() {
    let (ledger, _, engine) = engine();
    let maker_a = Uuid::new_v4();
    let maker_b = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    fund(&ledger, maker_a, "MEMCOIN", 2).await;
    fund(&ledger, maker_b, "MEMCOIN", 10).await;
    fund(&ledger, buyer, "RUB", 53).await;

    engine
        .submit_order(limit(maker_a, Direction::Sell, 10, 2))
        .await
        .unwrap();
    engine
        .submit_order(limit(maker_b, Direction::Sell, 11, 10))
        .await
        .unwrap();

    let buy = engine.submit_order(market(buyer, Direction::Buy, 5)).await.unwrap();
    assert_eq!(buy.status, OrderStatus::Executed);
    assert_eq!(buy.filled_qty, 5);
    assert_eq!(buy.transactions.len(), 2);
    assert_eq!((buy.transactions[0].price, buy.transactions[0].qty), (10, 2));
    assert_eq!((buy.transactions[1].price, buy.transactions[1].qty), (11, 3));

    let cash = ledger.balance(buyer, "RUB").await.unwrap().unwrap();
    assert_eq!(cash.amount(), 0);
    assert_eq!(ledger.balance(buyer, "MEMCOIN").await.unwrap().unwrap().available, 5);
}

#[tokio::test]
async fn market_order_never_rests() {
    let (ledger, _, engine) = engine();
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    fund(&ledger, seller, "MEMCOIN", 3).await;
    fund(&ledger, buyer, "RUB", 1000).await;

    engine
        .submit_order(limit(seller, Direction::Sell, 100, 3))
        .await
        .unwrap();

    // Wants 5, only 3 available: fills 3, remainder system-cancelled.
    let buy = engine.submit_order(market(buyer, Direction::Buy, 5)).await.unwrap();
    assert_eq!(buy.status, OrderStatus::SystemCancelled);
    assert_eq!(buy.filled_qty, 3);

    // Nothing left reserved and nothing resting on the bid side.
    let cash = ledger.balance(buyer, "RUB").await.unwrap().unwrap();
    assert_eq!(cash.reserved, 0);
    assert_eq!(cash.available, 700);
}

#[tokio::test]
async fn market_order_against_empty_book_is_system_cancelled() {
    let (ledger, _, engine) = engine();
    let buyer = Uuid::new_v4();
    fund(&ledger, buyer, "RUB", 1000).await;

    let buy = engine.submit_order(market(buyer, Direction::Buy, 5)).await.unwrap();
    assert_eq!(buy.status, OrderStatus::SystemCancelled);
    assert_eq!(buy.filled_qty, 0);
    assert!(buy.transactions.is_empty());

    let cash = ledger.balance(buyer, "RUB").await.unwrap().unwrap();
    assert_eq!(cash.available, 1000);
    assert_eq!(cash.reserved, 0);
}

#[tokio::test]
async fn resting_sell_appears_in_projection() {
    let (ledger, market_data, engine) = engine();
    let seller = Uuid::new_v4();
    fund(&ledger, seller, "MEMCOIN", 5).await;

    let ack = engine
        .submit_order(limit(seller, Direction::Sell, 50, 5))
        .await
        .unwrap();
    assert_eq!(ack.status, OrderStatus::New);

    let book = market_data.l2_orderbook("MEMCOIN", 10).unwrap();
    assert!(book.bid_levels.is_empty());
    assert_eq!(book.ask_levels.len(), 1);
    assert_eq!(book.ask_levels[0].price, 50);
    assert_eq!(book.ask_levels[0].qty, 5);
}

#[tokio::test]
async fn cancel_releases_reservation_and_is_not_repeatable() {
    let (ledger, market_data, engine) = engine();
    let alice = Uuid::new_v4();
    fund(&ledger, alice, "RUB", 1000).await;

    let ack = engine
        .submit_order(limit(alice, Direction::Buy, 100, 10))
        .await
        .unwrap();
    assert_eq!(ledger.balance(alice, "RUB").await.unwrap().unwrap().reserved, 1000);

    let cancelled = engine.cancel_order(ack.order_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(ledger.balance(alice, "RUB").await.unwrap().unwrap().available, 1000);

    // Level is gone from the projection
    let book = market_data.l2_orderbook("MEMCOIN", 10).unwrap();
    assert!(book.bid_levels.is_empty());

    // Cancelling again changes nothing
    match engine.cancel_order(ack.order_id).await {
        Err(Error::AlreadyTerminal(_)) => {}
        other => panic!("expected AlreadyTerminal, got {:?}", other.map(|o| o.status)),
    }
    assert_eq!(ledger.balance(alice, "RUB").await.unwrap().unwrap().available, 1000);
}

#[tokio::test]
async fn cancel_unknown_order_is_an_error() {
    let (_, _, engine) = engine();
    assert!(matches!(
        engine.cancel_order(Uuid::new_v4()).await,
        Err(Error::OrderNotFound(_))
    ));
}

#[tokio::test]
async fn cancel_partially_executed_releases_only_the_remainder() {
    let (ledger, _, engine) = engine();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    fund(&ledger, alice, "RUB", 1000).await;
    fund(&ledger, bob, "MEMCOIN", 4).await;

    let buy = engine
        .submit_order(limit(alice, Direction::Buy, 100, 10))
        .await
        .unwrap();
    engine
        .submit_order(limit(bob, Direction::Sell, 100, 4))
        .await
        .unwrap();

    let cancelled = engine.cancel_order(buy.order_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.filled_qty, 4);

    // The 4 filled units were spent; the remaining 600 RUB comes back.
    let cash = ledger.balance(alice, "RUB").await.unwrap().unwrap();
    assert_eq!(cash.available, 600);
    assert_eq!(cash.reserved, 0);
    assert_eq!(ledger.balance(alice, "MEMCOIN").await.unwrap().unwrap().available, 4);
}

#[tokio::test]
async fn admission_requires_funds() {
    let (ledger, _, engine) = engine();
    let alice = Uuid::new_v4();
    fund(&ledger, alice, "RUB", 999).await;

    let result = engine.submit_order(limit(alice, Direction::Buy, 100, 10)).await;
    assert!(matches!(result, Err(Error::InsufficientFunds(_))));

    // No order was created and nothing was reserved.
    assert!(engine.orders_for_user(alice).is_empty());
    let cash = ledger.balance(alice, "RUB").await.unwrap().unwrap();
    assert_eq!(cash.available, 999);
    assert_eq!(cash.reserved, 0);
}

#[tokio::test]
async fn sell_admission_requires_the_instrument() {
    let (ledger, _, engine) = engine();
    let bob = Uuid::new_v4();
    fund(&ledger, bob, "MEMCOIN", 3).await;

    let result = engine.submit_order(limit(bob, Direction::Sell, 100, 4)).await;
    assert!(matches!(result, Err(Error::InsufficientFunds(_))));
    assert!(engine.orders_for_user(bob).is_empty());
}

#[tokio::test]
async fn duplicate_instrument_registration_leaves_the_book_intact() {
    let (ledger, _, engine) = engine();
    let seller = Uuid::new_v4();
    fund(&ledger, seller, "MEMCOIN", 5).await;

    let ack = engine
        .submit_order(limit(seller, Direction::Sell, 50, 5))
        .await
        .unwrap();
    assert_eq!(ack.status, OrderStatus::New);

    assert!(matches!(
        engine.register_instrument("MEMCOIN", "Meme Coin Again"),
        Err(Error::ValidationError(_))
    ));

    // The resting order survived and its reservation is still releasable.
    let cancelled = engine.cancel_order(ack.order_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let coin = ledger.balance(seller, "MEMCOIN").await.unwrap().unwrap();
    assert_eq!(coin.reserved, 0);
    assert_eq!(coin.available, 5);
}

#[tokio::test]
async fn inactive_instrument_rejects_new_orders() {
    let (ledger, _, engine) = engine();
    let alice = Uuid::new_v4();
    fund(&ledger, alice, "RUB", 1000).await;

    engine.deactivate_instrument("MEMCOIN").unwrap();
    let result = engine.submit_order(limit(alice, Direction::Buy, 100, 10)).await;
    assert!(matches!(result, Err(Error::InstrumentInactive(_))));
}

#[tokio::test]
async fn unknown_instrument_rejects_new_orders() {
    let (_, _, engine) = engine();
    let mut request = limit(Uuid::new_v4(), Direction::Buy, 100, 10);
    request.ticker = "NOSUCH".to_string();
    assert!(matches!(
        engine.submit_order(request).await,
        Err(Error::InstrumentNotFound(_))
    ));
}

#[tokio::test]
async fn malformed_orders_are_rejected_before_any_state_change() {
    let (ledger, _, engine) = engine();
    let alice = Uuid::new_v4();
    fund(&ledger, alice, "RUB", 1000).await;

    // Limit without a price
    let mut no_price = limit(alice, Direction::Buy, 100, 10);
    no_price.price = None;
    assert!(matches!(
        engine.submit_order(no_price).await,
        Err(Error::ValidationError(_))
    ));

    // Market with a price
    let mut priced_market = market(alice, Direction::Buy, 10);
    priced_market.price = Some(100);
    assert!(matches!(
        engine.submit_order(priced_market).await,
        Err(Error::ValidationError(_))
    ));

    // Zero quantity
    let zero_qty = limit(alice, Direction::Buy, 100, 0);
    assert!(matches!(
        engine.submit_order(zero_qty).await,
        Err(Error::ValidationError(_))
    ));

    assert!(engine.orders_for_user(alice).is_empty());
    assert_eq!(ledger.balance(alice, "RUB").await.unwrap().unwrap().reserved, 0);
}

#[tokio::test]
async fn instrument_quantity_is_conserved_across_fills() {
    let (ledger, _, engine) = engine();
    let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    for user in &users {
        fund(&ledger, *user, "RUB", 10_000).await;
        fund(&ledger, *user, "MEMCOIN", 100).await;
    }

    engine.submit_order(limit(users[0], Direction::Sell, 100, 30)).await.unwrap();
    engine.submit_order(limit(users[1], Direction::Sell, 101, 30)).await.unwrap();
    engine.submit_order(limit(users[2], Direction::Buy, 101, 50)).await.unwrap();
    engine.submit_order(market(users[3], Direction::Sell, 10)).await.unwrap();

    let mut total = 0;
    for user in &users {
        total += ledger
            .balance(*user, "MEMCOIN")
            .await
            .unwrap()
            .map(|b| b.amount())
            .unwrap_or(0);
    }
    assert_eq!(total, 400);
}
