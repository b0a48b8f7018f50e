//! Exchange engine binary
//!
//! Wires the ledger, matching engine and market data projection together.
//! With `--demo` it provisions users and instruments and runs a short
//! trading session so the full admission → matching → settlement →
//! projection path can be observed in the logs.

use std::sync::Arc;

use clap::Parser;
use common::error::Result;
use common::model::order::{Direction, OrderType};
use dotenv::dotenv;
use ledger::{LedgerService, UserDirectory};
use market_data::MarketDataService;
use matching_engine::{EngineConfig, MatchingEngine, OrderRequest};
use tracing::{debug, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Run a demo trading session
    #[clap(short, long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let args = Args::parse();

    // Initialize tracing with debug level if DEBUG=1 in .env
    let env_debug = std::env::var("DEBUG").unwrap_or_else(|_| "0".to_string());
    let log_level = if env_debug == "1" { Level::DEBUG } else { Level::INFO };
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .parse("matching_engine=debug,ledger=debug,market_data=debug")
        .unwrap();
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        info!("Tracing initialized");
        if env_debug == "1" {
            debug!("Debug logging enabled");
        }
    }

    info!("Starting exchange engine...");

    let config = EngineConfig::from_env();
    let ledger = Arc::new(LedgerService::new());
    let market_data = Arc::new(MarketDataService::new());
    let users = Arc::new(UserDirectory::new());
    let engine = Arc::new(MatchingEngine::with_config(
        ledger.clone(),
        market_data.clone(),
        config,
    ));

    engine.register_instrument("MEMCOIN", "Meme Coin")?;
    users.register_admin("admin")?;

    if args.demo {
        info!("Running demo trading session...");
        run_demo(&engine, &ledger, &users, &market_data).await?;
    }

    info!("Shutting down");
    Ok(())
}

/// Provision two users and run a short trading session on MEMCOIN.
async fn run_demo(
    engine: &MatchingEngine,
    ledger: &LedgerService,
    users: &UserDirectory,
    market_data: &MarketDataService,
) -> Result<()> {
    let alice = users.register("alice")?;
    let bob = users.register("bob")?;

    ledger.deposit(alice.id, "RUB", 10_000).await?;
    ledger.deposit(bob.id, "MEMCOIN", 100).await?;

    // Bob offers 100 MEMCOIN in two slices; Alice lifts part of the book.
    engine
        .submit_order(OrderRequest {
            user_id: bob.id,
            ticker: "MEMCOIN".to_string(),
            direction: Direction::Sell,
            order_type: OrderType::Limit,
            price: Some(95),
            qty: 40,
            currency: None,
        })
        .await?;
    engine
        .submit_order(OrderRequest {
            user_id: bob.id,
            ticker: "MEMCOIN".to_string(),
            direction: Direction::Sell,
            order_type: OrderType::Limit,
            price: Some(100),
            qty: 60,
            currency: None,
        })
        .await?;
    let ack = engine
        .submit_order(OrderRequest {
            user_id: alice.id,
            ticker: "MEMCOIN".to_string(),
            direction: Direction::Buy,
            order_type: OrderType::Market,
            price: None,
            qty: 50,
            currency: None,
        })
        .await?;

    info!(
        "Alice's market buy: status {:?}, filled {} in {} fills",
        ack.status,
        ack.filled_qty,
        ack.transactions.len()
    );

    if let Some(book) = market_data.l2_orderbook("MEMCOIN", 10) {
        for level in &book.ask_levels {
            info!("Resting ask: {} x {}", level.qty, level.price);
        }
    }
    for balance in ledger.balances(alice.id).await? {
        info!("Alice holds {} {}", balance.amount(), balance.ticker);
    }
    for balance in ledger.balances(bob.id).await? {
        info!("Bob holds {} {}", balance.amount(), balance.ticker);
    }
    Ok(())
}
