//! Ledger service implementation

use std::sync::Arc;

use common::error::{Error, ErrorExt, Result};
use common::model::balance::Balance;
use common::units::{Cash, Price, Qty};
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::repository::{BalanceRepository, InMemoryBalanceRepository};

/// One fill to settle: the two counterparties and the traded amounts
#[derive(Debug, Clone)]
pub struct FillSettlement {
    /// Buying user
    pub buyer: Uuid,
    /// Selling user
    pub seller: Uuid,
    /// Instrument ticker
    pub ticker: String,
    /// Settlement currency
    pub currency: String,
    /// Execution price
    pub price: Price,
    /// Quantity traded
    pub qty: Qty,
}

impl FillSettlement {
    /// Cash leg of the fill
    pub fn cash(&self) -> Cash {
        self.price * self.qty
    }
}

/// Ledger service guarding all balance mutations
///
/// Single-pair operations are atomic through the repository. Multi-pair
/// operations (settlement, transfer) additionally serialize on a commit
/// guard so their legs are applied as one unit and partial application is
/// never observable.
pub struct LedgerService {
    /// Repository for balance data
    repo: Arc<dyn BalanceRepository>,
    /// Commit point for multi-pair operations
    settle_guard: Mutex<()>,
}

impl LedgerService {
    /// Create a new ledger service over in-memory storage
    pub fn new() -> Self {
        Self::with_repository(Arc::new(InMemoryBalanceRepository::new()))
    }

    /// Create a new ledger service with a specific repository
    pub fn with_repository(repo: Arc<dyn BalanceRepository>) -> Self {
        Self {
            repo,
            settle_guard: Mutex::new(()),
        }
    }

    /// Get a balance for a (user, ticker) pair
    pub async fn balance(&self, user_id: Uuid, ticker: &str) -> Result<Option<Balance>> {
        self.repo.get(user_id, ticker).await
    }

    /// Get all balances held by a user
    pub async fn balances(&self, user_id: Uuid) -> Result<Vec<Balance>> {
        self.repo.balances_for_user(user_id).await
    }

    /// Deposit funds into a user's available balance
    pub async fn deposit(&self, user_id: Uuid, ticker: &str, amount: Qty) -> Result<Balance> {
        if amount <= 0 {
            return Err(Error::ValidationError(format!(
                "deposit amount must be positive, got {}",
                amount
            )));
        }
        info!("Depositing {} {} to user {}", amount, ticker, user_id);
        self.repo
            .mutate(user_id, ticker, Box::new(move |b| {
                b.deposit(amount).map_err(Error::ValidationError)
            }))
            .await
    }

    /// Withdraw funds from a user's available balance
    pub async fn withdraw(&self, user_id: Uuid, ticker: &str, amount: Qty) -> Result<Balance> {
        if amount <= 0 {
            return Err(Error::ValidationError(format!(
                "withdraw amount must be positive, got {}",
                amount
            )));
        }
        info!("Withdrawing {} {} from user {}", amount, ticker, user_id);
        self.repo
            .mutate(user_id, ticker, Box::new(move |b| {
                b.withdraw(amount).map_err(Error::InsufficientFunds)
            }))
            .await
            .with_context(|| format!("withdrawal for user {}", user_id))
    }

    /// Hold funds against a pending order
    pub async fn reserve(&self, user_id: Uuid, ticker: &str, amount: Qty) -> Result<()> {
        debug!("Reserving {} {} for user {}", amount, ticker, user_id);
        self.repo
            .mutate(user_id, ticker, Box::new(move |b| {
                b.reserve(amount).map_err(Error::InsufficientFunds)
            }))
            .await?;
        Ok(())
    }

    /// Return held funds to the available balance
    pub async fn release(&self, user_id: Uuid, ticker: &str, amount: Qty) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        debug!("Releasing {} {} for user {}", amount, ticker, user_id);
        self.repo
            .mutate(user_id, ticker, Box::new(move |b| {
                b.release(amount).map_err(Error::Internal)
            }))
            .await?;
        Ok(())
    }

    /// Atomically move `amount` of `ticker` between two users' available
    /// balances. Debit and credit are one unit; on a failed debit nothing is
    /// applied, and total supply of the ticker is conserved.
    pub async fn transfer(
        &self,
        from_user: Uuid,
        to_user: Uuid,
        ticker: &str,
        amount: Qty,
    ) -> Result<()> {
        if amount <= 0 {
            return Err(Error::ValidationError(format!(
                "transfer amount must be positive, got {}",
                amount
            )));
        }
        let _guard = self.settle_guard.lock().await;

        self.repo
            .mutate(from_user, ticker, Box::new(move |b| {
                b.withdraw(amount).map_err(Error::InsufficientFunds)
            }))
            .await?;
        self.repo
            .mutate(to_user, ticker, Box::new(move |b| {
                b.credit(amount);
                Ok(())
            }))
            .await?;
        Ok(())
    }

    /// Settle one fill: move cash from the buyer's reserved funds to the
    /// seller, and instrument quantity from the seller's reserved holding to
    /// the buyer.
    ///
    /// All four legs commit as one unit under the settlement guard. Both
    /// debits are validated against reserved funds before anything is
    /// applied; a failed validation means the admission accounting was
    /// violated and surfaces as `SettlementFailure` with no state change.
    pub async fn settle_fill(&self, fill: &FillSettlement) -> Result<()> {
        let cash = fill.cash();
        debug!(
            "Settling fill: {} {} @ {} {} between buyer {} and seller {}",
            fill.qty, fill.ticker, fill.price, fill.currency, fill.buyer, fill.seller
        );

        let _guard = self.settle_guard.lock().await;

        // Validate both debit legs before applying anything.
        let buyer_cash = self
            .repo
            .get(fill.buyer, &fill.currency)
            .await?
            .map(|b| b.reserved)
            .unwrap_or(0);
        if buyer_cash < cash {
            return Err(Error::SettlementFailure(format!(
                "buyer {} holds {} {} reserved, fill needs {}",
                fill.buyer, buyer_cash, fill.currency, cash
            )));
        }
        let seller_qty = self
            .repo
            .get(fill.seller, &fill.ticker)
            .await?
            .map(|b| b.reserved)
            .unwrap_or(0);
        if seller_qty < fill.qty {
            return Err(Error::SettlementFailure(format!(
                "seller {} holds {} {} reserved, fill needs {}",
                fill.seller, seller_qty, fill.ticker, fill.qty
            )));
        }

        // Apply the four legs. The guard is held and both debits consume
        // reserved funds that only the serialized matching path may touch, so
        // the validated checks still hold; a failure here is rolled back leg
        // by leg and reported for operator intervention.
        let qty = fill.qty;
        if let Err(e) = self.apply_legs(fill, cash, qty).await {
            error!("Settlement of fill failed after validation: {}", e);
            return Err(Error::SettlementFailure(e.to_string()));
        }
        Ok(())
    }

    async fn apply_legs(&self, fill: &FillSettlement, cash: Cash, qty: Qty) -> Result<()> {
        self.repo
            .mutate(fill.buyer, &fill.currency, Box::new(move |b| {
                b.debit_reserved(cash).map_err(Error::Internal)
            }))
            .await?;

        if let Err(e) = self
            .repo
            .mutate(fill.seller, &fill.currency, Box::new(move |b| {
                b.credit(cash);
                Ok(())
            }))
            .await
        {
            self.undo_debit(fill.buyer, &fill.currency, cash).await;
            return Err(e);
        }

        if let Err(e) = self
            .repo
            .mutate(fill.seller, &fill.ticker, Box::new(move |b| {
                b.debit_reserved(qty).map_err(Error::Internal)
            }))
            .await
        {
            self.undo_credit(fill.seller, &fill.currency, cash).await;
            self.undo_debit(fill.buyer, &fill.currency, cash).await;
            return Err(e);
        }

        if let Err(e) = self
            .repo
            .mutate(fill.buyer, &fill.ticker, Box::new(move |b| {
                b.credit(qty);
                Ok(())
            }))
            .await
        {
            self.undo_debit(fill.seller, &fill.ticker, qty).await;
            self.undo_credit(fill.seller, &fill.currency, cash).await;
            self.undo_debit(fill.buyer, &fill.currency, cash).await;
            return Err(e);
        }
        Ok(())
    }

    async fn undo_debit(&self, user: Uuid, ticker: &str, amount: Qty) {
        let result = self
            .repo
            .mutate(user, ticker, Box::new(move |b| {
                b.reserved += amount;
                Ok(())
            }))
            .await;
        if let Err(e) = result {
            error!("Rollback of reserved debit failed for user {}: {}", user, e);
        }
    }

    async fn undo_credit(&self, user: Uuid, ticker: &str, amount: Qty) {
        let result = self
            .repo
            .mutate(user, ticker, Box::new(move |b| {
                b.withdraw(amount).map_err(Error::Internal)
            }))
            .await;
        if let Err(e) = result {
            error!("Rollback of credit failed for user {}: {}", user, e);
        }
    }

}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new()
    }
}
