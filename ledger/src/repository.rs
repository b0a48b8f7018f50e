//! Repository for balance data

use async_trait::async_trait;
use common::error::Result;
use common::model::balance::Balance;
use dashmap::DashMap;
use uuid::Uuid;

/// A single-pair balance mutation
///
/// The closure receives the balance for one (user, ticker) pair with
/// exclusive access; an error return must leave the balance untouched, which
/// every `Balance` method guarantees by checking before it applies.
pub type BalanceOp<'a> = Box<dyn FnOnce(&mut Balance) -> Result<()> + Send + 'a>;

/// Balance repository trait defining the interface for ledger storage
#[async_trait]
pub trait BalanceRepository: Send + Sync {
    /// Get a balance, if one exists for the pair
    async fn get(&self, user_id: Uuid, ticker: &str) -> Result<Option<Balance>>;

    /// Get all balances held by a user
    async fn balances_for_user(&self, user_id: Uuid) -> Result<Vec<Balance>>;

    /// Apply a mutation to one (user, ticker) pair atomically
    ///
    /// The balance is created at zero if absent. Mutations on the same pair
    /// are mutually exclusive; disjoint pairs proceed independently.
    async fn mutate(&self, user_id: Uuid, ticker: &str, op: BalanceOp<'_>) -> Result<Balance>;
}

/// In-memory repository for balance data
pub struct InMemoryBalanceRepository {
    /// Balances by (user, ticker) pair
    balances: DashMap<(Uuid, String), Balance>,
}

impl InMemoryBalanceRepository {
    /// Create a new in-memory balance repository
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
        }
    }
}

impl Default for InMemoryBalanceRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BalanceRepository for InMemoryBalanceRepository {
    async fn get(&self, user_id: Uuid, ticker: &str) -> Result<Option<Balance>> {
        Ok(self
            .balances
            .get(&(user_id, ticker.to_string()))
            .map(|b| b.clone()))
    }

    async fn balances_for_user(&self, user_id: Uuid) -> Result<Vec<Balance>> {
        let balances = self
            .balances
            .iter()
            .filter_map(|entry| {
                let ((owner, _), balance) = entry.pair();
                if *owner == user_id {
                    Some(balance.clone())
                } else {
                    None
                }
            })
            .collect();
        Ok(balances)
    }

    async fn mutate(&self, user_id: Uuid, ticker: &str, op: BalanceOp<'_>) -> Result<Balance> {
        // The entry guard holds the shard lock for the duration of the
        // mutation, so the pair is never observable mid-mutation.
        let mut entry = self
            .balances
            .entry((user_id, ticker.to_string()))
            .or_insert_with(|| Balance::new(user_id, ticker));
        op(entry.value_mut())?;
        Ok(entry.value().clone())
    }
}
