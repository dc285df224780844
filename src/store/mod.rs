use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    account::AccountKey,
    config::{Backend, Config},
    money::{Money, MoneyError},
};

pub mod in_memory;
pub mod sqlite;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Applied(Money),
    InsufficientFunds,
    NotFound,
}

/// Infrastructure failures. None of them say whether a mutation committed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend failure: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Storage call timed out, the mutation may or may not have been applied")]
    Timeout,
    #[error("Balance of account {0} would overflow")]
    Overflow(AccountKey),
    #[error("Value cannot be stored as a balance: {0}")]
    InvalidValue(#[from] MoneyError),
}

/// Durable mapping from account key to balance.
///
/// Each operation is a single atomic step with respect to every other call on
/// the same key. Only [`BalanceStore::upsert_add`] may create an account.
/// The store does not enforce the non-negative balance rule by itself apart
/// from refusing to subtract past zero in [`BalanceStore::conditional_subtract`].
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Creates the account with `amount` as its balance, or adds `amount` to
    /// the existing balance. Returns the balance after the change.
    async fn upsert_add(&self, key: &AccountKey, amount: Money) -> Result<Money, StoreError>;

    /// Subtracts `amount` only if the account exists and holds at least
    /// `amount`. Otherwise nothing changes and the outcome says why.
    async fn conditional_subtract(
        &self,
        key: &AccountKey,
        amount: Money,
    ) -> Result<WithdrawOutcome, StoreError>;

    /// Latest committed balance, `None` if the account was never created.
    async fn read(&self, key: &AccountKey) -> Result<Option<Money>, StoreError>;
}

/// Opens the store selected by `config`. SQLite stores get their schema created.
pub async fn open(config: &Config) -> Result<Arc<dyn BalanceStore>, StoreError> {
    match &config.backend {
        Backend::InMemory => Ok(Arc::new(in_memory::InMemoryBalanceStore::default())),
        Backend::Sqlite(url) => {
            let store =
                sqlite::SqliteBalanceStore::connect(url, config.max_connections, config.busy_timeout)
                    .await?;
            Ok(Arc::new(store))
        }
    }
}
