//! Durable balance store on SQLite.
//!
//! Balances are stored as integer minor units in a `STRICT` table, so the
//! database never rounds and refuses anything that is not an exact integer.
//! Every mutation is one statement or one short transaction; atomicity comes
//! from SQLite's single-writer locking, not from anything held in process.

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::info;

use crate::{account::AccountKey, money::Money};

use super::{BalanceStore, StoreError, WithdrawOutcome};

const CREATE_ACCOUNTS: &str = r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY NOT NULL,
        balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0)
    ) STRICT
"#;

const UPSERT_ADD: &str = r#"
    INSERT INTO accounts (id, balance)
    VALUES (?1, ?2)
    ON CONFLICT (id) DO UPDATE SET balance = balance + excluded.balance
    RETURNING balance
"#;

const CONDITIONAL_SUBTRACT: &str = r#"
    UPDATE accounts
    SET balance = balance - ?1
    WHERE id = ?2 AND balance >= ?1
    RETURNING balance
"#;

const ACCOUNT_EXISTS: &str = "SELECT 1 FROM accounts WHERE id = ?1";

const READ_BALANCE: &str = "SELECT balance FROM accounts WHERE id = ?1";

#[derive(Debug, Clone)]
pub struct SqliteBalanceStore {
    pool: SqlitePool,
}

impl SqliteBalanceStore {
    /// Connects to `url` (e.g. `sqlite:ledger.db`), creating the file and the
    /// schema when missing.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        info!(url, max_connections, "connected to balance database");

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_ACCOUNTS).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for SqliteBalanceStore {
    async fn upsert_add(&self, key: &AccountKey, amount: Money) -> Result<Money, StoreError> {
        let units = amount.to_minor_units()?;
        let balance: i64 = sqlx::query_scalar(UPSERT_ADD)
            .bind(key.as_str())
            .bind(units)
            .fetch_one(&self.pool)
            .await?;
        Ok(Money::from_minor_units(balance)?)
    }

    async fn conditional_subtract(
        &self,
        key: &AccountKey,
        amount: Money,
    ) -> Result<WithdrawOutcome, StoreError> {
        let units = amount.to_minor_units()?;
        // rolled back on drop, including when the caller's deadline cancels us
        let mut tx = self.pool.begin().await?;
        let applied: Option<i64> = sqlx::query_scalar(CONDITIONAL_SUBTRACT)
            .bind(units)
            .bind(key.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let outcome = match applied {
            Some(balance) => WithdrawOutcome::Applied(Money::from_minor_units(balance)?),
            None => {
                // The UPDATE took the write lock even though it matched nothing,
                // so no other writer can create or fund the account before this read.
                let exists: Option<i64> = sqlx::query_scalar(ACCOUNT_EXISTS)
                    .bind(key.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;
                if exists.is_some() {
                    WithdrawOutcome::InsufficientFunds
                } else {
                    WithdrawOutcome::NotFound
                }
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn read(&self, key: &AccountKey) -> Result<Option<Money>, StoreError> {
        let balance: Option<i64> = sqlx::query_scalar(READ_BALANCE)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(balance.map(Money::from_minor_units).transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::account::AccountId;

    use super::*;

    fn money(value: &str) -> Money {
        value.parse().unwrap()
    }

    async fn open_store() -> (TempDir, SqliteBalanceStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("ledger.db").display());
        let store = SqliteBalanceStore::connect(&url, 4, Duration::from_secs(5))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn upsert_creates_then_increments() {
        let (_dir, store) = open_store().await;
        let key = AccountId::random().resolve();

        assert_eq!(store.read(&key).await.unwrap(), None);
        assert_eq!(
            store.upsert_add(&key, money("100")).await.unwrap(),
            money("100")
        );
        assert_eq!(
            store.upsert_add(&key, money("50.25")).await.unwrap(),
            money("150.25")
        );
        assert_eq!(store.read(&key).await.unwrap(), Some(money("150.25")));
    }

    #[tokio::test]
    async fn conditional_subtract_reports_precondition() {
        let (_dir, store) = open_store().await;
        let key = AccountId::random().resolve();

        assert_eq!(
            store.conditional_subtract(&key, money("10")).await.unwrap(),
            WithdrawOutcome::NotFound
        );
        assert_eq!(store.read(&key).await.unwrap(), None);

        store.upsert_add(&key, money("100")).await.unwrap();
        assert_eq!(
            store.conditional_subtract(&key, money("30")).await.unwrap(),
            WithdrawOutcome::Applied(money("70"))
        );
        assert_eq!(
            store.conditional_subtract(&key, money("1000")).await.unwrap(),
            WithdrawOutcome::InsufficientFunds
        );
        assert_eq!(store.read(&key).await.unwrap(), Some(money("70")));
    }

    #[tokio::test]
    async fn overflowing_deposit_leaves_balance_alone() {
        let (_dir, store) = open_store().await;
        let key = AccountId::random().resolve();
        let half = money("50000000000000000.01");

        store.upsert_add(&key, half).await.unwrap();
        let err = store.upsert_add(&key, half).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(store.read(&key).await.unwrap(), Some(half));
    }

    #[tokio::test]
    async fn balances_survive_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("ledger.db").display());
        let key = AccountId::random().resolve();
        {
            let store = SqliteBalanceStore::connect(&url, 2, Duration::from_secs(5))
                .await
                .unwrap();
            store.upsert_add(&key, money("12.34")).await.unwrap();
            store.pool.close().await;
        }
        let store = SqliteBalanceStore::connect(&url, 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(store.read(&key).await.unwrap(), Some(money("12.34")));
    }

    #[tokio::test]
    async fn closed_pool_fails_every_call_and_keeps_balances() {
        use std::sync::Arc;

        use crate::{
            command::MutationIntent,
            ledger::{Ledger, LedgerError},
        };

        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("ledger.db").display());
        let store = SqliteBalanceStore::connect(&url, 2, Duration::from_secs(5))
            .await
            .unwrap();
        let account = AccountId::random();
        let ledger = Ledger::new(Arc::new(store.clone()));
        ledger
            .mutate(&MutationIntent::deposit(account, money("10")))
            .await
            .unwrap();

        store.pool.close().await;
        for intent in [
            MutationIntent::deposit(account, money("5")),
            MutationIntent::withdraw(account, money("5")),
        ] {
            let err = ledger.mutate(&intent).await.unwrap_err();
            assert!(err.is_retryable());
            assert!(matches!(err, LedgerError::Retryable(StoreError::Database(_))));
        }
        let err = ledger.get_balance(&account).await.unwrap_err();
        assert!(err.is_retryable());

        let store = SqliteBalanceStore::connect(&url, 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            store.read(&account.resolve()).await.unwrap(),
            Some(money("10"))
        );
    }

    #[tokio::test]
    async fn schema_rejects_negative_balance() {
        let (_dir, store) = open_store().await;
        let result = sqlx::query("INSERT INTO accounts (id, balance) VALUES ('x', -1)")
            .execute(&store.pool)
            .await;
        assert!(result.is_err());
    }
}
