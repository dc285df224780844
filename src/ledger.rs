use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    account::AccountId,
    command::{MutationIntent, OperationKind},
    money::Money,
    store::{BalanceStore, StoreError, WithdrawOutcome},
};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),
    #[error("Insufficient funds on account {0}")]
    InsufficientFunds(AccountId),
    #[error("Operation {0:?} is not supported")]
    InvalidOperation(OperationKind),
    /// Storage did not answer properly. The mutation may or may not have
    /// committed, so blindly repeating a withdraw can apply it twice.
    #[error(transparent)]
    Retryable(#[from] StoreError),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Applies mutation intents to a [`BalanceStore`].
///
/// Holds no balances itself: every call goes to the store, and the store is
/// responsible for making each call atomic. Cloning is cheap and clones share
/// the same store.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn BalanceStore>,
    deadline: Option<Duration>,
}

impl Ledger {
    pub fn new(store: Arc<dyn BalanceStore>) -> Self {
        Self {
            store,
            deadline: None,
        }
    }

    /// Bounds every store call. A call that misses the deadline is reported as
    /// [`StoreError::Timeout`].
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Applies one deposit or withdraw and returns the resulting balance.
    ///
    /// Deposits create unseen accounts. Withdraws never do, and distinguish a
    /// missing account from one without enough funds. Nothing is retried here.
    pub async fn mutate(&self, intent: &MutationIntent) -> Result<Money, LedgerError> {
        let account = intent.account;
        let amount = intent.amount;
        let key = account.resolve();

        let result = match intent.kind {
            OperationKind::Deposit => self
                .bounded(self.store.upsert_add(&key, amount))
                .await
                .map_err(LedgerError::from),
            OperationKind::Withdraw => {
                match self
                    .bounded(self.store.conditional_subtract(&key, amount))
                    .await
                {
                    Ok(WithdrawOutcome::Applied(balance)) => Ok(balance),
                    Ok(WithdrawOutcome::NotFound) => Err(LedgerError::AccountNotFound(account)),
                    Ok(WithdrawOutcome::InsufficientFunds) => {
                        Err(LedgerError::InsufficientFunds(account))
                    }
                    Err(err) => Err(err.into()),
                }
            }
            OperationKind::Unknown => Err(LedgerError::InvalidOperation(intent.kind)),
        };

        match &result {
            Ok(balance) => {
                debug!(%account, kind = ?intent.kind, %amount, %balance, "mutation applied")
            }
            Err(err) if err.is_retryable() => {
                warn!(%account, kind = ?intent.kind, %amount, error = %err, "mutation failed")
            }
            Err(err) => {
                info!(%account, kind = ?intent.kind, %amount, reason = %err, "mutation rejected")
            }
        }
        result
    }

    /// Reads the committed balance without going through mutation dispatch.
    pub async fn get_balance(&self, account: &AccountId) -> Result<Money, LedgerError> {
        let key = account.resolve();
        match self.bounded(self.store.read(&key)).await {
            Ok(Some(balance)) => Ok(balance),
            Ok(None) => Err(LedgerError::AccountNotFound(*account)),
            Err(err) => {
                warn!(%account, error = %err, "balance read failed");
                Err(err.into())
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .map_err(|_| StoreError::Timeout)?,
            None => call.await,
        }
    }
}
