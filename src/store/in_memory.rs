use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::{account::AccountKey, money::Money};

use super::{BalanceStore, StoreError, WithdrawOutcome};

/// Process-local store, mainly for tests and the `memory` backend.
///
/// The outer lock only guards which accounts exist. Every account has its own
/// mutex, held for the duration of one read-modify-write, so traffic on one hot
/// account never blocks other accounts.
#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    accounts: RwLock<HashMap<AccountKey, Arc<Mutex<Money>>>>,
}

impl InMemoryBalanceStore {
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    fn account(&self, key: &AccountKey) -> Option<Arc<Mutex<Money>>> {
        self.accounts.read().get(key).cloned()
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn upsert_add(&self, key: &AccountKey, amount: Money) -> Result<Money, StoreError> {
        let account = match self.account(key) {
            Some(account) => account,
            None => match self.accounts.write().entry(key.clone()) {
                // inserted with its first deposit, a zero balance is never visible
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(Mutex::new(amount)));
                    return Ok(amount);
                }
                Entry::Occupied(entry) => Arc::clone(entry.get()),
            },
        };
        let mut balance = account.lock();
        let updated = balance
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow(key.clone()))?;
        *balance = updated;
        Ok(updated)
    }

    async fn conditional_subtract(
        &self,
        key: &AccountKey,
        amount: Money,
    ) -> Result<WithdrawOutcome, StoreError> {
        let Some(account) = self.account(key) else {
            return Ok(WithdrawOutcome::NotFound);
        };
        let mut balance = account.lock();
        match balance.checked_sub(amount) {
            Some(updated) => {
                *balance = updated;
                Ok(WithdrawOutcome::Applied(updated))
            }
            None => Ok(WithdrawOutcome::InsufficientFunds),
        }
    }

    async fn read(&self, key: &AccountKey) -> Result<Option<Money>, StoreError> {
        Ok(self.account(key).map(|account| *account.lock()))
    }
}
