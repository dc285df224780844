use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    account::AccountId,
    money::{Money, MoneyError},
};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[serde(alias = "DEPOSIT")]
    Deposit,
    #[serde(alias = "WITHDRAW")]
    Withdraw,
    /// Anything else the boundary let through. The ledger refuses it.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Error)]
pub enum IntentError {
    #[error("Amount is required for {kind:?}")]
    AmountRequired { kind: OperationKind },
    #[error("Invalid amount for {kind:?}: {source}")]
    InvalidAmount {
        kind: OperationKind,
        source: MoneyError,
    },
}

/// A single requested deposit or withdraw. Lives for one request only.
#[derive(Debug, Clone)]
pub struct MutationIntent {
    pub account: AccountId,
    pub kind: OperationKind,
    pub amount: Money,
}

impl MutationIntent {
    /// Builds an intent from raw boundary input, rejecting missing, zero,
    /// negative and over-precise amounts.
    pub fn new(
        account: AccountId,
        kind: OperationKind,
        amount: Option<Decimal>,
    ) -> Result<Self, IntentError> {
        let Some(amount) = amount else {
            return Err(IntentError::AmountRequired { kind });
        };
        let amount =
            Money::positive(amount).map_err(|source| IntentError::InvalidAmount { kind, source })?;
        Ok(Self {
            account,
            kind,
            amount,
        })
    }

    pub fn deposit(account: AccountId, amount: Money) -> Self {
        Self {
            account,
            kind: OperationKind::Deposit,
            amount,
        }
    }

    pub fn withdraw(account: AccountId, amount: Money) -> Self {
        Self {
            account,
            kind: OperationKind::Withdraw,
            amount,
        }
    }
}
