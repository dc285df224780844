use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{input}` is not a valid account id")]
pub struct AccountIdError {
    input: String,
}

/// External identifier of an account, as handed to us by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

/// Key under which a [`crate::store::BalanceStore`] keeps an account's balance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountKey(String);

impl AccountId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Maps the id onto its store key.
    ///
    /// The mapping is the canonical hyphenated lowercase form of the UUID, so it
    /// is stable across processes and two distinct ids never share a key.
    pub fn resolve(&self) -> AccountKey {
        AccountKey(self.0.hyphenated().to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| AccountIdError {
                input: s.to_string(),
            })
    }
}

impl AccountKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
