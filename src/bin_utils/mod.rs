//! This module could be a separate crate on its own, to bootstrap [`crate::ledger`]
//! within the binary. It is kept in the library so integration tests can drive it.

use std::{
    collections::BTreeSet,
    io::{Read, Write},
};

use crate::{
    account::AccountId,
    command::{IntentError, MutationIntent},
    config::Config,
    ledger::{Ledger, LedgerError},
    money::Money,
    store::{self, StoreError},
};
use anyhow::Result;
use csv_parser::{CsvIntentParser, IntentRecord};
use csv_printer::{BalanceRow, print_balances};
use thiserror::Error;

pub mod csv_parser;
pub mod csv_printer;

/// Why a single CSV row was not applied.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Malformed record: {0}")]
    Parse(#[from] csv::Error),
    #[error(transparent)]
    Intent(#[from] IntentError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Opens the configured store and wraps it in a [`Ledger`] with the configured deadline.
pub async fn ledger_from_config(config: &Config) -> Result<Ledger, StoreError> {
    let ledger = Ledger::new(store::open(config).await?);
    Ok(match config.request_timeout {
        Some(deadline) => ledger.with_deadline(deadline),
        None => ledger,
    })
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub ledger: Ledger,
    pub error_printer: Box<dyn FnMut(u64, ProcessError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    /// Applies every row in file order, then prints the balance of every
    /// account the file mentioned, sorted by account id. Accounts that still
    /// do not exist are left out.
    pub async fn run(mut self) -> Result<()> {
        let parser = CsvIntentParser::new(self.input)?;
        let mut touched = BTreeSet::new();

        for (line, row) in parser {
            if let Err(err) = apply(&self.ledger, row, &mut touched).await {
                (self.error_printer)(line, err);
            }
        }

        let mut rows = Vec::with_capacity(touched.len());
        for account in touched {
            match self.ledger.get_balance(&account).await {
                Ok(balance) => rows.push(BalanceRow { account, balance }),
                Err(LedgerError::AccountNotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        print_balances(self.output, rows.into_iter())
    }
}

async fn apply(
    ledger: &Ledger,
    row: Result<IntentRecord, csv::Error>,
    touched: &mut BTreeSet<AccountId>,
) -> Result<Money, ProcessError> {
    let row = row?;
    touched.insert(row.account);
    let intent = MutationIntent::new(row.account, row.operation, row.amount)?;
    Ok(ledger.mutate(&intent).await?)
}
