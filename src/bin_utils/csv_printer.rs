use std::io::Write;

use crate::{account::AccountId, money::Money};
use anyhow::Context;
use csv::WriterBuilder;
use serde::Serialize;

const HEADER: [&str; 2] = ["account", "balance"];

#[derive(Debug, Serialize)]
pub struct BalanceRow {
    pub account: AccountId,
    pub balance: Money,
}

/// Writes the header even when there are no balances to print.
pub fn print_balances<W>(
    output: &mut W,
    balances: impl Iterator<Item = BalanceRow>,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(output);
    writer
        .write_record(HEADER)
        .context("Failed to write CSV header")?;
    for row in balances {
        writer
            .serialize(&row)
            .with_context(|| format!("Failed to write balance of account {}", row.account))?;
    }
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}
