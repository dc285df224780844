use std::fs::File;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use wallet_ledger::{
    bin_utils::{ProcessError, Service, ledger_from_config},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the CSV report, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let filename = std::env::args()
        .nth(1)
        .context("Expected a file name as the first argument")?;
    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let config = Config::from_env().context("Failed to load configuration")?;
    let ledger = ledger_from_config(&config)
        .await
        .context("Failed to open the balance store")?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        ledger,
        error_printer: Box::new(|line, err| match err {
            ProcessError::Ledger(err) if !err.is_retryable() => {
                // business rejections, already logged by the ledger
            }
            err => eprintln!("Error at line {line}: {err}"),
        }),
    };
    service.run().await
}
