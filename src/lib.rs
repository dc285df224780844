/// Fixed two-decimal monetary values.
pub mod money;

/// Account identifiers and their mapping onto balance store keys.
pub mod account;

/// Mutation intents, built and validated at the boundary before they reach
/// the [`ledger`].
pub mod command;

/// Balance store interface, plus "in memory" and SQLite implementations.
///
/// All shared mutable state lives behind this interface. Each implementation
/// is responsible for making its operations atomic per account.
pub mod store;

/// Dispatches deposits and withdraws to the [`store`] and classifies the outcome.
pub mod ledger;

pub mod config;

/// Bootstraps the [`ledger`] for the binary: CSV intents in, CSV balances out.
/// Lives in the library so the integration tests can drive it.
pub mod bin_utils;
