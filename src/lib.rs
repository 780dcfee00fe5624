//! Simple Bank - Double-Entry Transfer Engine
//!
//! Accounts, append-only ledger entries and transfers, with an atomic
//! transfer coordinator on top.
//!
//! # Modules
//!
//! - [`ledger`] - Models, repository ports, PostgreSQL and in-memory adapters
//! - [`transfer`] - Transfer coordinator and its error taxonomy
//! - [`db`] - Connection pool and schema bootstrap
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod transfer;

#[cfg(test)]
mod testutil;

// Convenient re-exports at crate root
pub use config::{AppConfig, ConfigError};
pub use db::{Database, DbPoolConfig};
pub use ledger::{
    Account, AccountId, Currency, Entry, LedgerStore, MemoryLedgerStore, PgLedgerStore,
    StoreError, Transfer, UnitOfWork,
};
pub use transfer::{TransferCoordinator, TransferError, TransferTxParams, TransferTxResult};
