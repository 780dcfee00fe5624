//! Storage adapters for the ledger ports

pub mod memory;
pub mod postgres;

pub use memory::{LedgerSnapshot, MemoryLedgerStore};
pub use postgres::PgLedgerStore;
