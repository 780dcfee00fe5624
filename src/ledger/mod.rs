//! Ledger storage
//!
//! Accounts, append-only entries and transfers, behind repository ports
//! with PostgreSQL and in-memory adapters.

pub mod adapters;
pub mod error;
pub mod models;
pub mod repository;
pub mod state;

pub use adapters::{LedgerSnapshot, MemoryLedgerStore, PgLedgerStore};
pub use error::{ConstraintKind, StoreError};
pub use models::{Account, AccountId, Currency, Entry, Page, Transfer};
pub use repository::{LedgerRepository, LedgerStore, UnitOfWork};
pub use state::UnitOfWorkState;
