//! Money Transfer
//!
//! Double-entry transfer between two accounts, executed as one atomic unit
//! of work over a [`crate::ledger::LedgerStore`].
//!
//! # Invariants
//!
//! 1. **All-or-nothing**: the transfer row, both entries and both balance
//!    changes become visible together or not at all
//! 2. **Double entry**: the two entries of a transfer sum to zero
//! 3. **Lock order**: balance rows are adjusted in ascending account id
//! 4. **Atomic increment**: balances change only through `add_account_balance`

pub mod coordinator;
pub mod error;
pub mod types;


pub use coordinator::TransferCoordinator;
pub use error::TransferError;
pub use types::{TransferTxParams, TransferTxResult};
