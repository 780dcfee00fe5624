//! Ledger repository ports
//!
//! [`LedgerStore`] opens units of work; each [`UnitOfWork`] is a
//! [`LedgerRepository`] bound to one atomic storage transaction.

use async_trait::async_trait;

use super::error::StoreError;
use super::models::{
    Account, AccountId, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, Page, Transfer,
};
use super::state::UnitOfWorkState;

/// Single-statement ledger queries
///
/// Every method runs inside the unit of work that owns `self`.
#[async_trait]
pub trait LedgerRepository: Send {
    /// Fails with [`StoreError::NotFound`] if no such account
    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError>;

    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError>;

    async fn list_accounts(&mut self, owner: &str, page: Page) -> Result<Vec<Account>, StoreError>;

    /// Pure insert: only storage constraints are checked
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError>;

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError>;

    /// Transfers leaving `from_account_id` or arriving at `to_account_id`
    async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError>;

    /// Pure insert: only storage constraints are checked
    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError>;

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError>;

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError>;

    /// Atomically add `params.amount` to the stored balance and return the updated row
    ///
    /// Implemented as one read-and-write at the storage layer. The row stays
    /// locked against other units of work until this one commits or aborts.
    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError>;
}

/// An atomic, all-or-nothing group of ledger operations
///
/// Dropping an open unit of work without calling [`UnitOfWork::commit`]
/// discards every write it made.
#[async_trait]
pub trait UnitOfWork: LedgerRepository {
    fn state(&self) -> UnitOfWorkState;

    /// Make every write visible at once. Only valid while `Open`.
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard every write. The state becomes `Aborted` even when this returns an error.
    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Factory for units of work over one storage backend
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}
