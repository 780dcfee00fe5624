//! In-Memory Ledger Adapter
//!
//! Behaves like a row-locking SQL engine at READ COMMITTED:
//! - writes are buffered per unit of work and published together on commit
//! - `add_account_balance` takes an async row lock held until commit/rollback/drop
//! - reads see committed rows plus the unit of work's own pending writes
//! - identifier sequences are never rolled back
//!
//! Fault switches let tests fail individual steps.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::ledger::error::{ConstraintKind, StoreError};
use crate::ledger::models::{
    Account, AccountId, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, Page, Transfer,
};
use crate::ledger::repository::{LedgerRepository, LedgerStore, UnitOfWork};
use crate::ledger::state::UnitOfWorkState;

type RowLock = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
    row_locks: HashMap<AccountId, RowLock>,
    account_seq: i64,
    entry_seq: i64,
    transfer_seq: i64,
}

#[derive(Default)]
struct FaultSwitches {
    add_balance: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
}

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    faults: FaultSwitches,
}

impl Shared {
    // Critical sections never panic halfway through a mutation, so a
    // poisoned lock still guards consistent data.
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time copy of the committed tables
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub accounts: Vec<Account>,
    pub entries: Vec<Entry>,
    pub transfers: Vec<Transfer>,
}

impl LedgerSnapshot {
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn total_balance(&self) -> i128 {
        self.accounts.iter().map(|a| a.balance as i128).sum()
    }

    pub fn entry_sum(&self) -> i128 {
        self.entries.iter().map(|e| e.amount as i128).sum()
    }
}

/// Process-local ledger storage
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `add_account_balance` call fail with `Unavailable`
    pub fn set_fail_add_balance(&self, fail: bool) {
        self.shared.faults.add_balance.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.shared.faults.commit.store(fail, Ordering::SeqCst);
    }

    /// Rollback still discards the writes, then reports failure
    pub fn set_fail_rollback(&self, fail: bool) {
        self.shared.faults.rollback.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let tables = self.shared.tables();
        LedgerSnapshot {
            accounts: tables.accounts.values().cloned().collect(),
            entries: tables.entries.values().cloned().collect(),
            transfers: tables.transfers.values().cloned().collect(),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            state: UnitOfWorkState::Open,
            row_guards: HashMap::new(),
            new_accounts: BTreeMap::new(),
            new_entries: BTreeMap::new(),
            new_transfers: BTreeMap::new(),
            balance_deltas: HashMap::new(),
        }))
    }
}

pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    state: UnitOfWorkState,
    row_guards: HashMap<AccountId, OwnedMutexGuard<()>>,
    new_accounts: BTreeMap<AccountId, Account>,
    new_entries: BTreeMap<i64, Entry>,
    new_transfers: BTreeMap<i64, Transfer>,
    balance_deltas: HashMap<AccountId, i64>,
}

fn paginate<T>(rows: Vec<T>, page: Page) -> Result<Vec<T>, StoreError> {
    if page.limit < 0 || page.offset < 0 {
        return Err(StoreError::Internal(
            "LIMIT and OFFSET must not be negative".to_string(),
        ));
    }
    Ok(rows
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect())
}

impl MemoryUnitOfWork {
    async fn enter(&self) -> Result<(), StoreError> {
        if self.state != UnitOfWorkState::Open {
            return Err(StoreError::Unavailable(format!(
                "unit of work is {}",
                self.state
            )));
        }
        // Give concurrent units of work a chance to interleave between statements.
        tokio::task::yield_now().await;
        Ok(())
    }

    /// Committed row overlaid with this unit of work's pending state
    fn visible_account(&self, tables: &Tables, id: AccountId) -> Option<Account> {
        let mut account = tables
            .accounts
            .get(&id)
            .or_else(|| self.new_accounts.get(&id))
            .cloned()?;
        account.balance += self.balance_deltas.get(&id).copied().unwrap_or(0);
        Some(account)
    }

    fn account_exists(&self, tables: &Tables, id: AccountId) -> bool {
        tables.accounts.contains_key(&id) || self.new_accounts.contains_key(&id)
    }

    fn discard(&mut self, state: UnitOfWorkState) {
        self.new_accounts.clear();
        self.new_entries.clear();
        self.new_transfers.clear();
        self.balance_deltas.clear();
        self.row_guards.clear();
        self.state = state;
    }
}

#[async_trait]
impl LedgerRepository for MemoryUnitOfWork {
    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        self.enter().await?;
        let tables = self.shared.tables();
        self.visible_account(&tables, id)
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))
    }

    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError> {
        self.enter().await?;
        let id = {
            let mut tables = self.shared.tables();
            tables.account_seq += 1;
            tables.account_seq
        };
        let account = Account {
            id,
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.new_accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn list_accounts(&mut self, owner: &str, page: Page) -> Result<Vec<Account>, StoreError> {
        self.enter().await?;
        let rows: Vec<Account> = {
            let tables = self.shared.tables();
            let mut ids: Vec<AccountId> = tables
                .accounts
                .keys()
                .chain(self.new_accounts.keys())
                .copied()
                .collect();
            ids.sort_unstable();
            ids.into_iter()
                .filter_map(|id| self.visible_account(&tables, id))
                .filter(|a| a.owner == owner)
                .collect()
        };
        paginate(rows, page)
    }

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        self.enter().await?;
        if params.amount <= 0 {
            return Err(StoreError::violation(
                ConstraintKind::Check,
                Some("transfers_amount_check"),
                "transfer amount must be positive",
            ));
        }
        if params.from_account_id == params.to_account_id {
            return Err(StoreError::violation(
                ConstraintKind::Check,
                Some("transfers_distinct_accounts_check"),
                "transfer source and destination must differ",
            ));
        }
        let id = {
            let mut tables = self.shared.tables();
            for (account_id, constraint) in [
                (params.from_account_id, "transfers_from_account_id_fkey"),
                (params.to_account_id, "transfers_to_account_id_fkey"),
            ] {
                if !self.account_exists(&tables, account_id) {
                    return Err(StoreError::violation(
                        ConstraintKind::ForeignKey,
                        Some(constraint),
                        format!("account {account_id} does not exist"),
                    ));
                }
            }
            tables.transfer_seq += 1;
            tables.transfer_seq
        };
        let transfer = Transfer {
            id,
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.new_transfers.insert(id, transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        self.enter().await?;
        let tables = self.shared.tables();
        tables
            .transfers
            .get(&id)
            .or_else(|| self.new_transfers.get(&id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("transfer {id}")))
    }

    async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.enter().await?;
        let mut rows: Vec<Transfer> = {
            let tables = self.shared.tables();
            tables
                .transfers
                .values()
                .chain(self.new_transfers.values())
                .filter(|t| t.from_account_id == from_account_id || t.to_account_id == to_account_id)
                .cloned()
                .collect()
        };
        rows.sort_by_key(|t| t.id);
        paginate(rows, page)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        self.enter().await?;
        let id = {
            let mut tables = self.shared.tables();
            if !self.account_exists(&tables, params.account_id) {
                return Err(StoreError::violation(
                    ConstraintKind::ForeignKey,
                    Some("entries_account_id_fkey"),
                    format!("account {} does not exist", params.account_id),
                ));
            }
            tables.entry_seq += 1;
            tables.entry_seq
        };
        let entry = Entry {
            id,
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.new_entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        self.enter().await?;
        let tables = self.shared.tables();
        tables
            .entries
            .get(&id)
            .or_else(|| self.new_entries.get(&id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("entry {id}")))
    }

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError> {
        self.enter().await?;
        let mut rows: Vec<Entry> = {
            let tables = self.shared.tables();
            tables
                .entries
                .values()
                .chain(self.new_entries.values())
                .filter(|e| e.account_id == account_id)
                .cloned()
                .collect()
        };
        rows.sort_by_key(|e| e.id);
        paginate(rows, page)
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        self.enter().await?;
        if self.shared.faults.add_balance.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected failure: add_account_balance".to_string(),
            ));
        }

        let id = params.id;
        if !self.row_guards.contains_key(&id) {
            let lock = {
                let mut tables = self.shared.tables();
                if !self.account_exists(&tables, id) {
                    return Err(StoreError::NotFound(format!("account {id}")));
                }
                Arc::clone(tables.row_locks.entry(id).or_default())
            };
            // Blocks while another open unit of work holds this row.
            let guard = lock.lock_owned().await;
            self.row_guards.insert(id, guard);
        }

        let mut account = {
            let tables = self.shared.tables();
            self.visible_account(&tables, id)
                .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?
        };
        account.balance = account.balance.checked_add(params.amount).ok_or_else(|| {
            StoreError::violation(
                ConstraintKind::OutOfRange,
                None,
                format!("balance of account {id} out of range"),
            )
        })?;
        *self.balance_deltas.entry(id).or_insert(0) += params.amount;
        Ok(account)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn state(&self) -> UnitOfWorkState {
        self.state
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.enter().await?;
        if self.shared.faults.commit.load(Ordering::SeqCst) {
            self.discard(UnitOfWorkState::Aborted);
            return Err(StoreError::Unavailable("injected failure: commit".to_string()));
        }

        {
            let mut tables = self.shared.tables();
            tables.accounts.append(&mut self.new_accounts);
            for (id, delta) in self.balance_deltas.drain() {
                if let Some(account) = tables.accounts.get_mut(&id) {
                    account.balance += delta;
                }
            }
            tables.entries.append(&mut self.new_entries);
            tables.transfers.append(&mut self.new_transfers);
        }
        // Release row locks only once the new balances are visible.
        self.discard(UnitOfWorkState::Committed);
        debug!("memory unit of work committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if self.state != UnitOfWorkState::Open {
            return Ok(());
        }
        self.discard(UnitOfWorkState::Aborted);
        debug!("memory unit of work rolled back");
        if self.shared.faults.rollback.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure: rollback".to_string()));
        }
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitOfWorkState::Open {
            debug!(
                rows_locked = self.row_guards.len(),
                "memory unit of work dropped while open, discarding writes"
            );
        }
    }
}
