//! PostgreSQL Ledger Adapter
//!
//! One `sqlx::Transaction` per unit of work. Balance adjustment is a single
//! `UPDATE ... SET balance = balance + $1 ... RETURNING` statement, so the
//! row lock is taken by PostgreSQL and held until commit or rollback.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::ledger::error::StoreError;
use crate::ledger::models::{
    Account, AccountId, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, Page, Transfer,
};
use crate::ledger::repository::{LedgerRepository, LedgerStore, UnitOfWork};
use crate::ledger::state::UnitOfWorkState;

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";

/// Opens PostgreSQL-backed units of work
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork {
            tx: Some(tx),
            state: UnitOfWorkState::Open,
        }))
    }
}

/// A live PostgreSQL transaction
///
/// If dropped while open, sqlx rolls the transaction back.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
    state: UnitOfWorkState,
}

impl PgUnitOfWork {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        let state = self.state;
        self.tx
            .as_deref_mut()
            .ok_or_else(|| StoreError::Unavailable(format!("unit of work is {state}")))
    }
}

#[async_trait]
impl LedgerRepository for PgUnitOfWork {
    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))
    }

    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let sql = format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3) RETURNING {ACCOUNT_COLUMNS}"
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(&params.owner)
            .bind(params.balance)
            .bind(params.currency.as_str())
            .fetch_one(self.conn()?)
            .await?;
        Ok(account)
    }

    async fn list_accounts(&mut self, owner: &str, page: Page) -> Result<Vec<Account>, StoreError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner = $1 ORDER BY id LIMIT $2 OFFSET $3"
        );
        let accounts = sqlx::query_as::<_, Account>(&sql)
            .bind(owner)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.conn()?)
            .await?;
        Ok(accounts)
    }

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(self.conn()?)
        .await?;
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        sqlx::query_as::<_, Transfer>(
            r#"SELECT id, from_account_id, to_account_id, amount, created_at
               FROM transfers WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("transfer {id}")))
    }

    async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError> {
        let transfers = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE from_account_id = $1 OR to_account_id = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.conn()?)
        .await?;
        Ok(transfers)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        let entry = sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(self.conn()?)
        .await?;
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        sqlx::query_as::<_, Entry>(
            "SELECT id, account_id, amount, created_at FROM entries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("entry {id}")))
    }

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError> {
        let entries = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.conn()?)
        .await?;
        Ok(entries)
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        let sql = format!(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(params.amount)
            .bind(params.id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {}", params.id)))
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn state(&self) -> UnitOfWorkState {
        self.state
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let Some(tx) = self.tx.take() else {
            return Err(StoreError::Unavailable(format!(
                "cannot commit: unit of work is {}",
                self.state
            )));
        };
        match tx.commit().await {
            Ok(()) => {
                self.state = UnitOfWorkState::Committed;
                debug!("postgres unit of work committed");
                Ok(())
            }
            Err(e) => {
                // The server discards a transaction whose COMMIT failed.
                self.state = UnitOfWorkState::Aborted;
                warn!(error = %e, "postgres commit failed");
                Err(e.into())
            }
        }
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };
        self.state = UnitOfWorkState::Aborted;
        tx.rollback().await?;
        debug!("postgres unit of work rolled back");
        Ok(())
    }
}
