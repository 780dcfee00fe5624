//! Transfer Coordinator
//!
//! Moves funds between two accounts as one unit of work:
//! one transfer row, two entries, two balance adjustments, or nothing.
//!
//! # Lock ordering
//!
//! Balance adjustments lock account rows. They are always applied to the
//! lower account id first, whichever side of the transfer it is on, so two
//! transfers over the same pair of accounts (in either direction) request
//! the row locks in the same order and cannot deadlock each other.
//!
//! # No retry
//!
//! Transient storage failures (including serialization conflicts) are
//! returned to the caller as `Unavailable`; nothing is retried here.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::types::{TransferTxParams, TransferTxResult};
use crate::ledger::models::{
    AccountId, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams,
};
use crate::ledger::repository::{LedgerRepository, LedgerStore, UnitOfWork};

pub struct TransferCoordinator {
    store: Arc<dyn LedgerStore>,
    timeout: Option<Duration>,
}

impl TransferCoordinator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Abort any transfer whose unit of work is still open after `timeout`
    pub fn with_timeout(store: Arc<dyn LedgerStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout: Some(timeout),
        }
    }

    pub async fn transfer(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> Result<TransferTxResult, TransferError> {
        self.transfer_tx(TransferTxParams::new(from_account_id, to_account_id, amount))
            .await
    }

    /// Execute one transfer atomically
    ///
    /// Validation happens before any storage access. On failure the unit of
    /// work is rolled back and the first error is returned; if the
    /// rollback fails too, both are reported as [`TransferError::AbortFailed`].
    /// If this future is dropped midway, the open unit of work is dropped
    /// with it and its writes are discarded.
    pub async fn transfer_tx(
        &self,
        params: TransferTxParams,
    ) -> Result<TransferTxResult, TransferError> {
        if params.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }
        if params.from_account_id == params.to_account_id {
            return Err(TransferError::SameAccount);
        }

        let mut uow = self.store.begin().await?;
        debug!(
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount,
            store = self.store.name(),
            "Transfer started"
        );

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, execute(uow.as_mut(), params))
                .await
                .unwrap_or_else(|_| {
                    Err(TransferError::Unavailable(format!(
                        "transfer did not complete within {limit:?}"
                    )))
                }),
            None => execute(uow.as_mut(), params).await,
        };

        match outcome {
            Ok(result) => {
                uow.commit().await?;
                info!(
                    transfer_id = result.transfer.id,
                    from = params.from_account_id,
                    to = params.to_account_id,
                    amount = params.amount,
                    "Transfer committed"
                );
                Ok(result)
            }
            Err(cause) => match uow.rollback().await {
                Ok(()) => {
                    warn!(
                        from = params.from_account_id,
                        to = params.to_account_id,
                        code = cause.code(),
                        error = %cause,
                        "Transfer rolled back"
                    );
                    Err(cause)
                }
                Err(abort) => {
                    error!(
                        from = params.from_account_id,
                        to = params.to_account_id,
                        error = %cause,
                        rollback_error = %abort,
                        "Transfer failed and rollback failed"
                    );
                    Err(TransferError::AbortFailed {
                        cause: Box::new(cause),
                        abort,
                    })
                }
            },
        }
    }
}

/// The writes of one transfer, inside an open unit of work
async fn execute(
    uow: &mut dyn UnitOfWork,
    params: TransferTxParams,
) -> Result<TransferTxResult, TransferError> {
    let transfer = uow
        .create_transfer(CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let from_entry = uow
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .await?;
    let to_entry = uow
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let [(first_id, first_delta), (second_id, second_delta)] = params.balance_updates();
    let first = uow
        .add_account_balance(AddAccountBalanceParams {
            id: first_id,
            amount: first_delta,
        })
        .await?;
    let second = uow
        .add_account_balance(AddAccountBalanceParams {
            id: second_id,
            amount: second_delta,
        })
        .await?;

    let (from_account, to_account) = if first_id == params.from_account_id {
        (first, second)
    } else {
        (second, first)
    };

    Ok(TransferTxResult {
        transfer,
        from_entry,
        to_entry,
        from_account,
        to_account,
    })
}
