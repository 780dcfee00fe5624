//! Random fixtures for tests

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;

use crate::ledger::models::{Account, CreateAccountParams, Currency};
use crate::ledger::repository::{LedgerRepository, LedgerStore, UnitOfWork};

pub fn random_owner() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

pub fn random_money() -> i64 {
    rand::thread_rng().gen_range(0..=1000)
}

pub fn random_currency() -> Currency {
    *Currency::ALL
        .choose(&mut rand::thread_rng())
        .unwrap_or(&Currency::Usd)
}

/// Create and commit one account with the given opening balance
pub async fn open_account(store: &dyn LedgerStore, balance: i64) -> Account {
    let mut uow = store.begin().await.expect("begin");
    let account = uow
        .create_account(CreateAccountParams {
            owner: random_owner(),
            balance,
            currency: random_currency(),
        })
        .await
        .expect("create account");
    uow.commit().await.expect("commit");
    account
}
