//! Simple Bank - operator CLI
//!
//! ```text
//! simple_bank [--env <name>] migrate
//! simple_bank [--env <name>] open-account <owner> <currency>
//! simple_bank [--env <name>] transfer <from> <to> <amount>
//! simple_bank [--env <name>] balance <id>
//! ```

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};

use simple_bank::config::AppConfig;
use simple_bank::db::Database;
use simple_bank::ledger::models::{AccountId, CreateAccountParams, Currency};
use simple_bank::ledger::repository::{LedgerRepository, LedgerStore, UnitOfWork};
use simple_bank::ledger::PgLedgerStore;
use simple_bank::transfer::TransferCoordinator;

const USAGE: &str = "usage: simple_bank [--env <name>] \
<migrate | open-account <owner> <currency> | transfer <from> <to> <amount> | balance <id>>";

#[derive(Debug)]
enum Command {
    Migrate,
    OpenAccount { owner: String, currency: Currency },
    Transfer { from: AccountId, to: AccountId, amount: i64 },
    Balance { id: AccountId },
}

/// Split `--env <name>` off the argument list; default env is `dev`
fn get_env(args: &mut Vec<String>) -> Result<String> {
    match args.iter().position(|a| a == "--env" || a == "-e") {
        Some(i) if i + 1 < args.len() => {
            let env = args.remove(i + 1);
            args.remove(i);
            Ok(env)
        }
        Some(_) => bail!("--env requires a value"),
        None => Ok("dev".to_string()),
    }
}

fn parse_id(value: &str, what: &str) -> Result<i64> {
    value
        .parse()
        .with_context(|| format!("invalid {what}: {value:?}"))
}

fn parse_command(args: &[String]) -> Result<Command> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["migrate"] => Ok(Command::Migrate),
        ["open-account", owner, currency] => Ok(Command::OpenAccount {
            owner: owner.to_string(),
            currency: currency.parse()?,
        }),
        ["transfer", from, to, amount] => Ok(Command::Transfer {
            from: parse_id(from, "from account id")?,
            to: parse_id(to, "to account id")?,
            amount: parse_id(amount, "amount")?,
        }),
        ["balance", id] => Ok(Command::Balance {
            id: parse_id(id, "account id")?,
        }),
        _ => Err(anyhow!(USAGE)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let env = get_env(&mut args)?;
    let command = parse_command(&args)?;

    let app_config = AppConfig::load(&env)?;
    let _log_guard = simple_bank::logging::init_logging(&app_config);
    tracing::info!("Starting simple_bank in {} mode", env);

    let url = app_config
        .postgres_url
        .as_deref()
        .context("postgres_url is not configured (set it in the config file or DATABASE_URL)")?;
    let db = Database::connect(url, &app_config.db_pool())
        .await
        .context("failed to connect to PostgreSQL")?;
    db.health_check().await.context("database health check failed")?;

    let store = Arc::new(PgLedgerStore::new(db.pool().clone()));

    match command {
        Command::Migrate => {
            db.ensure_schema().await.context("failed to apply schema")?;
            println!("schema applied");
        }
        Command::OpenAccount { owner, currency } => {
            let mut uow = store.begin().await?;
            let account = uow
                .create_account(CreateAccountParams {
                    owner,
                    balance: 0,
                    currency,
                })
                .await?;
            uow.commit().await?;
            println!("{}", serde_json::to_string_pretty(&account)?);
        }
        Command::Transfer { from, to, amount } => {
            let coordinator = match app_config.transfer_timeout() {
                Some(timeout) => TransferCoordinator::with_timeout(store, timeout),
                None => TransferCoordinator::new(store),
            };
            match coordinator.transfer(from, to, amount).await {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(e) => bail!("transfer failed [{}]: {}", e.code(), e),
            }
        }
        Command::Balance { id } => {
            let mut uow = store.begin().await?;
            let account = uow.get_account(id).await?;
            uow.rollback().await?;
            println!("{}", serde_json::to_string_pretty(&account)?);
        }
    }

    Ok(())
}
