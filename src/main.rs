use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::prelude::*;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod accounts;
mod directory;
mod statement;
mod store;
mod transactions;

use directory::{AccountDirectory, AccountId};
use store::{AccountsStore, JsonFileStore};

#[derive(Parser)]
#[clap(version = "0.1.0", author = "Vance Longwill <vancelongwill@gmail.com>")]
struct Opts {
    /// JSON file holding every account
    #[clap(long, env = "LEDGER_STORE", default_value = "accounts.json")]
    store: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Open a savings account and print its number
    OpenSavings {
        owner: String,
        #[clap(long, default_value = "0")]
        deposit: Decimal,
        /// monthly interest rate as a fraction
        #[clap(long, default_value = "0.05")]
        rate: Decimal,
    },
    /// Open a current account and print its number
    OpenCurrent {
        owner: String,
        #[clap(long, default_value = "0")]
        deposit: Decimal,
        #[clap(long, default_value = "100")]
        minimum_balance: Decimal,
        /// charged when a withdrawal leaves the balance under the minimum
        #[clap(long, default_value = "10")]
        fee: Decimal,
    },
    Deposit {
        account: AccountId,
        amount: Decimal,
    },
    Withdraw {
        account: AccountId,
        amount: Decimal,
    },
    Close {
        account: AccountId,
    },
    /// Credit monthly interest to every account
    ApplyInterest,
    Balance {
        account: AccountId,
    },
    /// Print the transaction history of an account
    History {
        account: AccountId,
    },
    /// Print a summary of every account
    Accounts,
}

impl Command {
    fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Command::Balance { .. } | Command::History { .. } | Command::Accounts
        )
    }
}

fn execute<W: Write>(
    directory: &mut AccountDirectory,
    command: Command,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::OpenSavings {
            owner,
            deposit,
            rate,
        } => {
            let id = directory.create_savings(&owner, deposit, rate)?;
            writeln!(out, "{}", id)?;
        }
        Command::OpenCurrent {
            owner,
            deposit,
            minimum_balance,
            fee,
        } => {
            let id = directory.create_current(&owner, deposit, minimum_balance, fee)?;
            writeln!(out, "{}", id)?;
        }
        Command::Deposit { account, amount } => {
            let balance = directory.deposit(account, amount)?;
            writeln!(out, "{}", balance)?;
        }
        Command::Withdraw { account, amount } => {
            let balance = directory.withdraw(account, amount)?;
            writeln!(out, "{}", balance)?;
        }
        Command::Close { account } => directory.close(account)?,
        Command::ApplyInterest => {
            let report = directory.apply_monthly_interest_to_all()?;
            statement::write_interest(&report, out)?;
        }
        Command::Balance { account } => {
            writeln!(out, "{}", directory.get(account)?.balance())?;
        }
        Command::History { account } => statement::write_history(directory.get(account)?, out)?,
        Command::Accounts => statement::write_accounts(directory, out)?,
    }
    Ok(())
}

/// dispatch runs one command against the store.
///
/// Mutating commands save even when they fail, so refused withdrawals stay in the audit trail.
fn dispatch<W: Write>(store: &dyn AccountsStore, command: Command, out: &mut W) -> Result<()> {
    let mut directory = AccountDirectory::open(store)?;
    let mutating = command.is_mutating();
    let outcome = execute(&mut directory, command, out);
    if mutating {
        directory.save()?;
    }
    outcome
}

fn run() -> Result<()> {
    let opts: Opts = Opts::parse();
    let store = JsonFileStore::new(&opts.store);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    dispatch(&store, opts.command, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run() {
        error!(error = e.to_string(), "Something went wrong");
        process::exit(1);
    }
}
