use std::collections::BTreeMap;
use std::io;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::Serialize;

use crate::accounts::{Account, AccountStatus};
use crate::directory::{AccountDirectory, AccountId};

#[derive(Debug, Serialize)]
struct AccountStatement<'a> {
    account: AccountId,
    owner: &'a str,
    kind: &'static str,
    balance: Decimal,
    status: AccountStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct HistoryLine {
    timestamp: DateTime<Utc>,
    description: String,
    balance: Decimal,
}

#[derive(Debug, Serialize)]
struct InterestLine {
    account: AccountId,
    interest: Decimal,
}

pub fn write_accounts<W: io::Write>(directory: &AccountDirectory, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for (id, acc) in directory.accounts() {
        writer.serialize(AccountStatement {
            account: *id,
            owner: acc.owner(),
            kind: acc.kind().name(),
            balance: acc.balance(),
            status: acc.status(),
            created_at: acc.created_at(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// write_history writes the audit trail oldest first; an empty log writes a single notice line
pub fn write_history<W: io::Write>(acc: &Account, mut out: W) -> Result<()> {
    if acc.transactions().is_empty() {
        writeln!(out, "No transactions yet.")?;
        return Ok(());
    }
    let mut writer = csv::Writer::from_writer(out);
    for t in acc.transactions() {
        writer.serialize(HistoryLine {
            timestamp: t.timestamp,
            description: t.description(),
            balance: t.balance,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_interest<W: io::Write>(
    report: &BTreeMap<AccountId, Decimal>,
    out: W,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for (id, interest) in report {
        writer.serialize(InterestLine {
            account: *id,
            interest: *interest,
        })?;
    }
    writer.flush()?;
    Ok(())
}
