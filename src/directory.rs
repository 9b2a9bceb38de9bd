use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use anyhow::{bail, Result};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::accounts::{Account, AccountError, AccountKind};
use crate::store::AccountsStore;

const FIRST_ACCOUNT_ID: u32 = 2001;

#[derive(Error, Debug, PartialEq)]
pub enum DirectoryError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("account {0} already exists")]
    DuplicateIdentifier(AccountId),
    #[error("no account numbers left to assign")]
    IdentifiersExhausted,
    #[error(transparent)]
    Account(#[from] AccountError),
}

/// AccountId is an opaque account number, rendered as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(u32);

impl AccountId {
    pub fn new(id: u32) -> AccountId {
        AccountId(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = ParseIntError;
    fn from_str(s: &str) -> Result<AccountId, ParseIntError> {
        s.trim().parse().map(AccountId)
    }
}

pub struct AccountDirectory<'a> {
    store: &'a dyn AccountsStore,
    accounts: BTreeMap<AccountId, Account>,
    // None once the largest account number has been handed out
    next_id: Option<u32>,
}

impl<'a> AccountDirectory<'a> {
    /// open loads every account the store holds and checks each log against its balance
    pub fn open(store: &'a dyn AccountsStore) -> Result<AccountDirectory<'a>> {
        let accounts = store.load()?;
        for (id, acc) in &accounts {
            if acc.replayed_balance() != Some(acc.balance()) {
                bail!(
                    "account {} is corrupt: balance {} does not match its transactions",
                    id,
                    acc.balance()
                );
            }
        }
        let next_id = accounts
            .keys()
            .next_back()
            .map_or(Some(FIRST_ACCOUNT_ID), |id| id.0.checked_add(1));
        debug!(accounts = accounts.len(), ?next_id, "Opened account directory");
        Ok(AccountDirectory {
            store,
            accounts,
            next_id,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.store.save(&self.accounts)?;
        debug!(accounts = self.accounts.len(), "Saved account directory");
        Ok(())
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &Account)> {
        self.accounts.iter()
    }

    pub fn create_savings(
        &mut self,
        owner: &str,
        initial_deposit: Decimal,
        monthly_interest_rate: Decimal,
    ) -> Result<AccountId, DirectoryError> {
        self.create(
            owner,
            initial_deposit,
            AccountKind::Savings {
                monthly_interest_rate,
            },
        )
    }

    pub fn create_current(
        &mut self,
        owner: &str,
        initial_deposit: Decimal,
        minimum_balance: Decimal,
        below_min_fee: Decimal,
    ) -> Result<AccountId, DirectoryError> {
        self.create(
            owner,
            initial_deposit,
            AccountKind::Current {
                minimum_balance,
                below_min_fee,
            },
        )
    }

    fn create(
        &mut self,
        owner: &str,
        initial_deposit: Decimal,
        kind: AccountKind,
    ) -> Result<AccountId, DirectoryError> {
        let id = AccountId(self.next_id.ok_or(DirectoryError::IdentifiersExhausted)?);
        let mut acc = Account::new(owner, initial_deposit, kind)?;
        acc.record_opening(id)?;
        self.insert(id, acc)?;
        self.next_id = id.0.checked_add(1);
        debug!(
            account = %id,
            owner,
            kind = kind.name(),
            initial_deposit = %initial_deposit,
            "Created account"
        );
        Ok(id)
    }

    fn insert(&mut self, id: AccountId, acc: Account) -> Result<(), DirectoryError> {
        if self.accounts.contains_key(&id) {
            return Err(DirectoryError::DuplicateIdentifier(id));
        }
        self.accounts.insert(id, acc);
        Ok(())
    }

    pub fn get(&self, id: AccountId) -> Result<&Account, DirectoryError> {
        self.accounts
            .get(&id)
            .ok_or(DirectoryError::AccountNotFound(id))
    }

    fn get_mut(&mut self, id: AccountId) -> Result<&mut Account, DirectoryError> {
        self.accounts
            .get_mut(&id)
            .ok_or(DirectoryError::AccountNotFound(id))
    }

    pub fn deposit(&mut self, id: AccountId, amount: Decimal) -> Result<Decimal, DirectoryError> {
        let acc = self.get_mut(id)?;
        match acc.deposit(amount) {
            Ok(()) => {
                debug!(account = %id, amount = %amount, balance = %acc.balance(), "Deposited");
                Ok(acc.balance())
            }
            Err(e) => {
                warn!(
                    error = e.to_string(),
                    account = %id,
                    amount = %amount,
                    "Unable to deposit"
                );
                Err(e.into())
            }
        }
    }

    pub fn withdraw(&mut self, id: AccountId, amount: Decimal) -> Result<Decimal, DirectoryError> {
        let acc = self.get_mut(id)?;
        match acc.withdraw(amount) {
            Ok(debited) => {
                debug!(
                    account = %id,
                    amount = %amount,
                    debited = %debited,
                    balance = %acc.balance(),
                    "Withdrew"
                );
                Ok(acc.balance())
            }
            Err(e) => {
                warn!(
                    error = e.to_string(),
                    account = %id,
                    amount = %amount,
                    "Unable to withdraw"
                );
                Err(e.into())
            }
        }
    }

    pub fn close(&mut self, id: AccountId) -> Result<(), DirectoryError> {
        self.get_mut(id)?.close()?;
        debug!(account = %id, "Closed account");
        Ok(())
    }

    /// apply_monthly_interest_to_all reports the interest credited per account.
    ///
    /// Closed accounts are skipped and reported with zero.
    pub fn apply_monthly_interest_to_all(
        &mut self,
    ) -> Result<BTreeMap<AccountId, Decimal>, DirectoryError> {
        let mut report = BTreeMap::new();
        for (id, acc) in self.accounts.iter_mut() {
            let interest = if acc.is_closed() {
                Decimal::ZERO
            } else {
                acc.apply_monthly_interest()?
            };
            debug!(account = %id, interest = %interest, "Applied monthly interest");
            report.insert(*id, interest);
        }
        Ok(report)
    }
}
