use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::directory::AccountId;
use crate::transactions::{Transaction, TransactionKind, WithdrawalFailure};

#[derive(Error, Debug, PartialEq)]
pub enum AccountError {
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("withdrawal would breach the minimum balance and the fee cannot be covered")]
    InsufficientFundsForFee,
    #[error("account is closed")]
    AccountClosed,
    #[error("invalid account policy: {0}")]
    InvalidPolicy(&'static str),
    #[error("amount is out of range")]
    AmountOutOfRange,
}

/// AccountKind carries the withdraw/interest policy of an account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum AccountKind {
    Savings {
        monthly_interest_rate: Decimal,
    },
    Current {
        minimum_balance: Decimal,
        below_min_fee: Decimal,
    },
}

impl AccountKind {
    pub fn name(&self) -> &'static str {
        match self {
            AccountKind::Savings { .. } => "savings",
            AccountKind::Current { .. } => "current",
        }
    }
    fn validate(&self) -> Result<(), AccountError> {
        match *self {
            AccountKind::Savings {
                monthly_interest_rate,
            } if monthly_interest_rate < Decimal::ZERO => Err(AccountError::InvalidPolicy(
                "monthly interest rate must not be negative",
            )),
            AccountKind::Current {
                minimum_balance, ..
            } if minimum_balance < Decimal::ZERO => Err(AccountError::InvalidPolicy(
                "minimum balance must not be negative",
            )),
            AccountKind::Current { below_min_fee, .. } if below_min_fee < Decimal::ZERO => Err(
                AccountError::InvalidPolicy("below minimum fee must not be negative"),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    owner: String,
    balance: Decimal,
    #[serde(flatten)]
    kind: AccountKind,
    status: AccountStatus,
    created_at: DateTime<Utc>,
    transactions: Vec<Transaction>,
}

impl Account {
    /// new opens an active account, recording a positive initial deposit as its first transaction
    pub fn new(
        owner: impl Into<String>,
        initial_deposit: Decimal,
        kind: AccountKind,
    ) -> Result<Account, AccountError> {
        if initial_deposit < Decimal::ZERO {
            return Err(AccountError::InvalidAmount);
        }
        kind.validate()?;
        let mut acc = Account {
            owner: owner.into(),
            balance: Decimal::ZERO,
            kind,
            status: AccountStatus::Active,
            created_at: Utc::now(),
            transactions: Vec::new(),
        };
        if initial_deposit > Decimal::ZERO {
            acc.apply(TransactionKind::InitialDeposit {
                amount: initial_deposit,
            })?;
        }
        Ok(acc)
    }
    pub fn owner(&self) -> &str {
        &self.owner
    }
    pub fn balance(&self) -> Decimal {
        self.balance
    }
    pub fn kind(&self) -> &AccountKind {
        &self.kind
    }
    pub fn status(&self) -> AccountStatus {
        self.status
    }
    pub fn is_closed(&self) -> bool {
        self.status == AccountStatus::Closed
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }
    /// replayed_balance sums the deltas of the whole log, None if the sum leaves the decimal range
    pub fn replayed_balance(&self) -> Option<Decimal> {
        self.transactions
            .iter()
            .try_fold(Decimal::ZERO, |sum, t| sum.checked_add(t.delta()?))
    }

    // the only place the balance changes; nothing is logged when the result is out of range
    fn apply(&mut self, kind: TransactionKind) -> Result<(), AccountError> {
        let balance = kind
            .delta()
            .and_then(|delta| self.balance.checked_add(delta))
            .ok_or(AccountError::AmountOutOfRange)?;
        self.balance = balance;
        self.transactions.push(Transaction::record(kind, balance));
        Ok(())
    }

    pub(crate) fn record_opening(&mut self, id: AccountId) -> Result<(), AccountError> {
        self.apply(TransactionKind::Opened { account: id })
    }

    fn ensure_active(&self) -> Result<(), AccountError> {
        if self.is_closed() {
            return Err(AccountError::AccountClosed);
        }
        Ok(())
    }

    pub fn deposit(&mut self, amount: Decimal) -> Result<(), AccountError> {
        self.ensure_active()?;
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount);
        }
        self.apply(TransactionKind::Deposit { amount })
    }

    /// withdraw applies the account's withdrawal policy and returns the total debited.
    ///
    /// Refusals for lack of funds are recorded in the log before the error is returned.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<Decimal, AccountError> {
        self.ensure_active()?;
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount);
        }
        if amount > self.balance {
            self.apply(TransactionKind::FailedWithdrawal {
                amount,
                reason: WithdrawalFailure::InsufficientFunds,
            })?;
            return Err(AccountError::InsufficientFunds);
        }
        match self.kind {
            AccountKind::Savings { .. } => {
                self.apply(TransactionKind::Withdrawal { amount })?;
                Ok(amount)
            }
            AccountKind::Current {
                minimum_balance,
                below_min_fee,
            } => {
                // strictly below: landing exactly on the minimum is free
                let remaining = self.balance - amount;
                if remaining >= minimum_balance {
                    self.apply(TransactionKind::Withdrawal { amount })?;
                    return Ok(amount);
                }
                let total = amount
                    .checked_add(below_min_fee)
                    .ok_or(AccountError::AmountOutOfRange)?;
                if total > self.balance {
                    self.apply(TransactionKind::FailedWithdrawal {
                        amount,
                        reason: WithdrawalFailure::CannotCoverFee,
                    })?;
                    return Err(AccountError::InsufficientFundsForFee);
                }
                self.apply(TransactionKind::WithdrawalWithFee {
                    amount,
                    fee: below_min_fee,
                })?;
                Ok(total)
            }
        }
    }

    /// apply_monthly_interest returns the interest credited, zero when nothing applies
    pub fn apply_monthly_interest(&mut self) -> Result<Decimal, AccountError> {
        self.ensure_active()?;
        match self.kind {
            AccountKind::Savings {
                monthly_interest_rate,
            } => {
                if self.balance <= Decimal::ZERO {
                    return Ok(Decimal::ZERO);
                }
                let interest = self
                    .balance
                    .checked_mul(monthly_interest_rate)
                    .ok_or(AccountError::AmountOutOfRange)?;
                self.apply(TransactionKind::Interest { amount: interest })?;
                Ok(interest)
            }
            AccountKind::Current { .. } => Ok(Decimal::ZERO),
        }
    }

    pub fn close(&mut self) -> Result<(), AccountError> {
        self.ensure_active()?;
        self.apply(TransactionKind::Closed)?;
        self.status = AccountStatus::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn savings(deposit: i64) -> Result<Account> {
        Ok(Account::new(
            "Alice",
            Decimal::from(deposit),
            AccountKind::Savings {
                monthly_interest_rate: Decimal::new(5, 2),
            },
        )?)
    }

    fn current(deposit: i64) -> Result<Account> {
        Ok(Account::new(
            "Bob",
            Decimal::from(deposit),
            AccountKind::Current {
                minimum_balance: Decimal::from(100),
                below_min_fee: Decimal::from(10),
            },
        )?)
    }

    #[test]
    fn test_new_account() -> Result<()> {
        let acc = savings(1000)?;
        assert_eq!(acc.owner(), "Alice");
        assert_eq!(acc.balance(), Decimal::from(1000));
        assert_eq!(acc.status(), AccountStatus::Active);
        assert_eq!(acc.transactions().len(), 1);
        assert_eq!(
            acc.transactions()[0].kind,
            TransactionKind::InitialDeposit {
                amount: Decimal::from(1000)
            }
        );
        Ok(())
    }

    #[test]
    fn test_new_account_without_deposit_has_empty_log() -> Result<()> {
        let acc = current(0)?;
        assert_eq!(acc.balance(), Decimal::ZERO);
        assert!(acc.transactions().is_empty());
        Ok(())
    }

    #[test]
    fn test_new_account_negative_deposit() {
        let acc = Account::new(
            "Alice",
            Decimal::from(-1),
            AccountKind::Savings {
                monthly_interest_rate: Decimal::new(5, 2),
            },
        );
        assert_eq!(acc.unwrap_err(), AccountError::InvalidAmount);
    }

    #[test]
    fn test_new_account_negative_policy() {
        let acc = Account::new(
            "Bob",
            Decimal::from(10),
            AccountKind::Current {
                minimum_balance: Decimal::from(100),
                below_min_fee: Decimal::from(-10),
            },
        );
        assert!(matches!(acc.unwrap_err(), AccountError::InvalidPolicy(_)));
    }

    #[test]
    fn test_deposit() -> Result<()> {
        let mut acc = savings(1000)?;
        acc.deposit(Decimal::from(200))?;
        assert_eq!(acc.balance(), Decimal::from(1200));
        assert_eq!(acc.transactions().len(), 2);
        assert_eq!(acc.transactions()[1].balance, Decimal::from(1200));
        Ok(())
    }

    #[test]
    fn test_deposit_invalid_amount() -> Result<()> {
        let mut acc = savings(1000)?;
        for amount in [Decimal::ZERO, Decimal::from(-5)] {
            let res = acc.deposit(amount);
            assert_eq!(res.unwrap_err(), AccountError::InvalidAmount);
        }
        assert_eq!(acc.balance(), Decimal::from(1000));
        assert_eq!(acc.transactions().len(), 1);
        Ok(())
    }

    #[test]
    fn test_withdraw_invalid_amount_is_not_logged() -> Result<()> {
        let mut acc = current(500)?;
        let res = acc.withdraw(Decimal::ZERO);
        assert_eq!(res.unwrap_err(), AccountError::InvalidAmount);
        assert_eq!(acc.transactions().len(), 1);
        Ok(())
    }

    #[test]
    fn test_savings_withdraw() -> Result<()> {
        let mut acc = savings(1000)?;
        let debited = acc.withdraw(Decimal::from(50))?;
        assert_eq!(debited, Decimal::from(50));
        assert_eq!(acc.balance(), Decimal::from(950));
        Ok(())
    }

    #[test]
    fn test_savings_withdraw_whole_balance() -> Result<()> {
        let mut acc = savings(1000)?;
        acc.withdraw(Decimal::from(1000))?;
        assert_eq!(acc.balance(), Decimal::ZERO);
        Ok(())
    }

    #[test]
    fn test_savings_withdraw_insufficient_funds() -> Result<()> {
        let mut acc = savings(100)?;
        let res = acc.withdraw(Decimal::from(150));
        assert_eq!(res.unwrap_err(), AccountError::InsufficientFunds);
        assert_eq!(acc.balance(), Decimal::from(100));
        assert_eq!(acc.transactions().len(), 2);
        assert_eq!(
            acc.transactions()[1].kind,
            TransactionKind::FailedWithdrawal {
                amount: Decimal::from(150),
                reason: WithdrawalFailure::InsufficientFunds,
            }
        );
        assert_eq!(acc.transactions()[1].balance, Decimal::from(100));
        Ok(())
    }

    #[test]
    fn test_current_withdraw_above_minimum() -> Result<()> {
        let mut acc = current(500)?;
        let debited = acc.withdraw(Decimal::from(50))?;
        assert_eq!(debited, Decimal::from(50));
        assert_eq!(acc.balance(), Decimal::from(450));
        Ok(())
    }

    #[test]
    fn test_current_withdraw_charges_fee() -> Result<()> {
        let mut acc = current(500)?;
        let debited = acc.withdraw(Decimal::from(420))?;
        assert_eq!(debited, Decimal::from(430));
        assert_eq!(acc.balance(), Decimal::from(70));
        assert_eq!(acc.transactions().len(), 2);
        assert_eq!(
            acc.transactions()[1].kind,
            TransactionKind::WithdrawalWithFee {
                amount: Decimal::from(420),
                fee: Decimal::from(10),
            }
        );
        Ok(())
    }

    #[test]
    fn test_current_withdraw_cannot_cover_fee() -> Result<()> {
        let mut acc = current(500)?;
        let res = acc.withdraw(Decimal::from(495));
        assert_eq!(res.unwrap_err(), AccountError::InsufficientFundsForFee);
        assert_eq!(acc.balance(), Decimal::from(500));
        assert_eq!(
            acc.transactions()[1].kind,
            TransactionKind::FailedWithdrawal {
                amount: Decimal::from(495),
                reason: WithdrawalFailure::CannotCoverFee,
            }
        );
        Ok(())
    }

    #[test]
    fn test_current_withdraw_landing_on_minimum_is_free() -> Result<()> {
        let mut acc = current(500)?;
        let debited = acc.withdraw(Decimal::from(400))?;
        assert_eq!(debited, Decimal::from(400));
        assert_eq!(acc.balance(), Decimal::from(100));
        Ok(())
    }

    #[test]
    fn test_current_withdraw_insufficient_funds() -> Result<()> {
        let mut acc = current(500)?;
        let res = acc.withdraw(Decimal::from(501));
        assert_eq!(res.unwrap_err(), AccountError::InsufficientFunds);
        assert_eq!(acc.balance(), Decimal::from(500));
        assert_eq!(acc.transactions().len(), 2);
        Ok(())
    }

    #[test]
    fn test_savings_interest() -> Result<()> {
        let mut acc = savings(1000)?;
        let interest = acc.apply_monthly_interest()?;
        assert_eq!(interest, Decimal::from(50));
        assert_eq!(acc.balance(), Decimal::from(1050));
        assert_eq!(acc.transactions().len(), 2);
        Ok(())
    }

    #[test]
    fn test_savings_interest_on_empty_balance() -> Result<()> {
        let mut acc = savings(0)?;
        let interest = acc.apply_monthly_interest()?;
        assert_eq!(interest, Decimal::ZERO);
        assert_eq!(acc.balance(), Decimal::ZERO);
        assert!(acc.transactions().is_empty());
        Ok(())
    }

    #[test]
    fn test_current_interest_is_noop() -> Result<()> {
        let mut acc = current(500)?;
        assert_eq!(acc.apply_monthly_interest()?, Decimal::ZERO);
        assert_eq!(acc.balance(), Decimal::from(500));
        assert_eq!(acc.transactions().len(), 1);
        Ok(())
    }

    #[test]
    fn test_close_rejects_mutation() -> Result<()> {
        let mut acc = savings(1000)?;
        acc.close()?;
        assert!(acc.is_closed());
        assert_eq!(
            acc.deposit(Decimal::from(1)).unwrap_err(),
            AccountError::AccountClosed
        );
        assert_eq!(
            acc.withdraw(Decimal::from(1)).unwrap_err(),
            AccountError::AccountClosed
        );
        assert_eq!(
            acc.apply_monthly_interest().unwrap_err(),
            AccountError::AccountClosed
        );
        assert_eq!(acc.close().unwrap_err(), AccountError::AccountClosed);
        assert_eq!(acc.balance(), Decimal::from(1000));
        assert_eq!(acc.transactions().len(), 2);
        Ok(())
    }

    #[test]
    fn test_replayed_balance_matches() -> Result<()> {
        let mut acc = current(500)?;
        acc.deposit(Decimal::new(1999, 2))?;
        acc.withdraw(Decimal::from(50))?;
        let _ = acc.withdraw(Decimal::from(1000));
        acc.withdraw(Decimal::from(400))?;
        let _ = acc.withdraw(Decimal::from(65));
        assert_eq!(acc.replayed_balance(), Some(acc.balance()));

        let mut acc = savings(1000)?;
        acc.apply_monthly_interest()?;
        let _ = acc.withdraw(Decimal::from(5000));
        acc.withdraw(Decimal::new(3333, 2))?;
        acc.apply_monthly_interest()?;
        assert_eq!(acc.replayed_balance(), Some(acc.balance()));
        Ok(())
    }

    #[test]
    fn test_savings_interest_at_zero_rate_is_logged() -> Result<()> {
        let mut acc = Account::new(
            "Alice",
            Decimal::from(1000),
            AccountKind::Savings {
                monthly_interest_rate: Decimal::ZERO,
            },
        )?;
        assert_eq!(acc.apply_monthly_interest()?, Decimal::ZERO);
        assert_eq!(acc.balance(), Decimal::from(1000));
        assert_eq!(acc.transactions().len(), 2);
        assert_eq!(acc.transactions()[1].description(), "Interest credited: 0.00");
        Ok(())
    }

    #[test]
    fn test_deposit_out_of_range() -> Result<()> {
        let mut acc = Account::new(
            "Alice",
            Decimal::MAX,
            AccountKind::Savings {
                monthly_interest_rate: Decimal::from(2),
            },
        )?;
        let res = acc.deposit(Decimal::ONE);
        assert_eq!(res.unwrap_err(), AccountError::AmountOutOfRange);
        let res = acc.apply_monthly_interest();
        assert_eq!(res.unwrap_err(), AccountError::AmountOutOfRange);
        assert_eq!(acc.balance(), Decimal::MAX);
        assert_eq!(acc.transactions().len(), 1);
        Ok(())
    }

    #[test]
    fn test_current_withdraw_fee_out_of_range() -> Result<()> {
        let mut acc = Account::new(
            "Bob",
            Decimal::MAX,
            AccountKind::Current {
                minimum_balance: Decimal::from(100),
                below_min_fee: Decimal::from(10),
            },
        )?;
        let res = acc.withdraw(Decimal::MAX);
        assert_eq!(res.unwrap_err(), AccountError::AmountOutOfRange);
        assert_eq!(acc.balance(), Decimal::MAX);
        assert_eq!(acc.transactions().len(), 1);
        Ok(())
    }

    #[test]
    fn test_record_opening() -> Result<()> {
        let mut acc = savings(1000)?;
        acc.record_opening(AccountId::new(2001))?;
        assert_eq!(acc.balance(), Decimal::from(1000));
        assert_eq!(acc.transactions()[1].description(), "Account created: 2001");
        assert_eq!(acc.replayed_balance(), Some(acc.balance()));
        Ok(())
    }
}
