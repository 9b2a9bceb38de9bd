use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use crate::directory::AccountId;

/// Why a withdrawal was refused after passing amount validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalFailure {
    InsufficientFunds,
    CannotCoverFee,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TransactionKind {
    InitialDeposit { amount: Decimal },
    Opened { account: AccountId },
    Deposit { amount: Decimal },
    Withdrawal { amount: Decimal },
    WithdrawalWithFee { amount: Decimal, fee: Decimal },
    FailedWithdrawal { amount: Decimal, reason: WithdrawalFailure },
    Interest { amount: Decimal },
    Closed,
}

impl TransactionKind {
    /// delta is the signed change this entry made to the balance, None when it overflows
    pub fn delta(&self) -> Option<Decimal> {
        match *self {
            TransactionKind::InitialDeposit { amount }
            | TransactionKind::Deposit { amount }
            | TransactionKind::Interest { amount } => Some(amount),
            TransactionKind::Withdrawal { amount } => Some(-amount),
            TransactionKind::WithdrawalWithFee { amount, fee } => {
                amount.checked_add(fee).map(|total| -total)
            }
            TransactionKind::Opened { .. }
            | TransactionKind::FailedWithdrawal { .. }
            | TransactionKind::Closed => Some(Decimal::ZERO),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::InitialDeposit { amount } => {
                write!(f, "Initial deposit: {:.2}", amount)
            }
            TransactionKind::Opened { account } => write!(f, "Account created: {}", account),
            TransactionKind::Deposit { amount } => write!(f, "Deposited: {:.2}", amount),
            TransactionKind::Withdrawal { amount } => write!(f, "Withdrew: {:.2}", amount),
            TransactionKind::WithdrawalWithFee { amount, fee } => {
                write!(f, "Withdrew: {:.2}. Fee charged: {:.2}", amount, fee)
            }
            TransactionKind::FailedWithdrawal {
                amount,
                reason: WithdrawalFailure::InsufficientFunds,
            } => write!(
                f,
                "Failed withdrawal attempt: {:.2} (insufficient funds)",
                amount
            ),
            TransactionKind::FailedWithdrawal {
                amount,
                reason: WithdrawalFailure::CannotCoverFee,
            } => write!(
                f,
                "Failed withdrawal attempt: {:.2} (would breach minimum balance and cannot pay fee)",
                amount
            ),
            TransactionKind::Interest { amount } => {
                write!(f, "Interest credited: {:.2}", amount)
            }
            TransactionKind::Closed => write!(f, "Account closed"),
        }
    }
}

/// A single entry of an account's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: TransactionKind,
    /// balance after the entry was applied
    pub balance: Decimal,
}

impl Transaction {
    pub(crate) fn record(kind: TransactionKind, balance: Decimal) -> Transaction {
        Transaction {
            timestamp: Utc::now(),
            kind,
            balance,
        }
    }
    pub fn description(&self) -> String {
        self.kind.to_string()
    }
    pub fn delta(&self) -> Option<Decimal> {
        self.kind.delta()
    }
}
