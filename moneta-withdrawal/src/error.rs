use thiserror::Error;

use moneta_common::AmountError;
use moneta_ledger::LedgerError;
use moneta_store::StoreError;

use crate::withdrawal::{WithdrawalEvent, WithdrawalStatus};

#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("Withdrawal not found: {0}")]
    NotFound(String),

    /// The compare-and-swap on the stored status matched zero rows. A
    /// definitive conflict, not a transient error: the withdrawal moved on
    /// (or never was) and the caller must re-read before deciding anything.
    #[error("Transition '{event}' failed: withdrawal is {from}")]
    InvalidTransition {
        from: WithdrawalStatus,
        event: WithdrawalEvent,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, WithdrawalError>;
