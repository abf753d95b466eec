use thiserror::Error;

use moneta_common::AmountError;
use moneta_ledger::LedgerError;
use moneta_store::StoreError;

use crate::invoice::InvoiceStatus;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("Invoice not found: {0}")]
    NotFound(String),

    /// The stored status did not admit the requested move. The compare
    /// matched zero rows, a definitive conflict; callers must not retry
    /// blindly.
    #[error("Invalid invoice transition: {from} -> {to}")]
    InvalidTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, InvoiceError>;
