use thiserror::Error;

use moneta_common::AmountError;
use moneta_store::StoreError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
