pub mod account;
pub mod error;
pub mod ledger;

pub use account::{
    Account, AccountMutation, AccountType, HistoryFilter, MutationKind, MutationLinks,
};
pub use error::{LedgerError, Result};
pub use ledger::AccountLedger;
