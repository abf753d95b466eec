pub mod error;
pub mod limits;
pub mod machine;
pub mod withdrawal;

pub use error::{Result, WithdrawalError};
pub use limits::DailyLimits;
pub use machine::WithdrawalStateMachine;
pub use withdrawal::{
    transition, Beneficiary, Withdrawal, WithdrawalEvent, WithdrawalStatus,
};
