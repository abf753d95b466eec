use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use moneta_common::{Amount, CurrencyKey};

/// Withdrawal destination. Append-only; registering the same address twice
/// yields two rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: String,
    pub owner_id: String,
    pub blockchain_key: String,
    pub address: String,
    pub created_date: DateTime<Utc>,
}

/// Withdrawal lifecycle.
///
/// ```text
/// Requested --send--> Sent --confirm--> Confirmed (terminal)
/// {Requested, Sent} --fail--> Failed --approve--> RefundApproved (terminal)
///                             Failed --reject---> RefundRejected (terminal)
/// ```
///
/// The stored enum is the single source of truth for a withdrawal's state;
/// the per-transition timestamps are immutable attachments and are never
/// consulted to infer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Requested,
    Sent,
    Confirmed,
    Failed,
    RefundApproved,
    RefundRejected,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Confirmed
                | WithdrawalStatus::RefundApproved
                | WithdrawalStatus::RefundRejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Requested => "requested",
            WithdrawalStatus::Sent => "sent",
            WithdrawalStatus::Confirmed => "confirmed",
            WithdrawalStatus::Failed => "failed",
            WithdrawalStatus::RefundApproved => "refund_approved",
            WithdrawalStatus::RefundRejected => "refund_rejected",
        }
    }

    /// Whether this withdrawal still counts against the owner's daily limit.
    /// Failed and refund-approved requests never left the platform (or came
    /// back), so they release their slice of the limit.
    pub fn counts_toward_daily_limit(&self) -> bool {
        !matches!(
            self,
            WithdrawalStatus::Failed | WithdrawalStatus::RefundApproved
        )
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalEvent {
    Send,
    Confirm,
    Fail,
    ApproveRefund,
    RejectRefund,
}

impl std::fmt::Display for WithdrawalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WithdrawalEvent::Send => "send",
            WithdrawalEvent::Confirm => "confirm",
            WithdrawalEvent::Fail => "fail",
            WithdrawalEvent::ApproveRefund => "approve_refund",
            WithdrawalEvent::RejectRefund => "reject_refund",
        };
        write!(f, "{}", name)
    }
}

/// The transition table. Everything not listed is an invalid transition;
/// in particular no event ever moves a withdrawal back to an earlier state,
/// and from `Failed` exactly one of approve/reject can ever fire (the first
/// one moves to a terminal state).
pub fn transition(
    current: WithdrawalStatus,
    event: WithdrawalEvent,
) -> Option<WithdrawalStatus> {
    use WithdrawalEvent as E;
    use WithdrawalStatus as S;
    match (current, event) {
        (S::Requested, E::Send) => Some(S::Sent),
        (S::Sent, E::Confirm) => Some(S::Confirmed),
        (S::Requested | S::Sent, E::Fail) => Some(S::Failed),
        (S::Failed, E::ApproveRefund) => Some(S::RefundApproved),
        (S::Failed, E::RejectRefund) => Some(S::RefundRejected),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: String,
    pub beneficiary_id: String,
    pub owner_id: String,
    pub currency: CurrencyKey,
    pub request_amount: Amount,
    pub status: WithdrawalStatus,
    pub request_date: DateTime<Utc>,
    pub sent_amount: Option<Amount>,
    pub sent_hash: Option<String>,
    pub sent_date: Option<DateTime<Utc>>,
    pub confirmed_date: Option<DateTime<Utc>>,
    pub failed_date: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub refund_reviewer_id: Option<String>,
    pub refund_approved_date: Option<DateTime<Utc>>,
    pub refund_rejected_date: Option<DateTime<Utc>>,
    pub refund_rejection_reason: Option<String>,
}
