use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use moneta_common::{Amount, CurrencyKey};
use moneta_ledger::AccountType;

/// What a deposit invoice pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    LoanCollateral,
    LoanPrincipal,
    LoanRepayment,
}

impl InvoiceKind {
    /// The ledger account a matched payment is credited to.
    pub fn account_type(&self) -> AccountType {
        match self {
            InvoiceKind::LoanCollateral => AccountType::Collateral,
            InvoiceKind::LoanPrincipal => AccountType::Principal,
            InvoiceKind::LoanRepayment => AccountType::Funding,
        }
    }
}

/// Invoice lifecycle: `Pending -> {PartiallyPaid, Overdue} -> {Paid, Expired}`.
///
/// Transitions are monotonic over the rank below; an invoice can never
/// revisit an earlier state, and `Paid`/`Expired` are terminal and mutually
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    PartiallyPaid,
    Overdue,
    Paid,
    Expired,
}

impl InvoiceStatus {
    fn rank(&self) -> u8 {
        match self {
            InvoiceStatus::Pending => 0,
            InvoiceStatus::PartiallyPaid => 1,
            InvoiceStatus::Overdue => 2,
            InvoiceStatus::Paid | InvoiceStatus::Expired => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Expired)
    }

    /// Still awaiting payment (and so still eligible for expiry).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition(&self, to: InvoiceStatus) -> bool {
        !self.is_terminal() && to.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub owner_id: String,
    pub currency: CurrencyKey,
    pub invoiced_amount: Amount,
    pub paid_amount: Amount,
    pub wallet_address: String,
    pub derivation_path: String,
    pub kind: InvoiceKind,
    pub status: InvoiceStatus,
    pub invoice_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub expired_date: Option<DateTime<Utc>>,
    pub paid_date: Option<DateTime<Utc>>,
    pub notified_date: Option<DateTime<Utc>>,
}

/// One matched on-chain payment. An invoice may collect several.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePayment {
    pub id: String,
    pub invoice_id: String,
    pub payment_hash: String,
    pub amount: Amount,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub payments: Vec<InvoicePayment>,
}
