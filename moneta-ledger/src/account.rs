use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use moneta_common::{Amount, CurrencyKey};

/// The platform's money buckets. An owner holds at most one account per
/// (currency, type) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Free custody funds, available for withdrawal.
    Funding,
    /// Funds pledged against an open loan.
    Collateral,
    /// Disbursed loan principal.
    Principal,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Funding => "funding",
            AccountType::Collateral => "collateral",
            AccountType::Principal => "principal",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub owner_id: String,
    pub currency: CurrencyKey,
    pub account_type: AccountType,
    /// Maintained balance; always equals the sum of this account's mutation
    /// amounts. Updated in the same transaction as each mutation append.
    pub balance: Amount,
}

/// Why an account balance moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    InvoiceReceived,
    WithdrawalRequested,
    WithdrawalRefunded,
    SettlementTransfer,
    ManualAdjustment,
}

/// Optional references tying a mutation back to the operation that caused it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationLinks {
    pub invoice_id: Option<String>,
    pub withdrawal_id: Option<String>,
    pub invoice_payment_id: Option<String>,
}

impl MutationLinks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn invoice(invoice_id: &str, payment_id: &str) -> Self {
        Self {
            invoice_id: Some(invoice_id.to_string()),
            invoice_payment_id: Some(payment_id.to_string()),
            ..Self::default()
        }
    }

    pub fn withdrawal(withdrawal_id: &str) -> Self {
        Self {
            withdrawal_id: Some(withdrawal_id.to_string()),
            ..Self::default()
        }
    }
}

/// One append-only ledger line. Never updated or deleted after commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountMutation {
    pub id: String,
    pub account_id: String,
    pub kind: MutationKind,
    pub date: DateTime<Utc>,
    /// Signed amount in base units; credits positive, debits negative.
    pub amount: Amount,
    #[serde(flatten)]
    pub links: MutationLinks,
}

/// Filters for the transaction history query.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub kind: Option<MutationKind>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    pub fn matches(&self, mutation: &AccountMutation) -> bool {
        if let Some(kind) = self.kind {
            if mutation.kind != kind {
                return false;
            }
        }
        if let Some(from) = self.from_date {
            if mutation.date < from {
                return false;
            }
        }
        if let Some(to) = self.to_date {
            if mutation.date > to {
                return false;
            }
        }
        true
    }
}
