use chrono::{DateTime, Duration, NaiveTime, Utc};
use redb::{ReadableTable, TableDefinition};
use tracing::info;

use moneta_common::{is_valid_blockchain_key, new_id, Amount, CurrencyKey, Page, PageRequest};
use moneta_ledger::{AccountLedger, AccountType, MutationKind, MutationLinks};
use moneta_store::{decode, encode, prefix_bounds, Store, StoreError};

use crate::error::{Result, WithdrawalError};
use crate::limits::DailyLimits;
use crate::withdrawal::{
    transition, Beneficiary, Withdrawal, WithdrawalEvent, WithdrawalStatus,
};

const BENEFICIARIES: TableDefinition<&str, &[u8]> = TableDefinition::new("beneficiaries");
const WITHDRAWALS: TableDefinition<&str, &[u8]> = TableDefinition::new("withdrawals");
// owner|request_date_millis|id -> withdrawal id
const WITHDRAWALS_BY_OWNER: TableDefinition<&str, &str> =
    TableDefinition::new("withdrawals_by_owner");

/// Outbound transfer lifecycle and refund workflow.
///
/// Every status move is a compare-and-swap: the stored status is read, run
/// through [`transition`], and rewritten inside one write transaction. A
/// state that does not admit the event surfaces as
/// [`WithdrawalError::InvalidTransition`].
#[derive(Debug, Clone)]
pub struct WithdrawalStateMachine {
    store: Store,
    limits: DailyLimits,
}

impl WithdrawalStateMachine {
    pub fn new(store: Store, limits: DailyLimits) -> Result<Self> {
        store.write(|txn| {
            txn.open_table(BENEFICIARIES).map_err(StoreError::from)?;
            txn.open_table(WITHDRAWALS).map_err(StoreError::from)?;
            txn.open_table(WITHDRAWALS_BY_OWNER).map_err(StoreError::from)?;
            Ok::<_, WithdrawalError>(())
        })?;
        Ok(Self { store, limits })
    }

    /// Registers a destination address. Append-only; duplicates are allowed.
    pub async fn register_beneficiary(
        &self,
        owner_id: &str,
        blockchain_key: &str,
        address: &str,
    ) -> Result<Beneficiary> {
        if !is_valid_blockchain_key(blockchain_key) {
            return Err(WithdrawalError::InvalidRequest(format!(
                "malformed blockchain key: {}",
                blockchain_key
            )));
        }
        if address.trim().is_empty() {
            return Err(WithdrawalError::InvalidRequest("empty address".to_string()));
        }

        let beneficiary = Beneficiary {
            id: new_id(),
            owner_id: owner_id.to_string(),
            blockchain_key: blockchain_key.to_string(),
            address: address.to_string(),
            created_date: Utc::now(),
        };
        self.store.write(|txn| {
            let mut table = txn.open_table(BENEFICIARIES).map_err(StoreError::from)?;
            table
                .insert(beneficiary.id.as_str(), encode(&beneficiary)?.as_slice())
                .map_err(StoreError::from)?;
            Ok::<_, WithdrawalError>(())
        })?;
        info!(owner = owner_id, chain = blockchain_key, "registered beneficiary {}", beneficiary.id);
        Ok(beneficiary)
    }

    /// Creates a withdrawal in `Requested`.
    ///
    /// Precondition (caller contract): the owner's account holds at least
    /// `amount` and the request fits the remaining daily limit. Those checks
    /// belong to the policy layer above; this component does not debit the
    /// ledger and will happily record a request the policy layer should have
    /// rejected. [`WithdrawalStateMachine::get_remaining_daily_limit`] exists
    /// for that caller.
    pub async fn request_withdrawal(
        &self,
        beneficiary_id: &str,
        currency: &CurrencyKey,
        amount: Amount,
        request_date: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        if amount.is_negative() || amount.is_zero() {
            return Err(WithdrawalError::InvalidRequest(format!(
                "non-positive withdrawal amount: {}",
                amount
            )));
        }

        self.store.write(|txn| {
            let beneficiaries = txn.open_table(BENEFICIARIES).map_err(StoreError::from)?;
            let beneficiary = match beneficiaries.get(beneficiary_id).map_err(StoreError::from)? {
                Some(row) => decode::<Beneficiary>(row.value())?,
                None => return Err(WithdrawalError::NotFound(beneficiary_id.to_string())),
            };
            if beneficiary.blockchain_key != currency.blockchain_key {
                return Err(WithdrawalError::InvalidRequest(format!(
                    "currency {} is not on beneficiary chain {}",
                    currency, beneficiary.blockchain_key
                )));
            }

            let withdrawal = Withdrawal {
                id: new_id(),
                beneficiary_id: beneficiary_id.to_string(),
                owner_id: beneficiary.owner_id.clone(),
                currency: currency.clone(),
                request_amount: amount,
                status: WithdrawalStatus::Requested,
                request_date,
                sent_amount: None,
                sent_hash: None,
                sent_date: None,
                confirmed_date: None,
                failed_date: None,
                failure_reason: None,
                refund_reviewer_id: None,
                refund_approved_date: None,
                refund_rejected_date: None,
                refund_rejection_reason: None,
            };

            let mut withdrawals = txn.open_table(WITHDRAWALS).map_err(StoreError::from)?;
            withdrawals
                .insert(withdrawal.id.as_str(), encode(&withdrawal)?.as_slice())
                .map_err(StoreError::from)?;
            let mut by_owner = txn.open_table(WITHDRAWALS_BY_OWNER).map_err(StoreError::from)?;
            by_owner
                .insert(
                    owner_key(&withdrawal.owner_id, request_date, &withdrawal.id).as_str(),
                    withdrawal.id.as_str(),
                )
                .map_err(StoreError::from)?;

            info!(
                owner = %withdrawal.owner_id,
                currency = %currency,
                amount = %amount,
                "requested withdrawal {}",
                withdrawal.id
            );
            Ok(withdrawal)
        })
    }

    /// `Requested -> Sent`, attaching the on-chain send.
    pub async fn mark_sent(
        &self,
        id: &str,
        sent_amount: Amount,
        sent_hash: &str,
        sent_date: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        self.apply_event(id, WithdrawalEvent::Send, |w| {
            w.sent_amount = Some(sent_amount);
            w.sent_hash = Some(sent_hash.to_string());
            w.sent_date = Some(sent_date);
        })
        .await
    }

    /// `Sent -> Confirmed`.
    pub async fn mark_confirmed(&self, id: &str, confirmed_date: DateTime<Utc>) -> Result<Withdrawal> {
        self.apply_event(id, WithdrawalEvent::Confirm, |w| {
            w.confirmed_date = Some(confirmed_date);
        })
        .await
    }

    /// `{Requested, Sent} -> Failed`.
    pub async fn mark_failed(
        &self,
        id: &str,
        failed_date: DateTime<Utc>,
        reason: &str,
    ) -> Result<Withdrawal> {
        self.apply_event(id, WithdrawalEvent::Fail, |w| {
            w.failed_date = Some(failed_date);
            w.failure_reason = Some(reason.to_string());
        })
        .await
    }

    /// `Failed -> RefundApproved`. Refund fields are only ever written here
    /// and in [`WithdrawalStateMachine::reject_refund`], both guarded on
    /// `Failed`.
    pub async fn approve_refund(
        &self,
        id: &str,
        reviewer_id: &str,
        approval_date: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        self.apply_event(id, WithdrawalEvent::ApproveRefund, |w| {
            w.refund_reviewer_id = Some(reviewer_id.to_string());
            w.refund_approved_date = Some(approval_date);
        })
        .await
    }

    /// `Failed -> RefundRejected`.
    pub async fn reject_refund(
        &self,
        id: &str,
        reviewer_id: &str,
        reason: &str,
        rejection_date: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        self.apply_event(id, WithdrawalEvent::RejectRefund, |w| {
            w.refund_reviewer_id = Some(reviewer_id.to_string());
            w.refund_rejected_date = Some(rejection_date);
            w.refund_rejection_reason = Some(reason.to_string());
        })
        .await
    }

    /// Approves the refund and credits the request amount back to the
    /// owner's funding account as a `WithdrawalRefunded` mutation. The credit
    /// only happens when the approval transition succeeds.
    pub async fn approve_refund_and_credit(
        &self,
        ledger: &AccountLedger,
        id: &str,
        reviewer_id: &str,
        approval_date: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        let withdrawal = self.approve_refund(id, reviewer_id, approval_date).await?;
        let account = ledger
            .get_or_create_account(&withdrawal.owner_id, &withdrawal.currency, AccountType::Funding)
            .await?;
        ledger
            .record_mutation(
                &account.id,
                MutationKind::WithdrawalRefunded,
                withdrawal.request_amount,
                approval_date,
                MutationLinks::withdrawal(id),
            )
            .await?;
        Ok(withdrawal)
    }

    /// Configured daily limit minus the day's requests (excluding `Failed`
    /// and `RefundApproved`). `None` means the currency is uncapped. The
    /// result can be negative when the limit was lowered under open
    /// requests.
    pub async fn get_remaining_daily_limit(
        &self,
        owner_id: &str,
        currency: &CurrencyKey,
        as_of: DateTime<Utc>,
    ) -> Result<Option<Amount>> {
        let limit = match self.limits.get(currency) {
            Some(limit) => limit,
            None => return Ok(None),
        };

        let day_start = as_of.date_naive().and_time(NaiveTime::MIN).and_utc();
        let day_end = day_start + Duration::days(1);
        let spent = self
            .withdrawals_in_window(owner_id, day_start, day_end)?
            .into_iter()
            .filter(|w| w.currency == *currency && w.status.counts_toward_daily_limit())
            .map(|w| w.request_amount)
            .collect::<Vec<_>>();
        let spent = Amount::sum(spent.iter())?;

        Ok(Some(limit.checked_sub(&spent)?))
    }

    /// Owner's withdrawals, request-date descending. `state_filter` narrows
    /// to one status; the status on each row is the canonical state.
    pub async fn list_withdrawals(
        &self,
        owner_id: &str,
        page: PageRequest,
        state_filter: Option<WithdrawalStatus>,
    ) -> Result<Page<Withdrawal>> {
        let (start, end) = prefix_bounds(&format!("{}|", owner_id));
        let matching: Vec<Withdrawal> = self.store.read(|txn| {
            let by_owner = txn.open_table(WITHDRAWALS_BY_OWNER).map_err(StoreError::from)?;
            let withdrawals = txn.open_table(WITHDRAWALS).map_err(StoreError::from)?;

            let mut result = Vec::new();
            for item in by_owner
                .range(start.as_str()..end.as_str())
                .map_err(StoreError::from)?
                .rev()
            {
                let (_, id) = item.map_err(StoreError::from)?;
                let row = withdrawals
                    .get(id.value())
                    .map_err(StoreError::from)?
                    .ok_or_else(|| {
                        StoreError::Storage(format!("dangling withdrawal index for {}", id.value()))
                    })?;
                let withdrawal = decode::<Withdrawal>(row.value())?;
                if state_filter.map_or(true, |s| withdrawal.status == s) {
                    result.push(withdrawal);
                }
            }
            Ok::<_, WithdrawalError>(result)
        })?;

        let total_count = matching.len();
        let items: Vec<Withdrawal> = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        Ok(Page::new(items, total_count, page.offset))
    }

    pub async fn get_withdrawal(&self, id: &str) -> Result<Withdrawal> {
        self.store.read(|txn| {
            let withdrawals = txn.open_table(WITHDRAWALS).map_err(StoreError::from)?;
            let result = match withdrawals.get(id).map_err(StoreError::from)? {
                Some(row) => Ok(decode::<Withdrawal>(row.value())?),
                None => Err(WithdrawalError::NotFound(id.to_string())),
            };
            result
        })
    }

    /// Compare-and-swap: read the stored status, run the transition table,
    /// rewrite the row. All inside one write transaction, so a concurrent
    /// writer either commits before us (we see its state and may conflict)
    /// or after (it sees ours).
    async fn apply_event(
        &self,
        id: &str,
        event: WithdrawalEvent,
        mutate: impl FnOnce(&mut Withdrawal),
    ) -> Result<Withdrawal> {
        self.store.write(|txn| {
            let mut withdrawals = txn.open_table(WITHDRAWALS).map_err(StoreError::from)?;
            let mut withdrawal = match withdrawals.get(id).map_err(StoreError::from)? {
                Some(row) => decode::<Withdrawal>(row.value())?,
                None => return Err(WithdrawalError::NotFound(id.to_string())),
            };

            let from = withdrawal.status;
            let next = transition(from, event).ok_or(WithdrawalError::InvalidTransition {
                from,
                event,
            })?;
            withdrawal.status = next;
            mutate(&mut withdrawal);

            withdrawals
                .insert(id, encode(&withdrawal)?.as_slice())
                .map_err(StoreError::from)?;
            info!(withdrawal = id, %from, to = %next, %event, "withdrawal transitioned");
            Ok(withdrawal)
        })
    }

    fn withdrawals_in_window(
        &self,
        owner_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Withdrawal>> {
        let start = format!("{}|{:020}", owner_id, from.timestamp_millis().max(0) as u64);
        let end = format!("{}|{:020}", owner_id, to.timestamp_millis().max(0) as u64);
        self.store.read(|txn| {
            let by_owner = txn.open_table(WITHDRAWALS_BY_OWNER).map_err(StoreError::from)?;
            let withdrawals = txn.open_table(WITHDRAWALS).map_err(StoreError::from)?;

            let mut result = Vec::new();
            for item in by_owner
                .range(start.as_str()..end.as_str())
                .map_err(StoreError::from)?
            {
                let (_, id) = item.map_err(StoreError::from)?;
                let row = withdrawals
                    .get(id.value())
                    .map_err(StoreError::from)?
                    .ok_or_else(|| {
                        StoreError::Storage(format!("dangling withdrawal index for {}", id.value()))
                    })?;
                result.push(decode::<Withdrawal>(row.value())?);
            }
            Ok::<_, WithdrawalError>(result)
        })
    }
}

fn owner_key(owner_id: &str, request_date: DateTime<Utc>, id: &str) -> String {
    let millis = request_date.timestamp_millis().max(0) as u64;
    format!("{}|{:020}|{}", owner_id, millis, id)
}
