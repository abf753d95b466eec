use chrono::{DateTime, Utc};
use redb::{ReadableTable, TableDefinition};
use tracing::{info, warn};

use moneta_common::{new_id, Amount, CurrencyKey, Page, PageRequest};
use moneta_ledger::{AccountLedger, MutationKind, MutationLinks};
use moneta_store::{decode, encode, next_seq, prefix_bounds, Store, StoreError};

use crate::error::{InvoiceError, Result};
use crate::invoice::{Invoice, InvoiceDetails, InvoiceKind, InvoicePayment, InvoiceStatus};

const INVOICES: TableDefinition<&str, &[u8]> = TableDefinition::new("invoices");
// invoice_id|seq -> payment
const INVOICE_PAYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("invoice_payments");

const PAYMENT_SEQ: &str = "invoice_payments";

/// Deposit intents and their matched on-chain payments.
#[derive(Debug, Clone)]
pub struct InvoiceTracker {
    store: Store,
}

impl InvoiceTracker {
    pub fn new(store: Store) -> Result<Self> {
        store.write(|txn| {
            txn.open_table(INVOICES).map_err(StoreError::from)?;
            txn.open_table(INVOICE_PAYMENTS).map_err(StoreError::from)?;
            Ok::<_, InvoiceError>(())
        })?;
        Ok(Self { store })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_invoice(
        &self,
        owner_id: &str,
        currency: &CurrencyKey,
        invoiced_amount: Amount,
        wallet_address: &str,
        derivation_path: &str,
        kind: InvoiceKind,
        invoice_date: DateTime<Utc>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Invoice> {
        let invoice = Invoice {
            id: new_id(),
            owner_id: owner_id.to_string(),
            currency: currency.clone(),
            invoiced_amount,
            paid_amount: Amount::zero(),
            wallet_address: wallet_address.to_string(),
            derivation_path: derivation_path.to_string(),
            kind,
            status: InvoiceStatus::Pending,
            invoice_date,
            due_date,
            expired_date: None,
            paid_date: None,
            notified_date: None,
        };

        self.store.write(|txn| {
            let mut invoices = txn.open_table(INVOICES).map_err(StoreError::from)?;
            invoices
                .insert(invoice.id.as_str(), encode(&invoice)?.as_slice())
                .map_err(StoreError::from)?;
            Ok::<_, InvoiceError>(())
        })?;
        info!(
            owner = owner_id,
            currency = %currency,
            amount = %invoice.invoiced_amount,
            "created invoice {}",
            invoice.id
        );
        Ok(invoice)
    }

    /// Appends a payment row and bumps the invoice's paid amount.
    ///
    /// This deliberately does not touch the invoice status: the status move
    /// and the `InvoiceReceived` ledger mutation are separate, explicit calls
    /// by the orchestrating collaborator (see [`InvoiceTracker::settle_payment`]).
    pub async fn record_payment(
        &self,
        invoice_id: &str,
        payment_hash: &str,
        amount: Amount,
        date: DateTime<Utc>,
    ) -> Result<InvoicePayment> {
        self.store.write(|txn| {
            let mut invoices = txn.open_table(INVOICES).map_err(StoreError::from)?;
            let mut invoice = match invoices.get(invoice_id).map_err(StoreError::from)? {
                Some(row) => decode::<Invoice>(row.value())?,
                None => return Err(InvoiceError::NotFound(invoice_id.to_string())),
            };

            invoice.paid_amount = invoice.paid_amount.checked_add(&amount)?;

            let seq = next_seq(txn, PAYMENT_SEQ)?;
            let payment = InvoicePayment {
                id: new_id(),
                invoice_id: invoice_id.to_string(),
                payment_hash: payment_hash.to_string(),
                amount,
                date,
            };

            let mut payments = txn.open_table(INVOICE_PAYMENTS).map_err(StoreError::from)?;
            payments
                .insert(
                    format!("{}|{:012}", invoice_id, seq).as_str(),
                    encode(&payment)?.as_slice(),
                )
                .map_err(StoreError::from)?;
            invoices
                .insert(invoice_id, encode(&invoice)?.as_slice())
                .map_err(StoreError::from)?;

            info!(
                invoice = invoice_id,
                hash = payment_hash,
                amount = %payment.amount,
                paid = %invoice.paid_amount,
                "recorded invoice payment"
            );
            Ok(payment)
        })
    }

    /// Moves the invoice to `status` if the stored state admits it.
    ///
    /// Compare-and-swap inside one write transaction: a missing invoice is
    /// `NotFound`, a status that does not admit the move is
    /// `InvalidTransition`. Zero matched rows is never silent success.
    pub async fn update_status(
        &self,
        invoice_id: &str,
        status: InvoiceStatus,
        expired_date: Option<DateTime<Utc>>,
        notified_date: Option<DateTime<Utc>>,
    ) -> Result<Invoice> {
        self.store.write(|txn| {
            let mut invoices = txn.open_table(INVOICES).map_err(StoreError::from)?;
            let mut invoice = match invoices.get(invoice_id).map_err(StoreError::from)? {
                Some(row) => decode::<Invoice>(row.value())?,
                None => return Err(InvoiceError::NotFound(invoice_id.to_string())),
            };

            if !invoice.status.can_transition(status) {
                return Err(InvoiceError::InvalidTransition {
                    from: invoice.status,
                    to: status,
                });
            }

            let from = invoice.status;
            invoice.status = status;
            match status {
                InvoiceStatus::Expired => invoice.expired_date = expired_date.or(Some(Utc::now())),
                InvoiceStatus::Paid => invoice.paid_date = Some(Utc::now()),
                _ => {}
            }
            if notified_date.is_some() {
                invoice.notified_date = notified_date;
            }

            invoices
                .insert(invoice_id, encode(&invoice)?.as_slice())
                .map_err(StoreError::from)?;
            info!(invoice = invoice_id, %from, to = %status, "invoice transitioned");
            Ok(invoice)
        })
    }

    pub async fn view_details(&self, invoice_id: &str) -> Result<InvoiceDetails> {
        let (start, end) = prefix_bounds(&format!("{}|", invoice_id));
        self.store.read(|txn| {
            let invoices = txn.open_table(INVOICES).map_err(StoreError::from)?;
            let invoice = match invoices.get(invoice_id).map_err(StoreError::from)? {
                Some(row) => decode::<Invoice>(row.value())?,
                None => return Err(InvoiceError::NotFound(invoice_id.to_string())),
            };

            let payments_table = txn.open_table(INVOICE_PAYMENTS).map_err(StoreError::from)?;
            let mut payments = Vec::new();
            for item in payments_table
                .range(start.as_str()..end.as_str())
                .map_err(StoreError::from)?
            {
                let (_, row) = item.map_err(StoreError::from)?;
                payments.push(decode::<InvoicePayment>(row.value())?);
            }
            Ok(InvoiceDetails { invoice, payments })
        })
    }

    /// Invoices still awaiting payment whose due date has passed as of
    /// `as_of`, ordered by due date. Feeds the periodic expiry sweep.
    pub async fn list_active_but_expired(
        &self,
        as_of: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<Invoice>> {
        let mut matching: Vec<Invoice> = self.store.read(|txn| {
            let invoices = txn.open_table(INVOICES).map_err(StoreError::from)?;
            let mut result = Vec::new();
            for item in invoices.iter().map_err(StoreError::from)? {
                let (_, row) = item.map_err(StoreError::from)?;
                let invoice = decode::<Invoice>(row.value())?;
                let overdue = matches!(invoice.due_date, Some(due) if due < as_of);
                if invoice.status.is_active() && overdue {
                    result.push(invoice);
                }
            }
            Ok::<_, InvoiceError>(result)
        })?;

        matching.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
        let total_count = matching.len();
        let items: Vec<Invoice> = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        Ok(Page::new(items, total_count, page.offset))
    }

    /// Expires an invoice; only admitted from `Pending`, `PartiallyPaid` or
    /// `Overdue`.
    pub async fn expire_invoice(
        &self,
        invoice_id: &str,
        expired_date: DateTime<Utc>,
    ) -> Result<Invoice> {
        self.update_status(invoice_id, InvoiceStatus::Expired, Some(expired_date), None)
            .await
    }

    /// Drains [`InvoiceTracker::list_active_but_expired`] and expires every
    /// invoice in it. Returns how many were expired. Invoices that race into
    /// a terminal state mid-sweep are skipped.
    pub async fn sweep_expired(&self, as_of: DateTime<Utc>) -> Result<usize> {
        let mut expired = 0usize;
        loop {
            let page = self
                .list_active_but_expired(as_of, PageRequest::first(100))
                .await?;
            if page.items.is_empty() {
                break;
            }

            let mut progressed = 0usize;
            for invoice in &page.items {
                match self.expire_invoice(&invoice.id, as_of).await {
                    Ok(_) => {
                        expired += 1;
                        progressed += 1;
                    }
                    Err(InvoiceError::InvalidTransition { from, to }) => {
                        warn!(invoice = %invoice.id, %from, %to, "skipping raced invoice in expiry sweep");
                    }
                    Err(e) => return Err(e),
                }
            }
            if progressed == 0 {
                break;
            }
        }
        if expired > 0 {
            info!(count = expired, "expired overdue invoices");
        }
        Ok(expired)
    }

    /// Orchestration helper for a matched on-chain payment: records the
    /// payment row, posts the `InvoiceReceived` ledger mutation against the
    /// owner's account, and then moves the status in a separate explicit call
    /// when the payment total admits one.
    pub async fn settle_payment(
        &self,
        ledger: &AccountLedger,
        invoice_id: &str,
        payment_hash: &str,
        amount: Amount,
        date: DateTime<Utc>,
    ) -> Result<Invoice> {
        let payment = self.record_payment(invoice_id, payment_hash, amount, date).await?;
        let details = self.view_details(invoice_id).await?;
        let invoice = details.invoice;

        let account = ledger
            .get_or_create_account(&invoice.owner_id, &invoice.currency, invoice.kind.account_type())
            .await?;
        ledger
            .record_mutation(
                &account.id,
                MutationKind::InvoiceReceived,
                amount,
                date,
                MutationLinks::invoice(invoice_id, &payment.id),
            )
            .await?;

        let target = if invoice.paid_amount >= invoice.invoiced_amount {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::PartiallyPaid
        };
        if invoice.status != target && invoice.status.can_transition(target) {
            return self.update_status(invoice_id, target, None, None).await;
        }
        Ok(invoice)
    }
}
