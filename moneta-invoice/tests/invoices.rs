use chrono::{Duration, TimeZone, Utc};

use moneta_common::{Amount, CurrencyKey, PageRequest};
use moneta_invoice::{InvoiceError, InvoiceKind, InvoiceStatus, InvoiceTracker};
use moneta_ledger::{AccountLedger, AccountType, MutationKind};
use moneta_store::Store;

fn usdt() -> CurrencyKey {
    CurrencyKey::new(
        "eip155:1",
        "eip155:1/erc20:0xdac17f958d2ee523a2206206994597c13d831ec7",
    )
    .unwrap()
}

fn setup(dir: &tempfile::TempDir) -> (InvoiceTracker, AccountLedger) {
    let store = Store::open(dir.path()).unwrap();
    let tracker = InvoiceTracker::new(store.clone()).unwrap();
    let ledger = AccountLedger::new(store).unwrap();
    (tracker, ledger)
}

#[tokio::test]
async fn large_invoice_without_due_date_starts_pending() {
    let dir = tempfile::tempdir().unwrap();
    let (tracker, _) = setup(&dir);

    let invoice = tracker
        .create_invoice(
            "user-1",
            &usdt(),
            Amount::parse("10000000000").unwrap(),
            "0xdeposit",
            "m/44'/60'/0'/0/7",
            InvoiceKind::LoanCollateral,
            Utc::now(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.paid_amount, Amount::zero());
    assert!(invoice.due_date.is_none());

    // A payment covering the full amount does not, by itself, change status.
    tracker
        .record_payment(&invoice.id, "0xhash1", Amount::parse("10000000000").unwrap(), Utc::now())
        .await
        .unwrap();
    let details = tracker.view_details(&invoice.id).await.unwrap();
    assert_eq!(details.invoice.status, InvoiceStatus::Pending);
    assert_eq!(
        details.invoice.paid_amount,
        Amount::parse("10000000000").unwrap()
    );
    assert_eq!(details.payments.len(), 1);
}

#[tokio::test]
async fn unknown_invoice_fails_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (tracker, _) = setup(&dir);

    let err = tracker.view_details("missing").await.unwrap_err();
    assert!(matches!(err, InvoiceError::NotFound(_)));

    let err = tracker
        .update_status("missing", InvoiceStatus::Paid, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::NotFound(_)));
}

#[tokio::test]
async fn status_lifecycle_is_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let (tracker, _) = setup(&dir);

    let invoice = tracker
        .create_invoice(
            "user-1",
            &usdt(),
            Amount::parse("5000").unwrap(),
            "0xdeposit",
            "m/44'/60'/0'/0/1",
            InvoiceKind::LoanRepayment,
            Utc::now(),
            Some(Utc::now() + Duration::days(7)),
        )
        .await
        .unwrap();

    tracker
        .update_status(&invoice.id, InvoiceStatus::PartiallyPaid, None, None)
        .await
        .unwrap();
    tracker
        .update_status(&invoice.id, InvoiceStatus::Paid, None, None)
        .await
        .unwrap();

    // Paid is terminal: expiring it must fail.
    let err = tracker
        .expire_invoice(&invoice.id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::InvalidTransition { .. }));

    // And a terminal invoice cannot go back to an earlier state.
    let err = tracker
        .update_status(&invoice.id, InvoiceStatus::Overdue, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::InvalidTransition { .. }));
}

#[tokio::test]
async fn expiry_sweep_expires_only_overdue_active_invoices() {
    let dir = tempfile::tempdir().unwrap();
    let (tracker, _) = setup(&dir);
    let issued = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();

    let overdue = tracker
        .create_invoice(
            "user-1",
            &usdt(),
            Amount::parse("100").unwrap(),
            "0xa",
            "m/0",
            InvoiceKind::LoanCollateral,
            issued,
            Some(issued + Duration::days(1)),
        )
        .await
        .unwrap();
    let not_due = tracker
        .create_invoice(
            "user-1",
            &usdt(),
            Amount::parse("100").unwrap(),
            "0xb",
            "m/1",
            InvoiceKind::LoanCollateral,
            issued,
            Some(issued + Duration::days(30)),
        )
        .await
        .unwrap();
    let no_due_date = tracker
        .create_invoice(
            "user-1",
            &usdt(),
            Amount::parse("100").unwrap(),
            "0xc",
            "m/2",
            InvoiceKind::LoanCollateral,
            issued,
            None,
        )
        .await
        .unwrap();

    let as_of = issued + Duration::days(3);
    let listed = tracker
        .list_active_but_expired(as_of, PageRequest::first(10))
        .await
        .unwrap();
    assert_eq!(listed.total_count, 1);
    assert_eq!(listed.items[0].id, overdue.id);

    let count = tracker.sweep_expired(as_of).await.unwrap();
    assert_eq!(count, 1);

    let expired = tracker.view_details(&overdue.id).await.unwrap().invoice;
    assert_eq!(expired.status, InvoiceStatus::Expired);
    assert_eq!(expired.expired_date, Some(as_of));

    for id in [&not_due.id, &no_due_date.id] {
        let invoice = tracker.view_details(id).await.unwrap().invoice;
        assert_eq!(invoice.status, InvoiceStatus::Pending);
    }

    // Second sweep finds nothing left.
    assert_eq!(tracker.sweep_expired(as_of).await.unwrap(), 0);
}

#[tokio::test]
async fn settle_payment_posts_ledger_mutation_and_moves_status() {
    let dir = tempfile::tempdir().unwrap();
    let (tracker, ledger) = setup(&dir);

    let invoice = tracker
        .create_invoice(
            "user-9",
            &usdt(),
            Amount::parse("1000").unwrap(),
            "0xdeposit",
            "m/44'/60'/0'/0/2",
            InvoiceKind::LoanCollateral,
            Utc::now(),
            Some(Utc::now() + Duration::days(7)),
        )
        .await
        .unwrap();

    let after_partial = tracker
        .settle_payment(&ledger, &invoice.id, "0xh1", Amount::parse("400").unwrap(), Utc::now())
        .await
        .unwrap();
    assert_eq!(after_partial.status, InvoiceStatus::PartiallyPaid);

    let after_full = tracker
        .settle_payment(&ledger, &invoice.id, "0xh2", Amount::parse("600").unwrap(), Utc::now())
        .await
        .unwrap();
    assert_eq!(after_full.status, InvoiceStatus::Paid);

    let accounts = ledger.get_balances("user-9").await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].account_type, AccountType::Collateral);
    assert_eq!(accounts[0].balance, Amount::parse("1000").unwrap());

    let history = ledger
        .get_transaction_history(
            &accounts[0].id,
            moneta_ledger::HistoryFilter::default(),
            PageRequest::first(10),
        )
        .await
        .unwrap();
    assert_eq!(history.total_count, 2);
    assert!(history
        .items
        .iter()
        .all(|m| m.kind == MutationKind::InvoiceReceived && m.links.invoice_id.as_deref() == Some(invoice.id.as_str())));
}
