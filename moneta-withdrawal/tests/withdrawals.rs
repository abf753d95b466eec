use chrono::Utc;

use moneta_common::{Amount, CurrencyKey, PageRequest};
use moneta_ledger::{AccountLedger, MutationKind};
use moneta_store::Store;
use moneta_withdrawal::{
    DailyLimits, WithdrawalError, WithdrawalStateMachine, WithdrawalStatus,
};

fn usdt() -> CurrencyKey {
    CurrencyKey::new(
        "eip155:1",
        "eip155:1/erc20:0xdac17f958d2ee523a2206206994597c13d831ec7",
    )
    .unwrap()
}

fn dai() -> CurrencyKey {
    CurrencyKey::new(
        "eip155:1",
        "eip155:1/erc20:0x6b175474e89094c44da98b954eedeac495271d0f",
    )
    .unwrap()
}

fn machine_with_limit(dir: &tempfile::TempDir, limit: &str) -> WithdrawalStateMachine {
    let store = Store::open(dir.path()).unwrap();
    let mut limits = DailyLimits::new();
    limits.set(&usdt(), Amount::parse(limit).unwrap());
    WithdrawalStateMachine::new(store, limits).unwrap()
}

#[tokio::test]
async fn lifecycle_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let machine = machine_with_limit(&dir, "1000000");

    let beneficiary = machine
        .register_beneficiary("user-1", "eip155:1", "0xdest")
        .await
        .unwrap();
    let withdrawal = machine
        .request_withdrawal(&beneficiary.id, &usdt(), Amount::parse("500").unwrap(), Utc::now())
        .await
        .unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Requested);

    let sent = machine
        .mark_sent(&withdrawal.id, Amount::parse("498").unwrap(), "0xtx", Utc::now())
        .await
        .unwrap();
    assert_eq!(sent.status, WithdrawalStatus::Sent);
    assert_eq!(sent.sent_hash.as_deref(), Some("0xtx"));

    let confirmed = machine
        .mark_confirmed(&withdrawal.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(confirmed.status, WithdrawalStatus::Confirmed);
    assert!(confirmed.confirmed_date.is_some());
}

#[tokio::test]
async fn confirm_on_requested_is_a_definitive_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let machine = machine_with_limit(&dir, "1000000");

    let beneficiary = machine
        .register_beneficiary("user-1", "eip155:1", "0xdest")
        .await
        .unwrap();
    let withdrawal = machine
        .request_withdrawal(&beneficiary.id, &usdt(), Amount::parse("500").unwrap(), Utc::now())
        .await
        .unwrap();

    let err = machine
        .mark_confirmed(&withdrawal.id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, WithdrawalError::InvalidTransition { .. }));

    // The failed call must not have moved the withdrawal.
    let current = machine.get_withdrawal(&withdrawal.id).await.unwrap();
    assert_eq!(current.status, WithdrawalStatus::Requested);
}

#[tokio::test]
async fn exactly_one_refund_decision_from_failed() {
    let dir = tempfile::tempdir().unwrap();
    let machine = machine_with_limit(&dir, "1000000");

    let beneficiary = machine
        .register_beneficiary("user-1", "eip155:1", "0xdest")
        .await
        .unwrap();
    let withdrawal = machine
        .request_withdrawal(&beneficiary.id, &usdt(), Amount::parse("500").unwrap(), Utc::now())
        .await
        .unwrap();
    machine
        .mark_failed(&withdrawal.id, Utc::now(), "node rejected tx")
        .await
        .unwrap();

    let approved = machine
        .approve_refund(&withdrawal.id, "admin-1", Utc::now())
        .await
        .unwrap();
    assert_eq!(approved.status, WithdrawalStatus::RefundApproved);
    assert_eq!(approved.refund_reviewer_id.as_deref(), Some("admin-1"));

    let err = machine
        .reject_refund(&withdrawal.id, "admin-2", "already approved", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, WithdrawalError::InvalidTransition { .. }));
}

#[tokio::test]
async fn refund_approval_requires_failed_status() {
    let dir = tempfile::tempdir().unwrap();
    let machine = machine_with_limit(&dir, "1000000");

    let beneficiary = machine
        .register_beneficiary("user-1", "eip155:1", "0xdest")
        .await
        .unwrap();
    let withdrawal = machine
        .request_withdrawal(&beneficiary.id, &usdt(), Amount::parse("500").unwrap(), Utc::now())
        .await
        .unwrap();

    let err = machine
        .approve_refund(&withdrawal.id, "admin-1", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, WithdrawalError::InvalidTransition { .. }));

    let current = machine.get_withdrawal(&withdrawal.id).await.unwrap();
    assert!(current.refund_reviewer_id.is_none());
    assert!(current.refund_approved_date.is_none());
}

#[tokio::test]
async fn approved_refund_credits_the_funding_account() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let ledger = AccountLedger::new(store.clone()).unwrap();
    let machine = WithdrawalStateMachine::new(store, DailyLimits::new()).unwrap();

    let beneficiary = machine
        .register_beneficiary("user-7", "eip155:1", "0xdest")
        .await
        .unwrap();
    let withdrawal = machine
        .request_withdrawal(&beneficiary.id, &usdt(), Amount::parse("750").unwrap(), Utc::now())
        .await
        .unwrap();
    machine
        .mark_failed(&withdrawal.id, Utc::now(), "chain halted")
        .await
        .unwrap();
    machine
        .approve_refund_and_credit(&ledger, &withdrawal.id, "admin-1", Utc::now())
        .await
        .unwrap();

    let accounts = ledger.get_balances("user-7").await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].balance, Amount::parse("750").unwrap());

    let history = ledger
        .get_transaction_history(
            &accounts[0].id,
            moneta_ledger::HistoryFilter::default(),
            PageRequest::first(10),
        )
        .await
        .unwrap();
    assert_eq!(history.items[0].kind, MutationKind::WithdrawalRefunded);
    assert_eq!(
        history.items[0].links.withdrawal_id.as_deref(),
        Some(withdrawal.id.as_str())
    );
}

#[tokio::test]
async fn daily_limit_ignores_failed_and_refunded_requests() {
    let dir = tempfile::tempdir().unwrap();
    let machine = machine_with_limit(&dir, "1000");

    let beneficiary = machine
        .register_beneficiary("user-1", "eip155:1", "0xdest")
        .await
        .unwrap();
    let now = Utc::now();

    let w1 = machine
        .request_withdrawal(&beneficiary.id, &usdt(), Amount::parse("300").unwrap(), now)
        .await
        .unwrap();
    machine
        .request_withdrawal(&beneficiary.id, &usdt(), Amount::parse("400").unwrap(), now)
        .await
        .unwrap();

    let remaining = machine
        .get_remaining_daily_limit("user-1", &usdt(), now)
        .await
        .unwrap();
    assert_eq!(remaining, Some(Amount::parse("300").unwrap()));

    // A failed request releases its slice of the limit.
    machine
        .mark_failed(&w1.id, now, "node rejected tx")
        .await
        .unwrap();
    let remaining = machine
        .get_remaining_daily_limit("user-1", &usdt(), now)
        .await
        .unwrap();
    assert_eq!(remaining, Some(Amount::parse("600").unwrap()));

    // Unconfigured currency is uncapped.
    let remaining = machine
        .get_remaining_daily_limit("user-1", &dai(), now)
        .await
        .unwrap();
    assert_eq!(remaining, None);
}

#[tokio::test]
async fn listing_is_request_date_descending_with_state_filter() {
    let dir = tempfile::tempdir().unwrap();
    let machine = machine_with_limit(&dir, "1000000");

    let beneficiary = machine
        .register_beneficiary("user-1", "eip155:1", "0xdest")
        .await
        .unwrap();

    let base = Utc::now();
    let mut ids = Vec::new();
    for i in 0..5 {
        let w = machine
            .request_withdrawal(
                &beneficiary.id,
                &usdt(),
                Amount::parse("10").unwrap(),
                base + chrono::Duration::seconds(i),
            )
            .await
            .unwrap();
        ids.push(w.id);
    }
    machine.mark_sent(&ids[0], Amount::parse("10").unwrap(), "0xtx", Utc::now()).await.unwrap();

    let page = machine
        .list_withdrawals("user-1", PageRequest::new(3, 0), None)
        .await
        .unwrap();
    assert_eq!(page.total_count, 5);
    assert_eq!(page.items.len(), 3);
    assert!(page.has_more);
    for pair in page.items.windows(2) {
        assert!(pair[0].request_date >= pair[1].request_date);
    }

    let sent_only = machine
        .list_withdrawals("user-1", PageRequest::new(10, 0), Some(WithdrawalStatus::Sent))
        .await
        .unwrap();
    assert_eq!(sent_only.total_count, 1);
    assert_eq!(sent_only.items[0].id, ids[0]);
}

#[tokio::test]
async fn request_validation() {
    let dir = tempfile::tempdir().unwrap();
    let machine = machine_with_limit(&dir, "1000");

    let err = machine
        .register_beneficiary("user-1", "not a chain", "0xdest")
        .await
        .unwrap_err();
    assert!(matches!(err, WithdrawalError::InvalidRequest(_)));

    let beneficiary = machine
        .register_beneficiary("user-1", "eip155:1", "0xdest")
        .await
        .unwrap();

    let err = machine
        .request_withdrawal(&beneficiary.id, &usdt(), Amount::parse("0").unwrap(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, WithdrawalError::InvalidRequest(_)));

    let tron = CurrencyKey::new("tron:mainnet", "tron:mainnet/trc20:TR7NHqje").unwrap();
    let err = machine
        .request_withdrawal(&beneficiary.id, &tron, Amount::parse("10").unwrap(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, WithdrawalError::InvalidRequest(_)));

    let err = machine
        .request_withdrawal("missing", &usdt(), Amount::parse("10").unwrap(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, WithdrawalError::NotFound(_)));
}
