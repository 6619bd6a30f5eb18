//! End-to-end scenarios for the settlement core: batched settlement and its
//! idempotence, the withdrawal/payout workflow with compensation, and dispute
//! refund reversal. Everything runs against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use sokoni::config::AppConfig;
use sokoni::core_types::{OrderId, OrderItemId, VendorId};
use sokoni::dispute::{DisputeError, DisputeHandler, DisputeOutcome, DisputeStatus};
use sokoni::fees::BusinessModel;
use sokoni::orders::{FulfillmentStatus, OrderItem, VendorProfile};
use sokoni::settlement::SettlementEngine;
use sokoni::store::{MarketplaceStore, MemoryStore};
use sokoni::wallet::{EntryKind, WalletService, WalletStatus};
use sokoni::withdrawal::{
    MockMomoProvider, PayoutMethod, PayoutStatus, WithdrawalError, WithdrawalStatus,
    WithdrawalWorkflow,
};

const DESTINATION: &str = "+233541234567";

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

struct Harness {
    store: Arc<MemoryStore>,
    wallets: Arc<WalletService>,
    engine: SettlementEngine,
    workflow: WithdrawalWorkflow,
    disputes: DisputeHandler,
    provider: Arc<MockMomoProvider>,
}

fn harness() -> Harness {
    // defaults: GHS with 2 minor units, flat 2.00 gateway fee, 10.00 minimum
    // withdrawal, weekly settlement
    let config = AppConfig::default();
    let store = Arc::new(MemoryStore::new());
    let wallets = Arc::new(WalletService::new(store.clone(), &config.currency));
    let provider = Arc::new(MockMomoProvider::new());
    Harness {
        engine: SettlementEngine::new(store.clone(), wallets.clone(), &config),
        workflow: WithdrawalWorkflow::new(
            store.clone(),
            wallets.clone(),
            provider.clone(),
            &config,
        ),
        disputes: DisputeHandler::new(store.clone(), wallets.clone()),
        store,
        wallets,
        provider,
    }
}

async fn commission_vendor(h: &Harness, vendor: VendorId, rate: &str) {
    h.store
        .upsert_vendor_profile(&VendorProfile {
            vendor_id: vendor,
            business_model: BusinessModel::Commission { rate: dec(rate) },
        })
        .await
        .unwrap();
}

async fn subscription_vendor(h: &Harness, vendor: VendorId) {
    h.store
        .upsert_vendor_profile(&VendorProfile {
            vendor_id: vendor,
            business_model: BusinessModel::Subscription,
        })
        .await
        .unwrap();
}

async fn delivered_item(
    h: &Harness,
    id: OrderItemId,
    order: OrderId,
    vendor: VendorId,
    unit_price: &str,
    quantity: u32,
) {
    h.store
        .insert_order_item(&OrderItem {
            id,
            order_id: order,
            vendor_id: vendor,
            unit_price: dec(unit_price),
            quantity,
            status: FulfillmentStatus::Delivered,
            platform_fee: Decimal::ZERO,
            gateway_fee: Decimal::ZERO,
            fees_priced: false,
            delivered_at: Some(Utc::now() - Duration::hours(1)),
        })
        .await
        .unwrap();
}

async fn run_engine(h: &Harness) -> sokoni::settlement::SettlementReport {
    h.engine
        .run(Utc::now() - Duration::days(7), Utc::now() + Duration::minutes(1))
        .await
        .unwrap()
}

// gross 100.00, commission 3%, flat gateway 2.00 -> net 95.00 credited once
#[tokio::test]
async fn settlement_credits_net_earning_exactly_once() {
    let h = harness();
    commission_vendor(&h, 10, "0.03").await;
    delivered_item(&h, 101, 1, 10, "100.00", 1).await;

    let report = run_engine(&h).await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.credited, 1);
    assert_eq!(report.total_credited, dec("95.00"));
    assert!(report.failures.is_empty());

    let wallet = h.store.wallet_by_owner(10).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec("95.00"));

    // fees were persisted on the item at pricing time
    let item = h.store.order_item(101).await.unwrap().unwrap();
    assert!(item.fees_priced);
    assert_eq!(item.platform_fee, dec("3.00"));
    assert_eq!(item.gateway_fee, dec("2.00"));

    // re-running the same period is a no-op for settled items
    let rerun = run_engine(&h).await;
    assert_eq!(rerun.processed, 1);
    assert_eq!(rerun.credited, 0);
    assert_eq!(rerun.skipped, 1);
    assert_eq!(rerun.total_credited, Decimal::ZERO);

    let wallet = h.store.wallet_by_owner(10).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec("95.00"));
    // one EARNING entry total
    assert_eq!(h.wallets.history(wallet.id, 50).await.unwrap().len(), 1);

    // both runs left a persisted summary
    assert_eq!(h.store.settlement_run_count().await, 2);
}

#[tokio::test]
async fn settlement_ignores_subscription_vendors_and_undelivered_items() {
    let h = harness();
    subscription_vendor(&h, 20).await;
    delivered_item(&h, 201, 2, 20, "50.00", 2).await;

    commission_vendor(&h, 21, "0.05").await;
    // still in transit: not a candidate
    h.store
        .insert_order_item(&OrderItem {
            id: 202,
            order_id: 3,
            vendor_id: 21,
            unit_price: dec("40.00"),
            quantity: 1,
            status: FulfillmentStatus::Shipped,
            platform_fee: Decimal::ZERO,
            gateway_fee: Decimal::ZERO,
            fees_priced: false,
            delivered_at: None,
        })
        .await
        .unwrap();

    let report = run_engine(&h).await;
    assert_eq!(report.processed, 0);
    assert_eq!(report.credited, 0);

    // no wallet was ever opened for either vendor
    assert!(h.store.wallet_by_owner(20).await.unwrap().is_none());
    assert!(h.store.wallet_by_owner(21).await.unwrap().is_none());
}

#[tokio::test]
async fn settlement_skips_failed_items_and_retries_next_run() {
    let h = harness();
    commission_vendor(&h, 30, "0.03").await;
    commission_vendor(&h, 31, "0.03").await;
    delivered_item(&h, 301, 4, 30, "100.00", 1).await;
    delivered_item(&h, 302, 5, 31, "100.00", 1).await;

    // vendor 30's wallet is frozen pending audit: its item must fail without
    // stopping the run
    let frozen = h.wallets.open_wallet(30).await.unwrap();
    h.store
        .set_wallet_status(frozen.id, WalletStatus::Frozen)
        .await
        .unwrap();

    let report = run_engine(&h).await;
    assert_eq!(report.processed, 2);
    assert_eq!(report.credited, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].item, 301);

    let ok_wallet = h.store.wallet_by_owner(31).await.unwrap().unwrap();
    assert_eq!(ok_wallet.balance, dec("95.00"));

    // audit clears the freeze; the next scheduled run picks the item up
    h.wallets.release_after_audit(frozen.id).await.unwrap();
    let retry = run_engine(&h).await;
    assert_eq!(retry.credited, 1);
    assert_eq!(retry.skipped, 1);
    assert!(retry.failures.is_empty());

    let wallet = h.store.wallet_by_owner(30).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec("95.00"));
}

#[tokio::test]
async fn persisted_fees_survive_commission_rate_change() {
    let h = harness();
    commission_vendor(&h, 40, "0.03").await;
    delivered_item(&h, 401, 6, 40, "100.00", 1).await;
    run_engine(&h).await;

    // the vendor renegotiates; already-priced sales keep their figures
    commission_vendor(&h, 40, "0.10").await;
    let item = h.store.order_item(401).await.unwrap().unwrap();
    assert_eq!(item.platform_fee, dec("3.00"));
    assert_eq!(item.net_earning(), dec("95.00"));
}

// Scenario: requesting more than the current balance is rejected outright
#[tokio::test]
async fn withdrawal_request_over_balance_is_rejected() {
    let h = harness();
    let wallet = h.wallets.open_wallet(50).await.unwrap();
    h.wallets
        .credit(wallet.id, EntryKind::Deposit, dec("1000.00"), Default::default())
        .await
        .unwrap();

    let err = h
        .workflow
        .request(50, dec("1200.00"), PayoutMethod::MobileMoney, DESTINATION)
        .await;
    assert!(matches!(err, Err(WithdrawalError::InsufficientBalance { .. })));

    // nothing was debited
    assert_eq!(h.wallets.balance(wallet.id).await.unwrap(), dec("1000.00"));
}

#[tokio::test]
async fn withdrawal_request_validates_minimum_and_destination() {
    let h = harness();
    let wallet = h.wallets.open_wallet(51).await.unwrap();
    h.wallets
        .credit(wallet.id, EntryKind::Deposit, dec("100.00"), Default::default())
        .await
        .unwrap();

    let err = h
        .workflow
        .request(51, dec("5.00"), PayoutMethod::MobileMoney, DESTINATION)
        .await;
    assert!(matches!(err, Err(WithdrawalError::BelowMinimum { .. })));

    let err = h
        .workflow
        .request(51, dec("50.00"), PayoutMethod::MobileMoney, "not-a-msisdn")
        .await;
    assert!(matches!(err, Err(WithdrawalError::InvalidDestination)));
}

// the balance shrank between request and approval: the request survives,
// un-debited, and can be approved later
#[tokio::test]
async fn approval_shortfall_leaves_request_pending() {
    let h = harness();
    let wallet = h.wallets.open_wallet(52).await.unwrap();
    h.wallets
        .credit(wallet.id, EntryKind::Deposit, dec("1000.00"), Default::default())
        .await
        .unwrap();

    let withdrawal = h
        .workflow
        .request(52, dec("800.00"), PayoutMethod::MobileMoney, DESTINATION)
        .await
        .unwrap();

    // other activity drains the wallet below the requested amount
    h.wallets
        .debit(wallet.id, EntryKind::Payment, dec("500.00"), Default::default())
        .await
        .unwrap();

    let err = h.workflow.approve(withdrawal.id, 1).await;
    assert!(matches!(err, Err(WithdrawalError::InsufficientBalance { .. })));

    let reloaded = h.store.withdrawal(withdrawal.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, WithdrawalStatus::Pending);
    assert_eq!(h.wallets.balance(wallet.id).await.unwrap(), dec("500.00"));

    // top the wallet back up; the same request now approves
    h.wallets
        .credit(wallet.id, EntryKind::Deposit, dec("400.00"), Default::default())
        .await
        .unwrap();
    let approved = h.workflow.approve(withdrawal.id, 1).await.unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    assert_eq!(h.wallets.balance(wallet.id).await.unwrap(), dec("100.00"));
}

// Scenario: approve debits atomically; provider failure compensates the
// wallet and records a FAILED payout log
#[tokio::test]
async fn failed_payout_is_compensated() {
    let h = harness();
    let wallet = h.wallets.open_wallet(53).await.unwrap();
    h.wallets
        .credit(wallet.id, EntryKind::Deposit, dec("1000.00"), Default::default())
        .await
        .unwrap();

    let withdrawal = h
        .workflow
        .request(53, dec("500.00"), PayoutMethod::MobileMoney, DESTINATION)
        .await
        .unwrap();
    h.workflow.approve(withdrawal.id, 1).await.unwrap();

    assert_eq!(h.wallets.balance(wallet.id).await.unwrap(), dec("500.00"));
    let history = h.wallets.history(wallet.id, 10).await.unwrap();
    assert_eq!(history[0].kind, EntryKind::Payout);
    assert_eq!(history[0].amount, dec("-500.00"));

    h.provider.fail_next();
    let err = h.workflow.execute(withdrawal.id).await;
    assert!(matches!(err, Err(WithdrawalError::Provider(_))));

    // compensation restored the debit
    assert_eq!(h.wallets.balance(wallet.id).await.unwrap(), dec("1000.00"));
    let history = h.wallets.history(wallet.id, 10).await.unwrap();
    assert_eq!(history[0].kind, EntryKind::Refund);
    assert_eq!(history[0].amount, dec("500.00"));

    let logs = h.store.payout_logs_for(withdrawal.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, PayoutStatus::Failed);
    assert!(logs[0].failure_reason.is_some());

    // one attempt per withdrawal: a fresh request is needed to retry
    let err = h.workflow.execute(withdrawal.id).await;
    assert!(matches!(err, Err(WithdrawalError::AlreadyExecuted(_))));
}

#[tokio::test]
async fn successful_payout_writes_success_log() {
    let h = harness();
    let wallet = h.wallets.open_wallet(54).await.unwrap();
    h.wallets
        .credit(wallet.id, EntryKind::Deposit, dec("300.00"), Default::default())
        .await
        .unwrap();

    let withdrawal = h
        .workflow
        .request(54, dec("250.00"), PayoutMethod::MobileMoney, DESTINATION)
        .await
        .unwrap();
    h.workflow.approve(withdrawal.id, 7).await.unwrap();
    let log = h.workflow.execute(withdrawal.id).await.unwrap();

    assert_eq!(log.status, PayoutStatus::Success);
    assert!(log.provider_ref.as_deref().unwrap().starts_with("momo-"));
    assert_eq!(h.wallets.balance(wallet.id).await.unwrap(), dec("50.00"));

    let err = h.workflow.execute(withdrawal.id).await;
    assert!(matches!(err, Err(WithdrawalError::AlreadyExecuted(_))));
}

#[tokio::test]
async fn rejected_withdrawal_has_no_ledger_effect() {
    let h = harness();
    let wallet = h.wallets.open_wallet(55).await.unwrap();
    h.wallets
        .credit(wallet.id, EntryKind::Deposit, dec("100.00"), Default::default())
        .await
        .unwrap();

    let withdrawal = h
        .workflow
        .request(55, dec("50.00"), PayoutMethod::MobileMoney, DESTINATION)
        .await
        .unwrap();
    let rejected = h
        .workflow
        .reject(withdrawal.id, "account under review")
        .await
        .unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);
    assert_eq!(rejected.reject_reason.as_deref(), Some("account under review"));
    assert_eq!(h.wallets.balance(wallet.id).await.unwrap(), dec("100.00"));

    // terminal: no approve after reject
    let err = h.workflow.approve(withdrawal.id, 1).await;
    assert!(matches!(err, Err(WithdrawalError::InvalidState { .. })));
}

// Scenario: refunding a settled order reverses the earning and is idempotent
#[tokio::test]
async fn dispute_refund_reverses_settled_earning_once() {
    let h = harness();
    commission_vendor(&h, 60, "0.03").await;
    delivered_item(&h, 601, 9, 60, "100.00", 1).await;
    run_engine(&h).await;

    let wallet = h.store.wallet_by_owner(60).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec("95.00"));

    let dispute = h.disputes.open(9, "item arrived broken").await.unwrap();
    // only one dispute per order
    let err = h.disputes.open(9, "duplicate").await;
    assert!(matches!(err, Err(DisputeError::AlreadyOpen(9))));

    let resolved = h
        .disputes
        .resolve(dispute.id, DisputeOutcome::Refunded, 99, Some("refund issued"))
        .await
        .unwrap();
    assert_eq!(resolved.status, DisputeStatus::Refunded);
    assert_eq!(resolved.resolved_by, Some(99));

    // the vendor is back at the pre-earning balance
    assert_eq!(h.wallets.balance(wallet.id).await.unwrap(), Decimal::ZERO);
    let history = h.wallets.history(wallet.id, 10).await.unwrap();
    assert_eq!(history[0].kind, EntryKind::Refund);
    assert_eq!(history[0].amount, dec("-95.00"));
    assert_eq!(history[0].order_item, Some(601));

    // resolving again must not double-refund
    let err = h
        .disputes
        .resolve(dispute.id, DisputeOutcome::Refunded, 99, None)
        .await;
    assert!(matches!(err, Err(DisputeError::AlreadyResolved(_))));
    assert_eq!(h.wallets.balance(wallet.id).await.unwrap(), Decimal::ZERO);

    // the item is voided; a later settlement run cannot re-credit it
    let item = h.store.order_item(601).await.unwrap().unwrap();
    assert_eq!(item.status, FulfillmentStatus::Cancelled);
    let rerun = run_engine(&h).await;
    assert_eq!(rerun.credited, 0);
}

#[tokio::test]
async fn dispute_refund_before_settlement_voids_the_items() {
    let h = harness();
    commission_vendor(&h, 61, "0.03").await;
    delivered_item(&h, 611, 11, 61, "80.00", 1).await;

    let dispute = h.disputes.open(11, "never ordered").await.unwrap();
    h.disputes
        .resolve(dispute.id, DisputeOutcome::Refunded, 99, None)
        .await
        .unwrap();

    // nothing was settled, so nothing was reversed and nothing gets credited
    assert!(h.store.wallet_by_owner(61).await.unwrap().is_none());
    let report = run_engine(&h).await;
    assert_eq!(report.processed, 0);
    assert_eq!(report.credited, 0);
}

#[tokio::test]
async fn resolved_dispute_has_no_monetary_effect() {
    let h = harness();
    commission_vendor(&h, 62, "0.03").await;
    delivered_item(&h, 621, 12, 62, "100.00", 1).await;
    run_engine(&h).await;

    let dispute = h.disputes.open(12, "late delivery").await.unwrap();
    let resolved = h
        .disputes
        .resolve(dispute.id, DisputeOutcome::Resolved, 99, Some("goodwill voucher"))
        .await
        .unwrap();
    assert_eq!(resolved.status, DisputeStatus::Resolved);

    let wallet = h.store.wallet_by_owner(62).await.unwrap().unwrap();
    assert_eq!(wallet.balance, dec("95.00"));
    // the item stays DELIVERED and settled
    let item = h.store.order_item(621).await.unwrap().unwrap();
    assert_eq!(item.status, FulfillmentStatus::Delivered);
}

// two vendors settle concurrently with independent wallets; a withdrawal on
// one never blocks settlement on the other
#[tokio::test]
async fn mixed_flows_keep_every_ledger_consistent() {
    let h = harness();
    commission_vendor(&h, 70, "0.03").await;
    commission_vendor(&h, 71, "0.05").await;
    for i in 0..10u64 {
        delivered_item(&h, 700 + i, 20 + i, 70 + (i % 2), "100.00", 1).await;
    }

    let report = run_engine(&h).await;
    assert_eq!(report.credited, 10);

    for vendor in [70u64, 71] {
        let wallet = h.store.wallet_by_owner(vendor).await.unwrap().unwrap();
        let sum = h.store.entry_sum(wallet.id).await.unwrap();
        assert_eq!(wallet.balance, sum);
        assert_eq!(h.wallets.reconcile(wallet.id).await.unwrap(), sum);
    }
}
