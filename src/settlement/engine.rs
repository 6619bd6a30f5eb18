//! Settlement engine
//!
//! Scans DELIVERED, unsettled order items of commission vendors for a period
//! and credits each vendor wallet exactly once per item. Re-running a period
//! is a no-op for already-settled items; a failure on one item is recorded,
//! skipped, and naturally retried on the next run. Each item's credit is a
//! single atomic step, so a run cancelled between items leaves no partial
//! credit behind.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::core_types::{OrderItemId, VendorId};
use crate::fees::{GatewayFeeSchedule, compute_fees};
use crate::orders::OrderItem;
use crate::store::{MarketplaceStore, StoreError};
use crate::wallet::{Applied, WalletService};

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// One item the run could not credit; stays unsettled and is retried on the
/// next scheduled run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementFailure {
    pub item: OrderItemId,
    pub vendor: VendorId,
    pub error: String,
}

/// Summary of one settlement run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Candidate items scanned
    pub processed: u64,
    /// Items credited by this run
    pub credited: u64,
    /// Items found already settled (idempotent no-op)
    pub skipped: u64,
    pub total_credited: Decimal,
    pub failures: Vec<SettlementFailure>,
}

pub struct SettlementEngine {
    store: Arc<dyn MarketplaceStore>,
    wallets: Arc<WalletService>,
    gateway: GatewayFeeSchedule,
    minor_units: u32,
    period: Duration,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        wallets: Arc<WalletService>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            wallets,
            gateway: config.fees.gateway_schedule(),
            minor_units: config.currency.minor_units,
            period: Duration::days(config.settlement.period_days),
        }
    }

    /// Settle the configured period ending at `end` (the scheduler's entry
    /// point; default weekly).
    pub async fn run_period_ending(
        &self,
        end: DateTime<Utc>,
    ) -> Result<SettlementReport, SettlementError> {
        self.run(end - self.period, end).await
    }

    /// Settle all eligible items delivered within `[start, end)`
    pub async fn run(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SettlementReport, SettlementError> {
        let mut report = SettlementReport {
            period_start: start,
            period_end: end,
            processed: 0,
            credited: 0,
            skipped: 0,
            total_credited: Decimal::ZERO,
            failures: Vec::new(),
        };

        // Deterministic scan order: vendor id, then item id
        let candidates = self.store.delivered_items(start, end).await?;
        info!(
            candidates = candidates.len(),
            %start,
            %end,
            "settlement run started"
        );

        for item in candidates {
            let model = match self.store.vendor_profile(item.vendor_id).await? {
                Some(profile) => profile.business_model,
                None => {
                    warn!(item = item.id, vendor = item.vendor_id, "vendor profile missing");
                    report.failures.push(SettlementFailure {
                        item: item.id,
                        vendor: item.vendor_id,
                        error: "vendor profile missing".to_string(),
                    });
                    continue;
                }
            };
            // Subscription vendors owe no per-sale earning flow through
            // settlement batches; their sales pay out via direct PAYMENT
            // entries at checkout.
            if !model.is_commission() {
                continue;
            }
            report.processed += 1;

            let net = match self.net_earning(&item, model).await {
                Ok(net) => net,
                Err(e) => {
                    report.failures.push(SettlementFailure {
                        item: item.id,
                        vendor: item.vendor_id,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            if net <= Decimal::ZERO {
                // fees consumed the whole sale; nothing to credit
                info!(item = item.id, "zero net earning, nothing to credit");
                continue;
            }

            match self.credit_item(&item, net).await {
                Ok(Applied::Credited(_)) => {
                    report.credited += 1;
                    report.total_credited += net;
                }
                Ok(Applied::AlreadySettled) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        item = item.id,
                        vendor = item.vendor_id,
                        error = %e,
                        "failed to credit item, will retry next run"
                    );
                    report.failures.push(SettlementFailure {
                        item: item.id,
                        vendor: item.vendor_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            processed = report.processed,
            credited = report.credited,
            skipped = report.skipped,
            total = %report.total_credited,
            failures = report.failures.len(),
            "settlement run finished"
        );
        self.store.record_settlement_run(&report).await?;
        Ok(report)
    }

    /// Net earning from the persisted fee breakdown, pricing the item first
    /// if nothing priced it at fulfillment time.
    async fn net_earning(
        &self,
        item: &OrderItem,
        model: crate::fees::BusinessModel,
    ) -> Result<Decimal, StoreError> {
        if item.fees_priced {
            return Ok(item.net_earning());
        }
        let fees = compute_fees(
            item.unit_price,
            item.quantity,
            model,
            &self.gateway,
            self.minor_units,
        );
        self.store
            .set_item_fees(item.id, fees.platform_fee, fees.gateway_fee)
            .await?;
        Ok(fees.net_earning)
    }

    /// One atomic, idempotent credit for one item
    async fn credit_item(
        &self,
        item: &OrderItem,
        net: Decimal,
    ) -> Result<Applied, crate::wallet::WalletError> {
        let wallet = self.wallets.open_wallet(item.vendor_id).await?;
        self.wallets.settle_earning(wallet.id, net, item.id).await
    }
}
