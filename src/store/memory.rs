//! In-memory store
//!
//! Backs unit/integration tests and embedded use. A single async mutex guards
//! the maps; per-wallet write serialization is provided above the store by
//! the keyed locks, so contention here is short and uniform.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core_types::{OrderId, OrderItemId, UserId, VendorId, WalletId};
use crate::credit::{CreditEntry, CreditLimit};
use crate::dispute::{Dispute, DisputeStatus};
use crate::ids::{DisputeId, WithdrawalId};
use crate::orders::{FulfillmentStatus, OrderItem, VendorProfile};
use crate::settlement::SettlementReport;
use crate::wallet::{EntryKind, LedgerEntry, Wallet, WalletStatus};
use crate::withdrawal::{PayoutLog, Withdrawal, WithdrawalStatus};

use super::{MarketplaceStore, StoreError};

#[derive(Default)]
struct Inner {
    wallets: HashMap<WalletId, Wallet>,
    owner_index: HashMap<VendorId, WalletId>,
    next_wallet_id: WalletId,
    entries: HashMap<WalletId, Vec<LedgerEntry>>,
    /// EARNING idempotency index: order item -> settled
    settled_items: HashMap<OrderItemId, LedgerEntry>,
    vendors: HashMap<VendorId, VendorProfile>,
    items: HashMap<OrderItemId, OrderItem>,
    withdrawals: HashMap<WithdrawalId, Withdrawal>,
    payout_logs: Vec<PayoutLog>,
    credit_limits: HashMap<UserId, CreditLimit>,
    credit_entries: Vec<CreditEntry>,
    disputes: HashMap<DisputeId, Dispute>,
    dispute_by_order: HashMap<OrderId, DisputeId>,
    settlement_runs: Vec<(Uuid, SettlementReport)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted settlement run summaries
    pub async fn settlement_run_count(&self) -> usize {
        self.inner.lock().await.settlement_runs.len()
    }
}

#[async_trait]
impl MarketplaceStore for MemoryStore {
    async fn get_or_create_wallet(
        &self,
        owner: VendorId,
        currency: &str,
    ) -> Result<Wallet, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(&id) = inner.owner_index.get(&owner) {
            return Ok(inner.wallets[&id].clone());
        }
        inner.next_wallet_id += 1;
        let id = inner.next_wallet_id;
        let now = Utc::now();
        let wallet = Wallet {
            id,
            owner,
            balance: Decimal::ZERO,
            currency: currency.to_string(),
            status: WalletStatus::Active,
            created_at: now,
            updated_at: now,
        };
        inner.owner_index.insert(owner, id);
        inner.wallets.insert(id, wallet.clone());
        inner.entries.insert(id, Vec::new());
        Ok(wallet)
    }

    async fn wallet(&self, id: WalletId) -> Result<Option<Wallet>, StoreError> {
        Ok(self.inner.lock().await.wallets.get(&id).cloned())
    }

    async fn wallet_by_owner(&self, owner: VendorId) -> Result<Option<Wallet>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .owner_index
            .get(&owner)
            .and_then(|id| inner.wallets.get(id))
            .cloned())
    }

    async fn set_wallet_status(
        &self,
        id: WalletId,
        status: WalletStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(wallet) = inner.wallets.get_mut(&id) {
            wallet.status = status;
            wallet.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn append_entry(
        &self,
        entry: &LedgerEntry,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        if entry.kind == EntryKind::Earning {
            if let Some(item) = entry.order_item {
                if inner.settled_items.contains_key(&item) {
                    return Err(StoreError::Duplicate("EARNING entry for order item"));
                }
                inner.settled_items.insert(item, entry.clone());
            }
        }

        inner
            .entries
            .entry(entry.wallet_id)
            .or_default()
            .push(entry.clone());
        if let Some(wallet) = inner.wallets.get_mut(&entry.wallet_id) {
            wallet.balance = new_balance;
            wallet.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn entries(
        &self,
        wallet_id: WalletId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .get(&wallet_id)
            .map(|v| v.iter().rev().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn entry_sum(&self, wallet_id: WalletId) -> Result<Decimal, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .get(&wallet_id)
            .map(|v| v.iter().map(|e| e.amount).sum())
            .unwrap_or(Decimal::ZERO))
    }

    async fn earning_for_item(
        &self,
        item: OrderItemId,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.inner.lock().await.settled_items.get(&item).cloned())
    }

    async fn vendor_profile(
        &self,
        vendor: VendorId,
    ) -> Result<Option<VendorProfile>, StoreError> {
        Ok(self.inner.lock().await.vendors.get(&vendor).cloned())
    }

    async fn upsert_vendor_profile(&self, profile: &VendorProfile) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .vendors
            .insert(profile.vendor_id, profile.clone());
        Ok(())
    }

    async fn insert_order_item(&self, item: &OrderItem) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.items.contains_key(&item.id) {
            return Err(StoreError::Duplicate("order item"));
        }
        inner.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>, StoreError> {
        Ok(self.inner.lock().await.items.get(&id).cloned())
    }

    async fn items_for_order(&self, order: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let inner = self.inner.lock().await;
        let mut out: Vec<OrderItem> = inner
            .items
            .values()
            .filter(|i| i.order_id == order)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.id);
        Ok(out)
    }

    async fn set_item_status(
        &self,
        id: OrderItemId,
        status: FulfillmentStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(item) = inner.items.get_mut(&id) {
            item.status = status;
            if status == FulfillmentStatus::Delivered && item.delivered_at.is_none() {
                item.delivered_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn set_item_fees(
        &self,
        id: OrderItemId,
        platform_fee: Decimal,
        gateway_fee: Decimal,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        // write-once: an already-priced item keeps its original figures
        if let Some(item) = inner.items.get_mut(&id) {
            if !item.fees_priced {
                item.platform_fee = platform_fee;
                item.gateway_fee = gateway_fee;
                item.fees_priced = true;
            }
        }
        Ok(())
    }

    async fn delivered_items(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>, StoreError> {
        let inner = self.inner.lock().await;
        let mut out: Vec<OrderItem> = inner
            .items
            .values()
            .filter(|i| {
                i.status == FulfillmentStatus::Delivered
                    && i.delivered_at.map(|t| start <= t && t < end).unwrap_or(false)
            })
            .cloned()
            .collect();
        out.sort_by_key(|i| (i.vendor_id, i.id));
        Ok(out)
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.withdrawals.contains_key(&withdrawal.id) {
            return Err(StoreError::Duplicate("withdrawal"));
        }
        inner.withdrawals.insert(withdrawal.id, withdrawal.clone());
        Ok(())
    }

    async fn withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>, StoreError> {
        Ok(self.inner.lock().await.withdrawals.get(&id).cloned())
    }

    async fn update_withdrawal_if(
        &self,
        id: WithdrawalId,
        expected: WithdrawalStatus,
        new: WithdrawalStatus,
        approved_by: Option<UserId>,
        reject_reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.withdrawals.get_mut(&id) {
            Some(w) if w.status == expected => {
                w.status = new;
                if approved_by.is_some() {
                    w.approved_by = approved_by;
                }
                if let Some(reason) = reject_reason {
                    w.reject_reason = Some(reason.to_string());
                }
                w.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_payout_log(&self, log: &PayoutLog) -> Result<(), StoreError> {
        self.inner.lock().await.payout_logs.push(log.clone());
        Ok(())
    }

    async fn payout_logs_for(
        &self,
        withdrawal: WithdrawalId,
    ) -> Result<Vec<PayoutLog>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .payout_logs
            .iter()
            .filter(|l| l.withdrawal_id == withdrawal)
            .cloned()
            .collect())
    }

    async fn credit_limit(&self, user: UserId) -> Result<Option<CreditLimit>, StoreError> {
        Ok(self.inner.lock().await.credit_limits.get(&user).cloned())
    }

    async fn insert_credit_limit(&self, limit: &CreditLimit) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.credit_limits.contains_key(&limit.user_id) {
            return Err(StoreError::Duplicate("credit limit"));
        }
        inner.credit_limits.insert(limit.user_id, limit.clone());
        Ok(())
    }

    async fn set_credit_standing(
        &self,
        user: UserId,
        eligible: bool,
        active: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(limit) = inner.credit_limits.get_mut(&user) {
            limit.eligible = eligible;
            limit.active = active;
            limit.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_credit_usage(
        &self,
        user: UserId,
        new_usage: Decimal,
        entry: &CreditEntry,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(limit) = inner.credit_limits.get_mut(&user) {
            limit.current_usage = new_usage;
            limit.updated_at = Utc::now();
        }
        inner.credit_entries.push(entry.clone());
        Ok(())
    }

    async fn credit_entries(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<CreditEntry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .credit_entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn insert_dispute(&self, dispute: &Dispute) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.dispute_by_order.contains_key(&dispute.order_id) {
            return Err(StoreError::Duplicate("dispute for order"));
        }
        inner.dispute_by_order.insert(dispute.order_id, dispute.id);
        inner.disputes.insert(dispute.id, dispute.clone());
        Ok(())
    }

    async fn dispute(&self, id: DisputeId) -> Result<Option<Dispute>, StoreError> {
        Ok(self.inner.lock().await.disputes.get(&id).cloned())
    }

    async fn dispute_for_order(&self, order: OrderId) -> Result<Option<Dispute>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .dispute_by_order
            .get(&order)
            .and_then(|id| inner.disputes.get(id))
            .cloned())
    }

    async fn resolve_dispute_if_open(
        &self,
        id: DisputeId,
        status: DisputeStatus,
        resolved_by: UserId,
        notes: Option<&str>,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.disputes.get_mut(&id) {
            Some(d) if d.status == DisputeStatus::Open => {
                d.status = status;
                d.resolved_by = Some(resolved_by);
                d.resolution_notes = notes.map(str::to_string);
                d.resolved_at = Some(resolved_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_settlement_run(
        &self,
        report: &SettlementReport,
    ) -> Result<Uuid, StoreError> {
        let run_id = Uuid::new_v4();
        self.inner
            .lock()
            .await
            .settlement_runs
            .push((run_id, report.clone()));
        Ok(run_id)
    }
}
