//! Dispute / refund handler
//!
//! One dispute per order. Resolving as REFUNDED reverses every settled
//! earning of the order with a compensating REFUND entry and cancels the
//! order's items so no later settlement run can credit them. Resolution is
//! idempotent per dispute: only an OPEN dispute transitions, and the whole
//! resolution for one order is serialized.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::core_types::{OrderId, UserId};
use crate::ids::DisputeId;
use crate::locks::KeyedLocks;
use crate::orders::FulfillmentStatus;
use crate::store::{MarketplaceStore, StoreError};
use crate::wallet::{EntryKind, EntryMeta, WalletService};

use super::error::DisputeError;
use super::types::{Dispute, DisputeOutcome, DisputeStatus};

pub struct DisputeHandler {
    store: Arc<dyn MarketplaceStore>,
    wallets: Arc<WalletService>,
    /// Serializes resolution per order id
    resolution_locks: KeyedLocks,
}

impl DisputeHandler {
    pub fn new(store: Arc<dyn MarketplaceStore>, wallets: Arc<WalletService>) -> Self {
        Self {
            store,
            wallets,
            resolution_locks: KeyedLocks::new(),
        }
    }

    /// Open a dispute for an order. Fails when the order already has one.
    pub async fn open(&self, order: OrderId, reason: &str) -> Result<Dispute, DisputeError> {
        let dispute = Dispute {
            id: DisputeId::new(),
            order_id: order,
            reason: reason.to_string(),
            status: DisputeStatus::Open,
            resolution_notes: None,
            resolved_by: None,
            resolved_at: None,
            created_at: Utc::now(),
        };
        match self.store.insert_dispute(&dispute).await {
            Ok(()) => {
                info!(dispute = %dispute.id, order, "dispute opened");
                Ok(dispute)
            }
            Err(StoreError::Duplicate(_)) => Err(DisputeError::AlreadyOpen(order)),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve an open dispute. RESOLVED has no monetary effect; REFUNDED
    /// reverses the vendor-side earnings before the terminal transition, so a
    /// reversal failure leaves the dispute OPEN and retryable without ever
    /// double-refunding (already-reversed items are marked CANCELLED).
    pub async fn resolve(
        &self,
        id: DisputeId,
        outcome: DisputeOutcome,
        resolver: UserId,
        notes: Option<&str>,
    ) -> Result<Dispute, DisputeError> {
        let dispute = self.load(id).await?;
        let _guard = self.resolution_locks.acquire(dispute.order_id).await;

        // re-read under the lock; a concurrent resolver may have won
        let dispute = self.load(id).await?;
        if dispute.status.is_terminal() {
            return Err(DisputeError::AlreadyResolved(id));
        }

        if outcome == DisputeOutcome::Refunded {
            self.reverse_order_earnings(&dispute).await?;
        }

        let transitioned = self
            .store
            .resolve_dispute_if_open(id, outcome.final_status(), resolver, notes, Utc::now())
            .await?;
        if !transitioned {
            return Err(DisputeError::AlreadyResolved(id));
        }
        info!(dispute = %id, order = dispute.order_id, outcome = %outcome.final_status(), "dispute resolved");
        self.load(id).await
    }

    /// Reverse each settled item of the disputed order and cancel the items.
    /// Per-item: the CANCELLED marker is set only after a successful
    /// reversal, so a retried resolution skips what is already undone.
    async fn reverse_order_earnings(&self, dispute: &Dispute) -> Result<(), DisputeError> {
        let items = self.store.items_for_order(dispute.order_id).await?;
        for item in items {
            if item.status == FulfillmentStatus::Cancelled {
                continue;
            }
            if let Some(earning) = self.store.earning_for_item(item.id).await? {
                let meta = EntryMeta::for_item(
                    item.id,
                    format!("reversal of earning for disputed order {}", dispute.order_id),
                );
                // signed reversal of exactly what was credited; bypasses the
                // sufficiency check since the vendor may have withdrawn
                self.wallets
                    .debit(earning.wallet_id, EntryKind::Refund, earning.amount, meta)
                    .await?;
                info!(
                    dispute = %dispute.id,
                    item = item.id,
                    amount = %earning.amount,
                    "settled earning reversed"
                );
            } else {
                warn!(
                    dispute = %dispute.id,
                    item = item.id,
                    "item not yet settled, cancelling without reversal"
                );
            }
            self.store
                .set_item_status(item.id, FulfillmentStatus::Cancelled)
                .await?;
        }
        Ok(())
    }

    pub async fn for_order(&self, order: OrderId) -> Result<Option<Dispute>, DisputeError> {
        Ok(self.store.dispute_for_order(order).await?)
    }

    async fn load(&self, id: DisputeId) -> Result<Dispute, DisputeError> {
        self.store
            .dispute(id)
            .await?
            .ok_or(DisputeError::NotFound(id))
    }
}
