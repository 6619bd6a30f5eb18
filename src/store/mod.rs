//! Storage seam
//!
//! `MarketplaceStore` is the durable, transactional storage contract for every
//! record the settlement core owns. Two implementations ship: `PostgresStore`
//! (sqlx, row locks, CAS updates) and `MemoryStore` (tests, embedded use).
//!
//! Atomicity contract: `append_entry` writes the ledger entry and the cached
//! balance projection in one transaction, and enforces the EARNING order-item
//! uniqueness at the storage layer. Status updates are CAS (`expected ->
//! new`), returning whether the transition happened.

mod memory;
mod postgres;
pub mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::core_types::{OrderId, OrderItemId, UserId, VendorId, WalletId};
use crate::credit::{CreditEntry, CreditLimit};
use crate::dispute::{Dispute, DisputeStatus};
use crate::ids::{DisputeId, WithdrawalId};
use crate::orders::{FulfillmentStatus, OrderItem, VendorProfile};
use crate::settlement::SettlementReport;
use crate::wallet::{LedgerEntry, Wallet, WalletStatus};
use crate::withdrawal::{PayoutLog, Withdrawal, WithdrawalStatus};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate {0}")]
    Duplicate(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    // === Wallets & ledger ===

    /// Lazily create the vendor's wallet on first need; returns the existing
    /// one otherwise.
    async fn get_or_create_wallet(
        &self,
        owner: VendorId,
        currency: &str,
    ) -> Result<Wallet, StoreError>;

    async fn wallet(&self, id: WalletId) -> Result<Option<Wallet>, StoreError>;

    async fn wallet_by_owner(&self, owner: VendorId) -> Result<Option<Wallet>, StoreError>;

    async fn set_wallet_status(&self, id: WalletId, status: WalletStatus)
    -> Result<(), StoreError>;

    /// Atomically append a ledger entry and move the cached balance to
    /// `new_balance`. Fails with `Duplicate` if the entry is an EARNING whose
    /// order item is already settled.
    async fn append_entry(
        &self,
        entry: &LedgerEntry,
        new_balance: Decimal,
    ) -> Result<(), StoreError>;

    /// Recent-first listing of a wallet's entries
    async fn entries(&self, wallet_id: WalletId, limit: i64)
    -> Result<Vec<LedgerEntry>, StoreError>;

    /// Sum of all entry amounts for a wallet (the authoritative balance)
    async fn entry_sum(&self, wallet_id: WalletId) -> Result<Decimal, StoreError>;

    /// The EARNING entry referencing an order item, if settlement already ran
    async fn earning_for_item(
        &self,
        item: OrderItemId,
    ) -> Result<Option<LedgerEntry>, StoreError>;

    // === Vendors & order items (read models fed by the platform) ===

    async fn vendor_profile(&self, vendor: VendorId)
    -> Result<Option<VendorProfile>, StoreError>;

    async fn upsert_vendor_profile(&self, profile: &VendorProfile) -> Result<(), StoreError>;

    async fn insert_order_item(&self, item: &OrderItem) -> Result<(), StoreError>;

    async fn order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>, StoreError>;

    async fn items_for_order(&self, order: OrderId) -> Result<Vec<OrderItem>, StoreError>;

    async fn set_item_status(
        &self,
        id: OrderItemId,
        status: FulfillmentStatus,
    ) -> Result<(), StoreError>;

    /// Persist the fee breakdown computed at pricing time (write-once)
    async fn set_item_fees(
        &self,
        id: OrderItemId,
        platform_fee: Decimal,
        gateway_fee: Decimal,
    ) -> Result<(), StoreError>;

    /// DELIVERED items with `delivered_at` in `[start, end)`, ordered by
    /// vendor id then item id so re-runs scan deterministically.
    async fn delivered_items(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>, StoreError>;

    // === Withdrawals & payouts ===

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError>;

    async fn withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>, StoreError>;

    /// CAS status update; returns false when the current status does not
    /// match `expected` (another worker won).
    async fn update_withdrawal_if(
        &self,
        id: WithdrawalId,
        expected: WithdrawalStatus,
        new: WithdrawalStatus,
        approved_by: Option<UserId>,
        reject_reason: Option<&str>,
    ) -> Result<bool, StoreError>;

    async fn insert_payout_log(&self, log: &PayoutLog) -> Result<(), StoreError>;

    async fn payout_logs_for(
        &self,
        withdrawal: WithdrawalId,
    ) -> Result<Vec<PayoutLog>, StoreError>;

    // === BNPL credit ===

    async fn credit_limit(&self, user: UserId) -> Result<Option<CreditLimit>, StoreError>;

    /// Fails with `Duplicate` when the user already has a limit
    async fn insert_credit_limit(&self, limit: &CreditLimit) -> Result<(), StoreError>;

    async fn set_credit_standing(
        &self,
        user: UserId,
        eligible: bool,
        active: bool,
    ) -> Result<(), StoreError>;

    /// Atomically move `current_usage` to `new_usage` and append the entry
    async fn update_credit_usage(
        &self,
        user: UserId,
        new_usage: Decimal,
        entry: &CreditEntry,
    ) -> Result<(), StoreError>;

    /// Recent-first listing of a user's credit entries
    async fn credit_entries(&self, user: UserId, limit: i64)
    -> Result<Vec<CreditEntry>, StoreError>;

    // === Disputes ===

    /// Fails with `Duplicate` when the order already has a dispute
    async fn insert_dispute(&self, dispute: &Dispute) -> Result<(), StoreError>;

    async fn dispute(&self, id: DisputeId) -> Result<Option<Dispute>, StoreError>;

    async fn dispute_for_order(&self, order: OrderId) -> Result<Option<Dispute>, StoreError>;

    /// CAS OPEN -> terminal; returns false when the dispute was not OPEN
    async fn resolve_dispute_if_open(
        &self,
        id: DisputeId,
        status: DisputeStatus,
        resolved_by: UserId,
        notes: Option<&str>,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    // === Settlement runs ===

    /// Persist a run summary; returns a store-assigned run id
    async fn record_settlement_run(&self, report: &SettlementReport) -> Result<Uuid, StoreError>;
}
