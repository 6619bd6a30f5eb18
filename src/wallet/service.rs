//! Wallet service
//!
//! The single mutation path for wallet balances. Every component that moves
//! vendor money (settlement engine, withdrawal workflow, dispute handler)
//! funnels through `credit`/`debit`/`adjust` here; nothing else writes a
//! balance. Mutations for one wallet are serialized by a keyed lock; wallets
//! never block each other.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::config::CurrencyConfig;
use crate::core_types::{OrderItemId, VendorId, WalletId};
use crate::ids::EntryId;
use crate::locks::KeyedLocks;
use crate::money::check_positive;
use crate::store::{MarketplaceStore, StoreError};

use super::error::WalletError;
use super::types::{EntryKind, EntryMeta, LedgerEntry, Wallet, WalletStatus};

/// Result of an idempotent settlement credit
#[derive(Debug)]
pub enum Applied {
    Credited(LedgerEntry),
    /// The order item already has an EARNING entry; treated as success-no-op
    AlreadySettled,
}

pub struct WalletService {
    store: Arc<dyn MarketplaceStore>,
    locks: KeyedLocks,
    currency: String,
    minor_units: u32,
}

impl WalletService {
    pub fn new(store: Arc<dyn MarketplaceStore>, currency: &CurrencyConfig) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            currency: currency.code.clone(),
            minor_units: currency.minor_units,
        }
    }

    /// Lazily create the vendor's wallet on first need
    pub async fn open_wallet(&self, owner: VendorId) -> Result<Wallet, WalletError> {
        Ok(self.store.get_or_create_wallet(owner, &self.currency).await?)
    }

    /// Append a positive entry (EARNING, DEPOSIT, or a compensating REFUND)
    pub async fn credit(
        &self,
        wallet_id: WalletId,
        kind: EntryKind,
        amount: Decimal,
        meta: EntryMeta,
    ) -> Result<LedgerEntry, WalletError> {
        let amount = check_positive(amount, self.minor_units)?;
        self.apply(wallet_id, kind, amount, meta, false).await
    }

    /// Append a negative entry. PAYOUT/PAYMENT/SUBSCRIPTION* debits require
    /// the balance to cover them; REFUND debits (dispute reversals) do not,
    /// since the vendor may already have withdrawn the funds.
    pub async fn debit(
        &self,
        wallet_id: WalletId,
        kind: EntryKind,
        amount: Decimal,
        meta: EntryMeta,
    ) -> Result<LedgerEntry, WalletError> {
        let amount = check_positive(amount, self.minor_units)?;
        self.apply(wallet_id, kind, -amount, meta, kind.requires_sufficiency())
            .await
    }

    /// Signed administrative correction; bypasses the sufficiency check but
    /// demands a human-readable reason.
    pub async fn adjust(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        reason: &str,
    ) -> Result<LedgerEntry, WalletError> {
        if reason.trim().is_empty() {
            return Err(WalletError::MissingReason);
        }
        if amount == Decimal::ZERO {
            return Err(WalletError::InvalidAmount(
                crate::money::MoneyError::InvalidAmount,
            ));
        }
        self.apply(
            wallet_id,
            EntryKind::Adjustment,
            amount,
            EntryMeta::describe(reason),
            false,
        )
        .await
    }

    /// Idempotently credit a settled sale. The existence check and the append
    /// run under the same wallet lock; the store's unique constraint on
    /// EARNING order-item references backstops any race.
    pub async fn settle_earning(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        item: OrderItemId,
    ) -> Result<Applied, WalletError> {
        let amount = check_positive(amount, self.minor_units)?;
        let _guard = self.locks.acquire(wallet_id).await;

        if self.store.earning_for_item(item).await?.is_some() {
            debug!(wallet_id, item, "order item already settled, skipping");
            return Ok(Applied::AlreadySettled);
        }

        let meta = EntryMeta::for_item(item, format!("settlement of order item {item}"));
        match self
            .apply_locked(wallet_id, EntryKind::Earning, amount, meta, false)
            .await
        {
            Ok(entry) => Ok(Applied::Credited(entry)),
            Err(WalletError::Store(StoreError::Duplicate(_))) => Ok(Applied::AlreadySettled),
            Err(e) => Err(e),
        }
    }

    /// Cached balance
    pub async fn balance(&self, wallet_id: WalletId) -> Result<Decimal, WalletError> {
        let wallet = self
            .store
            .wallet(wallet_id)
            .await?
            .ok_or(WalletError::NotFound(wallet_id))?;
        Ok(wallet.balance)
    }

    /// Recent-first entry listing
    pub async fn history(
        &self,
        wallet_id: WalletId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        Ok(self.store.entries(wallet_id, limit).await?)
    }

    /// Recompute the balance from the ledger and compare with the cached
    /// projection. A mismatch freezes the wallet and surfaces as an
    /// integrity violation; it is never auto-corrected.
    pub async fn reconcile(&self, wallet_id: WalletId) -> Result<Decimal, WalletError> {
        let _guard = self.locks.acquire(wallet_id).await;
        let wallet = self
            .store
            .wallet(wallet_id)
            .await?
            .ok_or(WalletError::NotFound(wallet_id))?;
        let computed = self.store.entry_sum(wallet_id).await?;

        if computed != wallet.balance {
            error!(
                wallet_id,
                cached = %wallet.balance,
                computed = %computed,
                "ledger integrity violation, freezing wallet"
            );
            self.store
                .set_wallet_status(wallet_id, WalletStatus::Frozen)
                .await?;
            return Err(WalletError::IntegrityViolation {
                wallet_id,
                cached: wallet.balance,
                computed,
            });
        }
        Ok(computed)
    }

    /// Manual-audit exit: re-verify the ledger and reactivate the wallet.
    /// Refuses while the mismatch persists.
    pub async fn release_after_audit(&self, wallet_id: WalletId) -> Result<(), WalletError> {
        let _guard = self.locks.acquire(wallet_id).await;
        let wallet = self
            .store
            .wallet(wallet_id)
            .await?
            .ok_or(WalletError::NotFound(wallet_id))?;
        let computed = self.store.entry_sum(wallet_id).await?;
        if computed != wallet.balance {
            return Err(WalletError::IntegrityViolation {
                wallet_id,
                cached: wallet.balance,
                computed,
            });
        }
        self.store
            .set_wallet_status(wallet_id, WalletStatus::Active)
            .await?;
        info!(wallet_id, "wallet reactivated after audit");
        Ok(())
    }

    async fn apply(
        &self,
        wallet_id: WalletId,
        kind: EntryKind,
        signed_amount: Decimal,
        meta: EntryMeta,
        check_sufficiency: bool,
    ) -> Result<LedgerEntry, WalletError> {
        let _guard = self.locks.acquire(wallet_id).await;
        self.apply_locked(wallet_id, kind, signed_amount, meta, check_sufficiency)
            .await
    }

    /// Caller must hold the wallet lock
    async fn apply_locked(
        &self,
        wallet_id: WalletId,
        kind: EntryKind,
        signed_amount: Decimal,
        meta: EntryMeta,
        check_sufficiency: bool,
    ) -> Result<LedgerEntry, WalletError> {
        let wallet = self
            .store
            .wallet(wallet_id)
            .await?
            .ok_or(WalletError::NotFound(wallet_id))?;

        if wallet.status == WalletStatus::Frozen {
            return Err(WalletError::Frozen(wallet_id));
        }

        if check_sufficiency && wallet.balance < -signed_amount {
            return Err(WalletError::InsufficientBalance {
                requested: -signed_amount,
                available: wallet.balance,
            });
        }

        let entry = LedgerEntry {
            id: EntryId::new(),
            wallet_id,
            kind,
            amount: signed_amount,
            order_item: meta.order_item,
            fx_rate: meta.fx_rate,
            description: meta.description,
            created_at: Utc::now(),
        };
        let new_balance = wallet.balance + signed_amount;
        self.store.append_entry(&entry, new_balance).await?;

        debug!(
            wallet_id,
            kind = %kind,
            amount = %signed_amount,
            balance = %new_balance,
            "ledger entry appended"
        );
        Ok(entry)
    }
}
