//! Wallet and ledger entry types
//!
//! The ledger is the source of truth: one immutable signed entry per balance
//! change. `Wallet.balance` is only a cached projection of the entry sum and
//! is reconciled against it (never silently corrected).

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{OrderItemId, VendorId, WalletId};
use crate::ids::EntryId;

/// Wallet write-availability.
///
/// A wallet is frozen when reconciliation finds the cached balance diverging
/// from the entry sum; frozen wallets refuse all writes until manual audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Active = 1,
    Frozen = 2,
}

impl WalletStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(WalletStatus::Active),
            2 => Some(WalletStatus::Frozen),
            _ => None,
        }
    }
}

/// One vendor wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub owner: VendorId,
    /// Cached projection of the entry sum
    pub balance: Decimal,
    pub currency: String,
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry kind.
///
/// Ids are stored as SMALLINT. Sign conventions: EARNING/DEPOSIT entries are
/// positive; PAYOUT/PAYMENT/SUBSCRIPTION* entries are negative; ADJUSTMENT
/// and REFUND entries carry either sign (compensation credits, dispute
/// reversal debits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Earning = 1,
    Payout = 2,
    Refund = 3,
    Adjustment = 4,
    Deposit = 5,
    Payment = 6,
    Subscription = 7,
    SubscriptionRenewal = 8,
}

impl EntryKind {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(EntryKind::Earning),
            2 => Some(EntryKind::Payout),
            3 => Some(EntryKind::Refund),
            4 => Some(EntryKind::Adjustment),
            5 => Some(EntryKind::Deposit),
            6 => Some(EntryKind::Payment),
            7 => Some(EntryKind::Subscription),
            8 => Some(EntryKind::SubscriptionRenewal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Earning => "EARNING",
            EntryKind::Payout => "PAYOUT",
            EntryKind::Refund => "REFUND",
            EntryKind::Adjustment => "ADJUSTMENT",
            EntryKind::Deposit => "DEPOSIT",
            EntryKind::Payment => "PAYMENT",
            EntryKind::Subscription => "SUBSCRIPTION",
            EntryKind::SubscriptionRenewal => "SUBSCRIPTION_RENEWAL",
        }
    }

    /// Kinds that must be written with a positive amount
    #[inline]
    pub fn is_credit(&self) -> bool {
        matches!(self, EntryKind::Earning | EntryKind::Deposit)
    }

    /// Kinds debited only when the balance covers them
    #[inline]
    pub fn requires_sufficiency(&self) -> bool {
        matches!(
            self,
            EntryKind::Payout
                | EntryKind::Payment
                | EntryKind::Subscription
                | EntryKind::SubscriptionRenewal
        )
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable ledger entry. Corrections are new ADJUSTMENT entries, never
/// edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub wallet_id: WalletId,
    pub kind: EntryKind,
    /// Signed amount; the wallet balance is the sum of these
    pub amount: Decimal,
    /// Settlement idempotency key for EARNING entries; also set on dispute
    /// REFUND reversals to link them back to the sale
    pub order_item: Option<OrderItemId>,
    /// Stored exchange rate when the payment came in a foreign currency
    pub fx_rate: Option<Decimal>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied metadata for a new entry
#[derive(Debug, Clone, Default)]
pub struct EntryMeta {
    pub order_item: Option<OrderItemId>,
    pub fx_rate: Option<Decimal>,
    pub description: String,
}

impl EntryMeta {
    pub fn describe(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn for_item(order_item: OrderItemId, description: impl Into<String>) -> Self {
        Self {
            order_item: Some(order_item),
            fx_rate: None,
            description: description.into(),
        }
    }

    pub fn with_fx(mut self, rate: Decimal) -> Self {
        self.fx_rate = Some(rate);
        self
    }
}
