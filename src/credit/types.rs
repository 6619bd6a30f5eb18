//! BNPL credit types
//!
//! A per-user usage/limit pair with its own append-only transaction log,
//! independent of the vendor wallet but following the same ledger pattern.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{OrderId, UserId};
use crate::ids::EntryId;

/// Revolving credit facility for one user.
///
/// Invariant after every operation: `0 <= current_usage <= max_limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLimit {
    pub user_id: UserId,
    pub max_limit: Decimal,
    pub current_usage: Decimal,
    pub currency: String,
    pub eligible: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreditLimit {
    pub fn available(&self) -> Decimal {
        self.max_limit - self.current_usage
    }
}

/// Credit transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditEntryKind {
    Usage = 1,
    Repayment = 2,
    Adjustment = 3,
}

impl CreditEntryKind {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(CreditEntryKind::Usage),
            2 => Some(CreditEntryKind::Repayment),
            3 => Some(CreditEntryKind::Adjustment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CreditEntryKind::Usage => "USAGE",
            CreditEntryKind::Repayment => "REPAYMENT",
            CreditEntryKind::Adjustment => "ADJUSTMENT",
        }
    }
}

impl fmt::Display for CreditEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only credit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub kind: CreditEntryKind,
    /// Amount applied to `current_usage` (always positive; the kind gives the
    /// direction, ADJUSTMENT is signed)
    pub amount: Decimal,
    pub order_ref: Option<OrderId>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
