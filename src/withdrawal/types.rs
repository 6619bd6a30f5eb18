//! Withdrawal requests and payout audit log

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_types::{OrderItemId, VendorId, WalletId};
use crate::ids::WithdrawalId;

/// Withdrawal request state machine.
///
/// PENDING --approve--> APPROVED (wallet debited atomically)
/// PENDING --reject--> REJECTED (no ledger effect)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending = 0,
    Approved = 10,
    Rejected = -10,
}

impl WithdrawalStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(WithdrawalStatus::Pending),
            10 => Some(WithdrawalStatus::Approved),
            -10 => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "PENDING",
            WithdrawalStatus::Approved => "APPROVED",
            WithdrawalStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the vendor wants to be paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    MobileMoney = 1,
    BankTransfer = 2,
}

impl PayoutMethod {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(PayoutMethod::MobileMoney),
            2 => Some(PayoutMethod::BankTransfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutMethod::MobileMoney => "mobile_money",
            PayoutMethod::BankTransfer => "bank_transfer",
        }
    }
}

/// A vendor's request to withdraw wallet funds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub vendor_id: VendorId,
    pub wallet_id: WalletId,
    pub amount: Decimal,
    pub method: PayoutMethod,
    /// Phone number or bank account, depending on method
    pub destination: String,
    pub status: WithdrawalStatus,
    pub approved_by: Option<u64>,
    pub reject_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one payout attempt at the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Pending = 0,
    Success = 10,
    Failed = -10,
}

impl PayoutStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(PayoutStatus::Pending),
            10 => Some(PayoutStatus::Success),
            -10 => Some(PayoutStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "PENDING",
            PayoutStatus::Success => "SUCCESS",
            PayoutStatus::Failed => "FAILED",
        }
    }
}

/// Immutable audit record of one executed payout attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutLog {
    pub id: Uuid,
    pub withdrawal_id: WithdrawalId,
    pub vendor_id: VendorId,
    pub provider: String,
    pub amount: Decimal,
    pub currency: String,
    pub destination: String,
    pub status: PayoutStatus,
    /// Provider-side transaction reference, present on SUCCESS
    pub provider_ref: Option<String>,
    pub failure_reason: Option<String>,
    /// Optional link back to a sale when the payout settles a single item
    pub order_item: Option<OrderItemId>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrips() {
        for s in [
            WithdrawalStatus::Pending,
            WithdrawalStatus::Approved,
            WithdrawalStatus::Rejected,
        ] {
            assert_eq!(WithdrawalStatus::from_id(s.id()), Some(s));
        }
        for s in [PayoutStatus::Pending, PayoutStatus::Success, PayoutStatus::Failed] {
            assert_eq!(PayoutStatus::from_id(s.id()), Some(s));
        }
        for m in [PayoutMethod::MobileMoney, PayoutMethod::BankTransfer] {
            assert_eq!(PayoutMethod::from_id(m.id()), Some(m));
        }
        assert!(WithdrawalStatus::from_id(5).is_none());
    }
}
