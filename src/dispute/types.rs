//! Dispute types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{OrderId, UserId};
use crate::ids::DisputeId;

/// Dispute lifecycle: OPEN is the only state that allows a transition; both
/// resolutions are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    Open = 0,
    Resolved = 10,
    Refunded = 20,
}

impl DisputeStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(DisputeStatus::Open),
            10 => Some(DisputeStatus::Resolved),
            20 => Some(DisputeStatus::Refunded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "OPEN",
            DisputeStatus::Resolved => "RESOLVED",
            DisputeStatus::Refunded => "REFUNDED",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DisputeStatus::Open)
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolution outcome requested by an admin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeOutcome {
    /// Closed with no monetary effect
    Resolved,
    /// Buyer refunded; vendor earnings reversed
    Refunded,
}

impl DisputeOutcome {
    pub fn final_status(&self) -> DisputeStatus {
        match self {
            DisputeOutcome::Resolved => DisputeStatus::Resolved,
            DisputeOutcome::Refunded => DisputeStatus::Refunded,
        }
    }
}

/// One dispute per order (unique)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub order_id: OrderId,
    pub reason: String,
    pub status: DisputeStatus,
    pub resolution_notes: Option<String>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
