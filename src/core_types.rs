//! Core types used throughout the system
//!
//! Fundamental id aliases shared by all modules. They carry semantic meaning
//! and leave room for future type evolution.

/// User ID - globally unique, immutable after assignment.
///
/// Buyers, vendors and admins all live in one id space; the marketplace user
/// table is owned by the excluded CRUD layer.
pub type UserId = u64;

/// Vendor ID - a `UserId` that owns a shop. Alias kept separate so signatures
/// say what they mean.
pub type VendorId = u64;

/// Order ID - unique within the system
pub type OrderId = u64;

/// Order item ID - unique within the system.
///
/// Doubles as the settlement idempotency key: at most one EARNING ledger
/// entry may ever reference a given order item.
pub type OrderItemId = u64;

/// Wallet ID - one wallet per vendor, assigned by the store.
pub type WalletId = u64;
