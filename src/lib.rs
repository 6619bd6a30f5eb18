//! sokoni - Marketplace Ledger & Settlement Engine
//!
//! The money-moving core of a multi-vendor marketplace: append-only wallet
//! ledgers, per-sale fee computation, batched settlement of fulfilled orders,
//! vendor payouts, BNPL credit and dispute reversal, all funneling through
//! one serialized mutation path per wallet.
//!
//! # Modules
//!
//! - [`core_types`] - Core id aliases (UserId, VendorId, OrderItemId, ...)
//! - [`ids`] - ULID-based entry/withdrawal/dispute ids
//! - [`money`] - Decimal rounding and validation
//! - [`fees`] - Pure platform/gateway fee calculator
//! - [`orders`] - Order item and vendor profile read models
//! - [`wallet`] - Wallet service: the single balance mutation path
//! - [`settlement`] - Periodic batch settlement engine
//! - [`withdrawal`] - Withdrawal workflow and payout providers
//! - [`credit`] - BNPL credit facility
//! - [`dispute`] - Dispute handling and refund reversal
//! - [`store`] - Storage seam: PostgreSQL and in-memory implementations
//! - [`locks`] - Keyed per-wallet lock arena
//! - [`config`] - YAML application configuration
//! - [`logging`] - Tracing/rolling-file log setup

pub mod config;
pub mod core_types;
pub mod credit;
pub mod dispute;
pub mod fees;
pub mod ids;
pub mod locks;
pub mod logging;
pub mod money;
pub mod orders;
pub mod settlement;
pub mod store;
pub mod wallet;
pub mod withdrawal;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use core_types::{OrderId, OrderItemId, UserId, VendorId, WalletId};
pub use credit::{CreditError, CreditService};
pub use dispute::{DisputeError, DisputeHandler, DisputeOutcome};
pub use fees::{BusinessModel, FeeBreakdown, GatewayFeeSchedule, compute_fees};
pub use orders::{FulfillmentStatus, OrderItem, VendorProfile};
pub use settlement::{SettlementEngine, SettlementReport};
pub use store::{MarketplaceStore, MemoryStore, PostgresStore, StoreError};
pub use wallet::{Applied, EntryKind, EntryMeta, WalletError, WalletService};
pub use withdrawal::{
    MockMomoProvider, PayoutMethod, PayoutProvider, WithdrawalError, WithdrawalWorkflow,
};
