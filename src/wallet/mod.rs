//! Vendor wallets: append-only ledger plus a cached balance projection

mod error;
mod service;
mod types;

pub use error::WalletError;
pub use service::{Applied, WalletService};
pub use types::{EntryKind, EntryMeta, LedgerEntry, Wallet, WalletStatus};
