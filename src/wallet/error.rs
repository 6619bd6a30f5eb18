use rust_decimal::Decimal;
use thiserror::Error;

use crate::core_types::WalletId;
use crate::money::MoneyError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Wallet not found: {0}")]
    NotFound(WalletId),

    #[error("Wallet {0} is frozen pending manual reconciliation")]
    Frozen(WalletId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Adjustment requires a reason")]
    MissingReason,

    #[error(
        "Ledger integrity violation on wallet {wallet_id}: cached {cached}, recomputed {computed}"
    )]
    IntegrityViolation {
        wallet_id: WalletId,
        cached: Decimal,
        computed: Decimal,
    },
}
