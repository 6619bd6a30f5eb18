use rust_decimal::Decimal;
use thiserror::Error;

use crate::ids::WithdrawalId;
use crate::store::StoreError;
use crate::wallet::WalletError;

use super::provider::ProviderError;
use super::types::WithdrawalStatus;

#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Withdrawal not found: {0}")]
    NotFound(WithdrawalId),

    #[error("Amount {amount} is below the minimum withdrawal of {minimum}")]
    BelowMinimum { amount: Decimal, minimum: Decimal },

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid destination for the selected payout method")]
    InvalidDestination,

    #[error("Withdrawal {id} is {status}, expected {expected}")]
    InvalidState {
        id: WithdrawalId,
        status: WithdrawalStatus,
        expected: WithdrawalStatus,
    },

    #[error("Withdrawal {0} already has a payout attempt")]
    AlreadyExecuted(WithdrawalId),

    #[error("Payout provider failure: {0}")]
    Provider(#[from] ProviderError),
}
