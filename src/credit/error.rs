use rust_decimal::Decimal;
use thiserror::Error;

use crate::core_types::UserId;
use crate::money::MoneyError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CreditError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("User {0} is not eligible for credit")]
    NotEligible(UserId),

    #[error("No credit facility for user {0}")]
    NoFacility(UserId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    #[error("Insufficient credit: requested {requested}, available {available}")]
    InsufficientCredit {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Adjustment requires a reason")]
    MissingReason,
}
