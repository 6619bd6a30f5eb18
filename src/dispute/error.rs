use thiserror::Error;

use crate::core_types::OrderId;
use crate::ids::DisputeId;
use crate::store::StoreError;
use crate::wallet::WalletError;

#[derive(Debug, Error)]
pub enum DisputeError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Dispute not found: {0}")]
    NotFound(DisputeId),

    #[error("Order {0} already has a dispute")]
    AlreadyOpen(OrderId),

    #[error("Dispute {0} is already resolved")]
    AlreadyResolved(DisputeId),
}
