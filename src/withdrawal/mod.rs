//! Withdrawal requests, payout execution and the payout audit log

mod error;
mod provider;
mod types;
mod workflow;

pub use error::WithdrawalError;
pub use provider::{MockMomoProvider, PayoutProvider, ProviderError};
pub use types::{PayoutLog, PayoutMethod, PayoutStatus, Withdrawal, WithdrawalStatus};
pub use workflow::WithdrawalWorkflow;
