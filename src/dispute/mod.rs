//! Disputes and refund reversal

mod error;
mod handler;
mod types;

pub use error::DisputeError;
pub use handler::DisputeHandler;
pub use types::{Dispute, DisputeOutcome, DisputeStatus};
