//! Buy-now-pay-later credit facility

mod error;
mod service;
mod types;

pub use error::CreditError;
pub use service::CreditService;
pub use types::{CreditEntry, CreditEntryKind, CreditLimit};
