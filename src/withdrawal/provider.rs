//! Payment-provider adapters
//!
//! The core treats money-movement providers as black boxes behind the
//! `PayoutProvider` trait: validate a destination, execute a transfer, get a
//! provider reference or a failure back. Real mobile-money/bank adapters live
//! outside this crate; the mocks here back tests and local development.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider rejected the transfer: {0}")]
    Rejected(String),
    #[error("Provider network error: {0}")]
    Network(String),
    #[error("Invalid destination")]
    InvalidDestination,
}

#[async_trait]
pub trait PayoutProvider: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Validate a destination format (phone number, account number)
    fn validate_destination(&self, destination: &str) -> bool;

    /// Execute a transfer; returns the provider-side transaction reference
    async fn execute(
        &self,
        amount: Decimal,
        currency: &str,
        destination: &str,
    ) -> Result<String, ProviderError>;
}

/// Mock mobile-money provider.
///
/// Destinations are MSISDNs in international format. `fail_next` flips the
/// next execution into a rejection, which is how tests exercise the
/// compensation path.
#[derive(Debug, Default)]
pub struct MockMomoProvider {
    fail_next: AtomicBool,
}

impl MockMomoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PayoutProvider for MockMomoProvider {
    fn name(&self) -> &'static str {
        "mock-momo"
    }

    fn validate_destination(&self, destination: &str) -> bool {
        let rest = match destination.strip_prefix('+') {
            Some(rest) => rest,
            None => return false,
        };
        (9..=14).contains(&rest.len()) && rest.bytes().all(|b| b.is_ascii_digit())
    }

    async fn execute(
        &self,
        amount: Decimal,
        _currency: &str,
        destination: &str,
    ) -> Result<String, ProviderError> {
        if !self.validate_destination(destination) {
            return Err(ProviderError::InvalidDestination);
        }
        if amount <= Decimal::ZERO {
            return Err(ProviderError::Rejected("non-positive amount".to_string()));
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Rejected(
                "insufficient float at provider".to_string(),
            ));
        }
        Ok(format!("momo-{:x}", uuid::Uuid::new_v4().simple()))
    }
}
