//! BNPL credit service
//!
//! A per-user usage/limit pair backed by its own append-only transaction log.
//! Invariant after every operation: `0 <= current_usage <= max_limit`.
//! Mutations for one user are serialized by a keyed lock, same discipline as
//! wallet balances.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::core_types::{OrderId, UserId};
use crate::ids::EntryId;
use crate::locks::KeyedLocks;
use crate::money::check_positive;
use crate::store::{MarketplaceStore, StoreError};

use super::error::CreditError;
use super::types::{CreditEntry, CreditEntryKind, CreditLimit};

pub struct CreditService {
    store: Arc<dyn MarketplaceStore>,
    locks: KeyedLocks,
    default_limit: Decimal,
    currency: String,
    minor_units: u32,
}

impl CreditService {
    pub fn new(store: Arc<dyn MarketplaceStore>, config: &AppConfig) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            default_limit: config.credit.default_limit,
            currency: config.currency.code.clone(),
            minor_units: config.currency.minor_units,
        }
    }

    /// Create the user's credit facility with the default limit. Idempotent:
    /// an existing facility is returned unchanged.
    pub async fn apply_for_credit(&self, user: UserId) -> Result<CreditLimit, CreditError> {
        let _guard = self.locks.acquire(user).await;
        if let Some(existing) = self.store.credit_limit(user).await? {
            return Ok(existing);
        }
        let now = Utc::now();
        let limit = CreditLimit {
            user_id: user,
            max_limit: self.default_limit,
            current_usage: Decimal::ZERO,
            currency: self.currency.clone(),
            eligible: true,
            active: true,
            created_at: now,
            updated_at: now,
        };
        match self.store.insert_credit_limit(&limit).await {
            Ok(()) => {
                info!(user, limit = %limit.max_limit, "credit facility opened");
                Ok(limit)
            }
            // lost a race with another application; return the winner's row
            Err(StoreError::Duplicate(_)) => Ok(self
                .store
                .credit_limit(user)
                .await?
                .ok_or(CreditError::NoFacility(user))?),
            Err(e) => Err(e.into()),
        }
    }

    /// Spend against the revolving limit
    pub async fn use_credit(
        &self,
        user: UserId,
        amount: Decimal,
        order: OrderId,
    ) -> Result<CreditLimit, CreditError> {
        let amount = check_positive(amount, self.minor_units)?;
        let _guard = self.locks.acquire(user).await;

        let limit = self.facility(user).await?;
        if !limit.eligible || !limit.active {
            return Err(CreditError::NotEligible(user));
        }
        let available = limit.available();
        if amount > available {
            return Err(CreditError::InsufficientCredit {
                requested: amount,
                available,
            });
        }

        let new_usage = limit.current_usage + amount;
        let entry = self.entry(
            user,
            CreditEntryKind::Usage,
            amount,
            Some(order),
            format!("credit purchase on order {order}"),
        );
        self.store.update_credit_usage(user, new_usage, &entry).await?;
        debug!(user, amount = %amount, usage = %new_usage, "credit used");
        Ok(CreditLimit {
            current_usage: new_usage,
            ..limit
        })
    }

    /// Pay down used credit. Overpayment is capped: usage floors at zero
    /// rather than going negative, and the capped figure is what the entry
    /// records.
    pub async fn repay_credit(
        &self,
        user: UserId,
        amount: Decimal,
    ) -> Result<CreditLimit, CreditError> {
        let amount = check_positive(amount, self.minor_units)?;
        let _guard = self.locks.acquire(user).await;

        let limit = self.facility(user).await?;
        let applied = amount.min(limit.current_usage);
        let new_usage = limit.current_usage - applied;

        let entry = self.entry(
            user,
            CreditEntryKind::Repayment,
            applied,
            None,
            if applied < amount {
                format!("repayment (capped from {amount})")
            } else {
                "repayment".to_string()
            },
        );
        self.store.update_credit_usage(user, new_usage, &entry).await?;
        debug!(user, repaid = %applied, usage = %new_usage, "credit repaid");
        Ok(CreditLimit {
            current_usage: new_usage,
            ..limit
        })
    }

    /// Signed administrative correction of usage, clamped into
    /// `[0, max_limit]`; requires a reason.
    pub async fn adjust_usage(
        &self,
        user: UserId,
        amount: Decimal,
        reason: &str,
    ) -> Result<CreditLimit, CreditError> {
        if reason.trim().is_empty() {
            return Err(CreditError::MissingReason);
        }
        let _guard = self.locks.acquire(user).await;

        let limit = self.facility(user).await?;
        let new_usage = (limit.current_usage + amount)
            .clamp(Decimal::ZERO, limit.max_limit);

        let entry = self.entry(user, CreditEntryKind::Adjustment, amount, None, reason.to_string());
        self.store.update_credit_usage(user, new_usage, &entry).await?;
        info!(user, amount = %amount, usage = %new_usage, reason, "credit usage adjusted");
        Ok(CreditLimit {
            current_usage: new_usage,
            ..limit
        })
    }

    pub async fn facility(&self, user: UserId) -> Result<CreditLimit, CreditError> {
        self.store
            .credit_limit(user)
            .await?
            .ok_or(CreditError::NoFacility(user))
    }

    /// Recent-first credit log
    pub async fn history(&self, user: UserId, limit: i64) -> Result<Vec<CreditEntry>, CreditError> {
        Ok(self.store.credit_entries(user, limit).await?)
    }

    fn entry(
        &self,
        user: UserId,
        kind: CreditEntryKind,
        amount: Decimal,
        order: Option<OrderId>,
        description: String,
    ) -> CreditEntry {
        CreditEntry {
            id: EntryId::new(),
            user_id: user,
            kind,
            amount,
            order_ref: order,
            description,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn service() -> (Arc<MemoryStore>, CreditService) {
        let store = Arc::new(MemoryStore::new());
        let mut config = AppConfig::default();
        config.credit.default_limit = dec("500.00");
        let service = CreditService::new(store.clone(), &config);
        (store, service)
    }

    fn assert_invariant(limit: &CreditLimit) {
        assert!(limit.current_usage >= Decimal::ZERO);
        assert!(limit.current_usage <= limit.max_limit);
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let (_, svc) = service();
        let first = svc.apply_for_credit(42).await.unwrap();
        assert_eq!(first.max_limit, dec("500.00"));
        assert_eq!(first.current_usage, Decimal::ZERO);

        let second = svc.apply_for_credit(42).await.unwrap();
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_use_credit_boundary() {
        let (_, svc) = service();
        svc.apply_for_credit(1).await.unwrap();

        svc.use_credit(1, dec("400.00"), 9001).await.unwrap();

        // exactly the remaining headroom succeeds
        let limit = svc.use_credit(1, dec("100.00"), 9002).await.unwrap();
        assert_eq!(limit.current_usage, dec("500.00"));
        assert_invariant(&limit);

        // one cent past the limit fails
        let err = svc.use_credit(1, dec("0.01"), 9003).await;
        assert!(matches!(err, Err(CreditError::InsufficientCredit { .. })));
    }

    #[tokio::test]
    async fn test_use_credit_requires_eligibility() {
        let (store, svc) = service();
        svc.apply_for_credit(1).await.unwrap();
        store.set_credit_standing(1, false, true).await.unwrap();

        let err = svc.use_credit(1, dec("10.00"), 9001).await;
        assert!(matches!(err, Err(CreditError::NotEligible(1))));
    }

    #[tokio::test]
    async fn test_use_credit_without_facility() {
        let (_, svc) = service();
        let err = svc.use_credit(77, dec("10.00"), 9001).await;
        assert!(matches!(err, Err(CreditError::NoFacility(77))));
    }

    #[tokio::test]
    async fn test_repay_floors_at_zero() {
        let (_, svc) = service();
        svc.apply_for_credit(1).await.unwrap();
        svc.use_credit(1, dec("120.00"), 9001).await.unwrap();

        // overpayment is capped, not rejected
        let limit = svc.repay_credit(1, dec("200.00")).await.unwrap();
        assert_eq!(limit.current_usage, Decimal::ZERO);
        assert_invariant(&limit);

        // the log records the capped figure
        let entries = svc.history(1, 10).await.unwrap();
        assert_eq!(entries[0].kind, CreditEntryKind::Repayment);
        assert_eq!(entries[0].amount, dec("120.00"));
    }

    #[tokio::test]
    async fn test_adjust_usage_clamps_and_needs_reason() {
        let (_, svc) = service();
        svc.apply_for_credit(1).await.unwrap();

        let err = svc.adjust_usage(1, dec("10.00"), "").await;
        assert!(matches!(err, Err(CreditError::MissingReason)));

        let limit = svc
            .adjust_usage(1, dec("9999.00"), "migration backfill")
            .await
            .unwrap();
        assert_eq!(limit.current_usage, limit.max_limit);
        assert_invariant(&limit);

        let limit = svc
            .adjust_usage(1, dec("-9999.00"), "write-off")
            .await
            .unwrap();
        assert_eq!(limit.current_usage, Decimal::ZERO);
        assert_invariant(&limit);
    }

    #[tokio::test]
    async fn test_invariant_under_random_sequences() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let (_, svc) = service();
        svc.apply_for_credit(1).await.unwrap();
        let mut rng = StdRng::seed_from_u64(0xC4ED17);

        for i in 0..200u64 {
            let amount = Decimal::new(rng.gen_range(1..30_000), 2);
            let limit = if rng.gen_bool(0.5) {
                match svc.use_credit(1, amount, 10_000 + i).await {
                    Ok(limit) => limit,
                    Err(CreditError::InsufficientCredit { .. }) => svc.facility(1).await.unwrap(),
                    Err(e) => panic!("unexpected error: {e}"),
                }
            } else {
                svc.repay_credit(1, amount).await.unwrap()
            };
            assert_invariant(&limit);
        }
    }
}
