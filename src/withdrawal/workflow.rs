//! Withdrawal / payout workflow
//!
//! State machine: PENDING --approve--> APPROVED --execute--> payout log
//! SUCCESS|FAILED, or PENDING --reject--> REJECTED. Approval re-checks the
//! balance and debits atomically; execution is optimistic debit first, with a
//! compensating REFUND entry restoring the wallet when the provider fails.
//! A debited wallet is never left with a failed payout and no compensation.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::core_types::{UserId, VendorId};
use crate::ids::WithdrawalId;
use crate::locks::KeyedLocks;
use crate::store::MarketplaceStore;
use crate::wallet::{EntryKind, EntryMeta, WalletError, WalletService};

use super::error::WithdrawalError;
use super::provider::PayoutProvider;
use super::types::{PayoutLog, PayoutMethod, PayoutStatus, Withdrawal, WithdrawalStatus};

pub struct WithdrawalWorkflow {
    store: Arc<dyn MarketplaceStore>,
    wallets: Arc<WalletService>,
    provider: Arc<dyn PayoutProvider>,
    /// Serializes execute() per wallet so one withdrawal gets one attempt
    execution_locks: KeyedLocks,
    min_amount: Decimal,
    currency: String,
}

impl WithdrawalWorkflow {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        wallets: Arc<WalletService>,
        provider: Arc<dyn PayoutProvider>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            wallets,
            provider,
            execution_locks: KeyedLocks::new(),
            min_amount: config.withdrawal.min_amount,
            currency: config.currency.code.clone(),
        }
    }

    /// Vendor files a payout request. The balance check here is soft; the
    /// authoritative check happens at approval time under the wallet lock.
    pub async fn request(
        &self,
        vendor: VendorId,
        amount: Decimal,
        method: PayoutMethod,
        destination: &str,
    ) -> Result<Withdrawal, WithdrawalError> {
        if amount < self.min_amount {
            return Err(WithdrawalError::BelowMinimum {
                amount,
                minimum: self.min_amount,
            });
        }
        if !self.provider.validate_destination(destination) {
            return Err(WithdrawalError::InvalidDestination);
        }

        let wallet = self.wallets.open_wallet(vendor).await?;
        if amount > wallet.balance {
            return Err(WithdrawalError::InsufficientBalance {
                requested: amount,
                available: wallet.balance,
            });
        }

        let now = Utc::now();
        let withdrawal = Withdrawal {
            id: WithdrawalId::new(),
            vendor_id: vendor,
            wallet_id: wallet.id,
            amount,
            method,
            destination: destination.to_string(),
            status: WithdrawalStatus::Pending,
            approved_by: None,
            reject_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_withdrawal(&withdrawal).await?;
        info!(
            withdrawal = %withdrawal.id,
            vendor,
            amount = %amount,
            "withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// Approve a pending request: claim it, re-check the balance under the
    /// wallet lock, and debit. An approval-time shortfall reverts the claim
    /// and leaves the request PENDING, un-debited, for retry after the
    /// balance changes.
    pub async fn approve(
        &self,
        id: WithdrawalId,
        approver: UserId,
    ) -> Result<Withdrawal, WithdrawalError> {
        let withdrawal = self.load(id).await?;

        let claimed = self
            .store
            .update_withdrawal_if(
                id,
                WithdrawalStatus::Pending,
                WithdrawalStatus::Approved,
                Some(approver),
                None,
            )
            .await?;
        if !claimed {
            let current = self.load(id).await?;
            return Err(WithdrawalError::InvalidState {
                id,
                status: current.status,
                expected: WithdrawalStatus::Pending,
            });
        }

        let meta = EntryMeta::describe(format!("payout for withdrawal {id}"));
        match self
            .wallets
            .debit(withdrawal.wallet_id, EntryKind::Payout, withdrawal.amount, meta)
            .await
        {
            Ok(_) => {
                info!(withdrawal = %id, approver, "withdrawal approved and debited");
                self.load(id).await
            }
            Err(e) => {
                // undo the claim; the request stays PENDING for a later retry
                self.store
                    .update_withdrawal_if(
                        id,
                        WithdrawalStatus::Approved,
                        WithdrawalStatus::Pending,
                        None,
                        None,
                    )
                    .await?;
                match e {
                    WalletError::InsufficientBalance {
                        requested,
                        available,
                    } => {
                        warn!(
                            withdrawal = %id,
                            requested = %requested,
                            available = %available,
                            "approval failed: balance shrank since request"
                        );
                        Err(WithdrawalError::InsufficientBalance {
                            requested,
                            available,
                        })
                    }
                    other => Err(other.into()),
                }
            }
        }
    }

    /// Reject a pending request. No ledger effect: nothing was debited yet.
    pub async fn reject(&self, id: WithdrawalId, reason: &str) -> Result<Withdrawal, WithdrawalError> {
        let rejected = self
            .store
            .update_withdrawal_if(
                id,
                WithdrawalStatus::Pending,
                WithdrawalStatus::Rejected,
                None,
                Some(reason),
            )
            .await?;
        if !rejected {
            let current = self.load(id).await?;
            return Err(WithdrawalError::InvalidState {
                id,
                status: current.status,
                expected: WithdrawalStatus::Pending,
            });
        }
        info!(withdrawal = %id, reason, "withdrawal rejected");
        self.load(id).await
    }

    /// Execute an approved withdrawal at the provider. Exactly one attempt
    /// per withdrawal: a FAILED attempt is compensated (REFUND restores the
    /// debit) and closed; the vendor files a fresh request to retry.
    pub async fn execute(&self, id: WithdrawalId) -> Result<PayoutLog, WithdrawalError> {
        let withdrawal = self.load(id).await?;
        if withdrawal.status != WithdrawalStatus::Approved {
            return Err(WithdrawalError::InvalidState {
                id,
                status: withdrawal.status,
                expected: WithdrawalStatus::Approved,
            });
        }

        let _guard = self.execution_locks.acquire(withdrawal.wallet_id).await;
        if !self.store.payout_logs_for(id).await?.is_empty() {
            return Err(WithdrawalError::AlreadyExecuted(id));
        }

        match self
            .provider
            .execute(withdrawal.amount, &self.currency, &withdrawal.destination)
            .await
        {
            Ok(provider_ref) => {
                let log = self.payout_log(&withdrawal, PayoutStatus::Success, Some(provider_ref), None);
                self.store.insert_payout_log(&log).await?;
                info!(
                    withdrawal = %id,
                    provider_ref = log.provider_ref.as_deref().unwrap_or_default(),
                    amount = %withdrawal.amount,
                    "payout executed"
                );
                Ok(log)
            }
            Err(provider_err) => {
                warn!(
                    withdrawal = %id,
                    error = %provider_err,
                    "payout failed at provider, compensating wallet"
                );
                let meta = EntryMeta::describe(format!(
                    "compensation for failed payout of withdrawal {id}"
                ));
                if let Err(wallet_err) = self
                    .wallets
                    .credit(withdrawal.wallet_id, EntryKind::Refund, withdrawal.amount, meta)
                    .await
                {
                    // compensation itself failed: funds are stuck debited
                    error!(
                        withdrawal = %id,
                        error = %wallet_err,
                        "compensation failed; wallet left debited, manual intervention required"
                    );
                    return Err(wallet_err.into());
                }

                let log = self.payout_log(
                    &withdrawal,
                    PayoutStatus::Failed,
                    None,
                    Some(provider_err.to_string()),
                );
                self.store.insert_payout_log(&log).await?;
                Err(provider_err.into())
            }
        }
    }

    async fn load(&self, id: WithdrawalId) -> Result<Withdrawal, WithdrawalError> {
        self.store
            .withdrawal(id)
            .await?
            .ok_or(WithdrawalError::NotFound(id))
    }

    fn payout_log(
        &self,
        withdrawal: &Withdrawal,
        status: PayoutStatus,
        provider_ref: Option<String>,
        failure_reason: Option<String>,
    ) -> PayoutLog {
        PayoutLog {
            id: Uuid::new_v4(),
            withdrawal_id: withdrawal.id,
            vendor_id: withdrawal.vendor_id,
            provider: self.provider.name().to_string(),
            amount: withdrawal.amount,
            currency: self.currency.clone(),
            destination: withdrawal.destination.clone(),
            status,
            provider_ref,
            failure_reason,
            order_item: None,
            created_at: Utc::now(),
        }
    }
}
