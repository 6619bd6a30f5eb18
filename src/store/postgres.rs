//! PostgreSQL store
//!
//! Runtime-bound sqlx queries against the schema in [`super::schema`]. The
//! keyed locks above the store already serialize writers per wallet within
//! one process; the row lock taken in `append_entry` extends that guarantee
//! to multi-process deployments, and every status transition is a CAS
//! (`UPDATE ... WHERE status = expected`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::core_types::{OrderId, OrderItemId, UserId, VendorId, WalletId};
use crate::credit::{CreditEntry, CreditEntryKind, CreditLimit};
use crate::dispute::{Dispute, DisputeStatus};
use crate::fees::BusinessModel;
use crate::ids::{DisputeId, EntryId, WithdrawalId};
use crate::orders::{FulfillmentStatus, OrderItem, VendorProfile};
use crate::settlement::SettlementReport;
use crate::wallet::{EntryKind, LedgerEntry, Wallet, WalletStatus};
use crate::withdrawal::{PayoutLog, PayoutMethod, PayoutStatus, Withdrawal, WithdrawalStatus};

use super::{MarketplaceStore, StoreError};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        super::schema::init_schema(&pool).await?;
        tracing::info!("PostgreSQL store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {detail}"))
}

fn row_to_wallet(row: &PgRow) -> Result<Wallet, StoreError> {
    let status_id: i16 = row.get("status");
    Ok(Wallet {
        id: row.get::<i64, _>("id") as WalletId,
        owner: row.get::<i64, _>("owner_id") as VendorId,
        balance: row.get("balance"),
        currency: row.get("currency"),
        status: WalletStatus::from_id(status_id)
            .ok_or_else(|| corrupt("wallet status", status_id))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_entry(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let id_str: String = row.get("entry_id");
    let kind_id: i16 = row.get("kind");
    Ok(LedgerEntry {
        id: id_str
            .parse::<EntryId>()
            .map_err(|e| corrupt("entry id", e))?,
        wallet_id: row.get::<i64, _>("wallet_id") as WalletId,
        kind: EntryKind::from_id(kind_id).ok_or_else(|| corrupt("entry kind", kind_id))?,
        amount: row.get("amount"),
        order_item: row
            .get::<Option<i64>, _>("order_item_id")
            .map(|v| v as OrderItemId),
        fx_rate: row.get("fx_rate"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem, StoreError> {
    let status_id: i16 = row.get("status");
    Ok(OrderItem {
        id: row.get::<i64, _>("id") as OrderItemId,
        order_id: row.get::<i64, _>("order_id") as OrderId,
        vendor_id: row.get::<i64, _>("vendor_id") as VendorId,
        unit_price: row.get("unit_price"),
        quantity: row.get::<i32, _>("quantity") as u32,
        status: FulfillmentStatus::from_id(status_id)
            .ok_or_else(|| corrupt("item status", status_id))?,
        platform_fee: row.get("platform_fee"),
        gateway_fee: row.get("gateway_fee"),
        fees_priced: row.get("fees_priced"),
        delivered_at: row.get("delivered_at"),
    })
}

fn row_to_withdrawal(row: &PgRow) -> Result<Withdrawal, StoreError> {
    let id_str: String = row.get("withdrawal_id");
    let status_id: i16 = row.get("status");
    let method_id: i16 = row.get("method");
    Ok(Withdrawal {
        id: id_str
            .parse::<WithdrawalId>()
            .map_err(|e| corrupt("withdrawal id", e))?,
        vendor_id: row.get::<i64, _>("vendor_id") as VendorId,
        wallet_id: row.get::<i64, _>("wallet_id") as WalletId,
        amount: row.get("amount"),
        method: PayoutMethod::from_id(method_id)
            .ok_or_else(|| corrupt("payout method", method_id))?,
        destination: row.get("destination"),
        status: WithdrawalStatus::from_id(status_id)
            .ok_or_else(|| corrupt("withdrawal status", status_id))?,
        approved_by: row.get::<Option<i64>, _>("approved_by").map(|v| v as UserId),
        reject_reason: row.get("reject_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_payout(row: &PgRow) -> Result<PayoutLog, StoreError> {
    let withdrawal_str: String = row.get("withdrawal_id");
    let status_id: i16 = row.get("status");
    Ok(PayoutLog {
        id: row.get("id"),
        withdrawal_id: withdrawal_str
            .parse::<WithdrawalId>()
            .map_err(|e| corrupt("withdrawal id", e))?,
        vendor_id: row.get::<i64, _>("vendor_id") as VendorId,
        provider: row.get("provider"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        destination: row.get("destination"),
        status: PayoutStatus::from_id(status_id)
            .ok_or_else(|| corrupt("payout status", status_id))?,
        provider_ref: row.get("provider_ref"),
        failure_reason: row.get("failure_reason"),
        order_item: row
            .get::<Option<i64>, _>("order_item_id")
            .map(|v| v as OrderItemId),
        created_at: row.get("created_at"),
    })
}

fn row_to_limit(row: &PgRow) -> Result<CreditLimit, StoreError> {
    Ok(CreditLimit {
        user_id: row.get::<i64, _>("user_id") as UserId,
        max_limit: row.get("max_limit"),
        current_usage: row.get("current_usage"),
        currency: row.get("currency"),
        eligible: row.get("eligible"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_credit_entry(row: &PgRow) -> Result<CreditEntry, StoreError> {
    let id_str: String = row.get("entry_id");
    let kind_id: i16 = row.get("kind");
    Ok(CreditEntry {
        id: id_str
            .parse::<EntryId>()
            .map_err(|e| corrupt("entry id", e))?,
        user_id: row.get::<i64, _>("user_id") as UserId,
        kind: CreditEntryKind::from_id(kind_id)
            .ok_or_else(|| corrupt("credit entry kind", kind_id))?,
        amount: row.get("amount"),
        order_ref: row.get::<Option<i64>, _>("order_ref").map(|v| v as OrderId),
        description: row.get("description"),
        created_at: row.get("created_at"),
    })
}

fn row_to_dispute(row: &PgRow) -> Result<Dispute, StoreError> {
    let id_str: String = row.get("dispute_id");
    let status_id: i16 = row.get("status");
    Ok(Dispute {
        id: id_str
            .parse::<DisputeId>()
            .map_err(|e| corrupt("dispute id", e))?,
        order_id: row.get::<i64, _>("order_id") as OrderId,
        reason: row.get("reason"),
        status: DisputeStatus::from_id(status_id)
            .ok_or_else(|| corrupt("dispute status", status_id))?,
        resolution_notes: row.get("resolution_notes"),
        resolved_by: row.get::<Option<i64>, _>("resolved_by").map(|v| v as UserId),
        resolved_at: row.get("resolved_at"),
        created_at: row.get("created_at"),
    })
}

fn model_columns(model: BusinessModel) -> (i16, Option<Decimal>) {
    match model {
        BusinessModel::Commission { rate } => (1, Some(rate)),
        BusinessModel::Subscription => (2, None),
    }
}

fn row_to_profile(row: &PgRow) -> Result<VendorProfile, StoreError> {
    let model_id: i16 = row.get("business_model");
    let rate: Option<Decimal> = row.get("commission_rate");
    let business_model = match model_id {
        1 => BusinessModel::Commission {
            rate: rate.ok_or_else(|| corrupt("commission rate", "missing"))?,
        },
        2 => BusinessModel::Subscription,
        other => return Err(corrupt("business model", other)),
    };
    Ok(VendorProfile {
        vendor_id: row.get::<i64, _>("vendor_id") as VendorId,
        business_model,
    })
}

const WALLET_COLS: &str = "id, owner_id, balance, currency, status, created_at, updated_at";
const ENTRY_COLS: &str =
    "entry_id, wallet_id, kind, amount, order_item_id, fx_rate, description, created_at";
const ITEM_COLS: &str = "id, order_id, vendor_id, unit_price, quantity, status, platform_fee, \
                         gateway_fee, fees_priced, delivered_at";
const WITHDRAWAL_COLS: &str = "withdrawal_id, vendor_id, wallet_id, amount, method, destination, \
                               status, approved_by, reject_reason, created_at, updated_at";
const PAYOUT_COLS: &str = "id, withdrawal_id, vendor_id, provider, amount, currency, destination, \
                           status, provider_ref, failure_reason, order_item_id, created_at";
const LIMIT_COLS: &str =
    "user_id, max_limit, current_usage, currency, eligible, active, created_at, updated_at";
const CREDIT_ENTRY_COLS: &str =
    "entry_id, user_id, kind, amount, order_ref, description, created_at";
const DISPUTE_COLS: &str = "dispute_id, order_id, reason, status, resolution_notes, resolved_by, \
                            resolved_at, created_at";

#[async_trait]
impl MarketplaceStore for PostgresStore {
    async fn get_or_create_wallet(
        &self,
        owner: VendorId,
        currency: &str,
    ) -> Result<Wallet, StoreError> {
        sqlx::query(
            "INSERT INTO wallets_tb (owner_id, currency) VALUES ($1, $2) \
             ON CONFLICT (owner_id) DO NOTHING",
        )
        .bind(owner as i64)
        .bind(currency)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {WALLET_COLS} FROM wallets_tb WHERE owner_id = $1"
        ))
        .bind(owner as i64)
        .fetch_one(&self.pool)
        .await?;
        row_to_wallet(&row)
    }

    async fn wallet(&self, id: WalletId) -> Result<Option<Wallet>, StoreError> {
        let row = sqlx::query(&format!("SELECT {WALLET_COLS} FROM wallets_tb WHERE id = $1"))
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_wallet).transpose()
    }

    async fn wallet_by_owner(&self, owner: VendorId) -> Result<Option<Wallet>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {WALLET_COLS} FROM wallets_tb WHERE owner_id = $1"
        ))
        .bind(owner as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_wallet).transpose()
    }

    async fn set_wallet_status(
        &self,
        id: WalletId,
        status: WalletStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE wallets_tb SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.id())
            .bind(id as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_entry(
        &self,
        entry: &LedgerEntry,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock covers multi-process deployments the in-process keyed
        // lock cannot see.
        sqlx::query("SELECT id FROM wallets_tb WHERE id = $1 FOR UPDATE")
            .bind(entry.wallet_id as i64)
            .fetch_one(&mut *tx)
            .await?;

        let insert = sqlx::query(
            "INSERT INTO ledger_entries_tb \
                 (entry_id, wallet_id, kind, amount, order_item_id, fx_rate, description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id.to_string())
        .bind(entry.wallet_id as i64)
        .bind(entry.kind.id())
        .bind(entry.amount)
        .bind(entry.order_item.map(|v| v as i64))
        .bind(entry.fx_rate)
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            return if is_unique_violation(&e) {
                Err(StoreError::Duplicate("EARNING entry for order item"))
            } else {
                Err(e.into())
            };
        }

        sqlx::query("UPDATE wallets_tb SET balance = $1, updated_at = NOW() WHERE id = $2")
            .bind(new_balance)
            .bind(entry.wallet_id as i64)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn entries(
        &self,
        wallet_id: WalletId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLS} FROM ledger_entries_tb \
             WHERE wallet_id = $1 ORDER BY entry_id DESC LIMIT $2"
        ))
        .bind(wallet_id as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn entry_sum(&self, wallet_id: WalletId) -> Result<Decimal, StoreError> {
        let sum = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries_tb WHERE wallet_id = $1",
        )
        .bind(wallet_id as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }

    async fn earning_for_item(
        &self,
        item: OrderItemId,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLS} FROM ledger_entries_tb \
             WHERE order_item_id = $1 AND kind = $2"
        ))
        .bind(item as i64)
        .bind(EntryKind::Earning.id())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_entry).transpose()
    }

    async fn vendor_profile(
        &self,
        vendor: VendorId,
    ) -> Result<Option<VendorProfile>, StoreError> {
        let row = sqlx::query(
            "SELECT vendor_id, business_model, commission_rate \
             FROM vendor_profiles_tb WHERE vendor_id = $1",
        )
        .bind(vendor as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_profile).transpose()
    }

    async fn upsert_vendor_profile(&self, profile: &VendorProfile) -> Result<(), StoreError> {
        let (model_id, rate) = model_columns(profile.business_model);
        sqlx::query(
            "INSERT INTO vendor_profiles_tb (vendor_id, business_model, commission_rate) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (vendor_id) DO UPDATE \
                 SET business_model = EXCLUDED.business_model, \
                     commission_rate = EXCLUDED.commission_rate",
        )
        .bind(profile.vendor_id as i64)
        .bind(model_id)
        .bind(rate)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_order_item(&self, item: &OrderItem) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO order_items_tb \
                 (id, order_id, vendor_id, unit_price, quantity, status, platform_fee, \
                  gateway_fee, fees_priced, delivered_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(item.id as i64)
        .bind(item.order_id as i64)
        .bind(item.vendor_id as i64)
        .bind(item.unit_price)
        .bind(item.quantity as i32)
        .bind(item.status.id())
        .bind(item.platform_fee)
        .bind(item.gateway_fee)
        .bind(item.fees_priced)
        .bind(item.delivered_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate("order item")),
            Err(e) => Err(e.into()),
        }
    }

    async fn order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLS} FROM order_items_tb WHERE id = $1"))
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn items_for_order(&self, order: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLS} FROM order_items_tb WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn set_item_status(
        &self,
        id: OrderItemId,
        status: FulfillmentStatus,
    ) -> Result<(), StoreError> {
        let delivered = status == FulfillmentStatus::Delivered;
        sqlx::query(
            "UPDATE order_items_tb \
             SET status = $1, \
                 delivered_at = CASE WHEN $2 AND delivered_at IS NULL THEN NOW() \
                                     ELSE delivered_at END \
             WHERE id = $3",
        )
        .bind(status.id())
        .bind(delivered)
        .bind(id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_item_fees(
        &self,
        id: OrderItemId,
        platform_fee: Decimal,
        gateway_fee: Decimal,
    ) -> Result<(), StoreError> {
        // write-once: an already-priced item keeps its original figures
        sqlx::query(
            "UPDATE order_items_tb \
             SET platform_fee = $1, gateway_fee = $2, fees_priced = TRUE \
             WHERE id = $3 AND fees_priced = FALSE",
        )
        .bind(platform_fee)
        .bind(gateway_fee)
        .bind(id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delivered_items(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLS} FROM order_items_tb \
             WHERE status = $1 AND delivered_at >= $2 AND delivered_at < $3 \
             ORDER BY vendor_id, id"
        ))
        .bind(FulfillmentStatus::Delivered.id())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO withdrawals_tb \
                 (withdrawal_id, vendor_id, wallet_id, amount, method, destination, status, \
                  approved_by, reject_reason, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(withdrawal.id.to_string())
        .bind(withdrawal.vendor_id as i64)
        .bind(withdrawal.wallet_id as i64)
        .bind(withdrawal.amount)
        .bind(withdrawal.method.id())
        .bind(&withdrawal.destination)
        .bind(withdrawal.status.id())
        .bind(withdrawal.approved_by.map(|v| v as i64))
        .bind(&withdrawal.reject_reason)
        .bind(withdrawal.created_at)
        .bind(withdrawal.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate("withdrawal")),
            Err(e) => Err(e.into()),
        }
    }

    async fn withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {WITHDRAWAL_COLS} FROM withdrawals_tb WHERE withdrawal_id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_withdrawal).transpose()
    }

    async fn update_withdrawal_if(
        &self,
        id: WithdrawalId,
        expected: WithdrawalStatus,
        new: WithdrawalStatus,
        approved_by: Option<UserId>,
        reject_reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE withdrawals_tb \
             SET status = $1, \
                 approved_by = COALESCE($2, approved_by), \
                 reject_reason = COALESCE($3, reject_reason), \
                 updated_at = NOW() \
             WHERE withdrawal_id = $4 AND status = $5",
        )
        .bind(new.id())
        .bind(approved_by.map(|v| v as i64))
        .bind(reject_reason)
        .bind(id.to_string())
        .bind(expected.id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_payout_log(&self, log: &PayoutLog) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payout_logs_tb \
                 (id, withdrawal_id, vendor_id, provider, amount, currency, destination, \
                  status, provider_ref, failure_reason, order_item_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(log.id)
        .bind(log.withdrawal_id.to_string())
        .bind(log.vendor_id as i64)
        .bind(&log.provider)
        .bind(log.amount)
        .bind(&log.currency)
        .bind(&log.destination)
        .bind(log.status.id())
        .bind(&log.provider_ref)
        .bind(&log.failure_reason)
        .bind(log.order_item.map(|v| v as i64))
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn payout_logs_for(
        &self,
        withdrawal: WithdrawalId,
    ) -> Result<Vec<PayoutLog>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYOUT_COLS} FROM payout_logs_tb \
             WHERE withdrawal_id = $1 ORDER BY created_at"
        ))
        .bind(withdrawal.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_payout).collect()
    }

    async fn credit_limit(&self, user: UserId) -> Result<Option<CreditLimit>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {LIMIT_COLS} FROM credit_limits_tb WHERE user_id = $1"
        ))
        .bind(user as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_limit).transpose()
    }

    async fn insert_credit_limit(&self, limit: &CreditLimit) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO credit_limits_tb \
                 (user_id, max_limit, current_usage, currency, eligible, active, \
                  created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(limit.user_id as i64)
        .bind(limit.max_limit)
        .bind(limit.current_usage)
        .bind(&limit.currency)
        .bind(limit.eligible)
        .bind(limit.active)
        .bind(limit.created_at)
        .bind(limit.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate("credit limit")),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_credit_standing(
        &self,
        user: UserId,
        eligible: bool,
        active: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE credit_limits_tb \
             SET eligible = $1, active = $2, updated_at = NOW() WHERE user_id = $3",
        )
        .bind(eligible)
        .bind(active)
        .bind(user as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_credit_usage(
        &self,
        user: UserId,
        new_usage: Decimal,
        entry: &CreditEntry,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE credit_limits_tb \
             SET current_usage = $1, updated_at = NOW() WHERE user_id = $2",
        )
        .bind(new_usage)
        .bind(user as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO credit_entries_tb \
                 (entry_id, user_id, kind, amount, order_ref, description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.id.to_string())
        .bind(entry.user_id as i64)
        .bind(entry.kind.id())
        .bind(entry.amount)
        .bind(entry.order_ref.map(|v| v as i64))
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn credit_entries(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<CreditEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CREDIT_ENTRY_COLS} FROM credit_entries_tb \
             WHERE user_id = $1 ORDER BY entry_id DESC LIMIT $2"
        ))
        .bind(user as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_credit_entry).collect()
    }

    async fn insert_dispute(&self, dispute: &Dispute) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO disputes_tb \
                 (dispute_id, order_id, reason, status, resolution_notes, resolved_by, \
                  resolved_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(dispute.id.to_string())
        .bind(dispute.order_id as i64)
        .bind(&dispute.reason)
        .bind(dispute.status.id())
        .bind(&dispute.resolution_notes)
        .bind(dispute.resolved_by.map(|v| v as i64))
        .bind(dispute.resolved_at)
        .bind(dispute.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate("dispute for order")),
            Err(e) => Err(e.into()),
        }
    }

    async fn dispute(&self, id: DisputeId) -> Result<Option<Dispute>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {DISPUTE_COLS} FROM disputes_tb WHERE dispute_id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_dispute).transpose()
    }

    async fn dispute_for_order(&self, order: OrderId) -> Result<Option<Dispute>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {DISPUTE_COLS} FROM disputes_tb WHERE order_id = $1"
        ))
        .bind(order as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_dispute).transpose()
    }

    async fn resolve_dispute_if_open(
        &self,
        id: DisputeId,
        status: DisputeStatus,
        resolved_by: UserId,
        notes: Option<&str>,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE disputes_tb \
             SET status = $1, resolved_by = $2, resolution_notes = $3, resolved_at = $4 \
             WHERE dispute_id = $5 AND status = $6",
        )
        .bind(status.id())
        .bind(resolved_by as i64)
        .bind(notes)
        .bind(resolved_at)
        .bind(id.to_string())
        .bind(DisputeStatus::Open.id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_settlement_run(
        &self,
        report: &SettlementReport,
    ) -> Result<Uuid, StoreError> {
        let run_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO settlement_runs_tb \
                 (run_id, period_start, period_end, processed, credited, skipped, \
                  total_credited, failure_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(run_id)
        .bind(report.period_start)
        .bind(report.period_end)
        .bind(report.processed as i64)
        .bind(report.credited as i64)
        .bind(report.skipped as i64)
        .bind(report.total_credited)
        .bind(report.failures.len() as i64)
        .execute(&self.pool)
        .await?;
        Ok(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::EntryMeta;

    async fn create_test_pool() -> Option<PgPool> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => return None,
        };
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .ok()
    }

    #[tokio::test]
    async fn test_wallet_roundtrip_and_earning_uniqueness() {
        let pool = match create_test_pool().await {
            Some(p) => p,
            None => {
                eprintln!("Skipping test - database not available");
                return;
            }
        };
        super::super::schema::init_schema(&pool).await.unwrap();
        let store = PostgresStore::new(pool);

        let owner = 990_001;
        let wallet = store.get_or_create_wallet(owner, "GHS").await.unwrap();
        // second call must return the same wallet
        let again = store.get_or_create_wallet(owner, "GHS").await.unwrap();
        assert_eq!(wallet.id, again.id);

        let meta = EntryMeta::for_item(990_101, "settlement of order item 990101");
        let entry = LedgerEntry {
            id: EntryId::new(),
            wallet_id: wallet.id,
            kind: EntryKind::Earning,
            amount: Decimal::new(9500, 2),
            order_item: meta.order_item,
            fx_rate: None,
            description: meta.description.clone(),
            created_at: Utc::now(),
        };
        if store
            .append_entry(&entry, wallet.balance + entry.amount)
            .await
            .is_ok()
        {
            // a second EARNING for the same item must trip the partial index
            let dup = LedgerEntry {
                id: EntryId::new(),
                created_at: Utc::now(),
                ..entry.clone()
            };
            let err = store
                .append_entry(&dup, wallet.balance + entry.amount * Decimal::from(2))
                .await;
            assert!(matches!(err, Err(StoreError::Duplicate(_))));
        }
    }
}
