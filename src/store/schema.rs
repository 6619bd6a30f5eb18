//! PostgreSQL schema bootstrap
//!
//! DDL for the records this crate owns. `init_schema` is for dev/test
//! bootstrap; production deployments run their own migration tooling.

use sqlx::PgPool;

pub const CREATE_WALLETS: &str = r#"
CREATE TABLE IF NOT EXISTS wallets_tb (
    id          BIGSERIAL PRIMARY KEY,
    owner_id    BIGINT NOT NULL UNIQUE,
    balance     NUMERIC(20, 4) NOT NULL DEFAULT 0,
    currency    TEXT NOT NULL,
    status      SMALLINT NOT NULL DEFAULT 1,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_LEDGER_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries_tb (
    entry_id       TEXT PRIMARY KEY,
    wallet_id      BIGINT NOT NULL REFERENCES wallets_tb(id),
    kind           SMALLINT NOT NULL,
    amount         NUMERIC(20, 4) NOT NULL,
    order_item_id  BIGINT,
    fx_rate        NUMERIC(20, 8),
    description    TEXT NOT NULL DEFAULT '',
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Settlement idempotency key: at most one EARNING per order item,
/// enforced by the database itself (kind 1 = EARNING).
pub const CREATE_EARNING_UNIQUE_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS uniq_earning_order_item
    ON ledger_entries_tb (order_item_id) WHERE kind = 1
"#;

pub const CREATE_LEDGER_WALLET_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_ledger_wallet
    ON ledger_entries_tb (wallet_id, entry_id)
"#;

pub const CREATE_VENDOR_PROFILES: &str = r#"
CREATE TABLE IF NOT EXISTS vendor_profiles_tb (
    vendor_id        BIGINT PRIMARY KEY,
    business_model   SMALLINT NOT NULL,
    commission_rate  NUMERIC(8, 6)
)
"#;

pub const CREATE_ORDER_ITEMS: &str = r#"
CREATE TABLE IF NOT EXISTS order_items_tb (
    id            BIGINT PRIMARY KEY,
    order_id      BIGINT NOT NULL,
    vendor_id     BIGINT NOT NULL,
    unit_price    NUMERIC(20, 4) NOT NULL,
    quantity      INTEGER NOT NULL,
    status        SMALLINT NOT NULL DEFAULT 0,
    platform_fee  NUMERIC(20, 4) NOT NULL DEFAULT 0,
    gateway_fee   NUMERIC(20, 4) NOT NULL DEFAULT 0,
    fees_priced   BOOLEAN NOT NULL DEFAULT FALSE,
    delivered_at  TIMESTAMPTZ
)
"#;

pub const CREATE_ORDER_ITEMS_DELIVERED_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_items_delivered
    ON order_items_tb (delivered_at) WHERE status = 40
"#;

pub const CREATE_WITHDRAWALS: &str = r#"
CREATE TABLE IF NOT EXISTS withdrawals_tb (
    withdrawal_id  TEXT PRIMARY KEY,
    vendor_id      BIGINT NOT NULL,
    wallet_id      BIGINT NOT NULL REFERENCES wallets_tb(id),
    amount         NUMERIC(20, 4) NOT NULL,
    method         SMALLINT NOT NULL,
    destination    TEXT NOT NULL,
    status         SMALLINT NOT NULL DEFAULT 0,
    approved_by    BIGINT,
    reject_reason  TEXT,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_PAYOUT_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS payout_logs_tb (
    id              UUID PRIMARY KEY,
    withdrawal_id   TEXT NOT NULL REFERENCES withdrawals_tb(withdrawal_id),
    vendor_id       BIGINT NOT NULL,
    provider        TEXT NOT NULL,
    amount          NUMERIC(20, 4) NOT NULL,
    currency        TEXT NOT NULL,
    destination     TEXT NOT NULL,
    status          SMALLINT NOT NULL,
    provider_ref    TEXT,
    failure_reason  TEXT,
    order_item_id   BIGINT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_CREDIT_LIMITS: &str = r#"
CREATE TABLE IF NOT EXISTS credit_limits_tb (
    user_id        BIGINT PRIMARY KEY,
    max_limit      NUMERIC(20, 4) NOT NULL,
    current_usage  NUMERIC(20, 4) NOT NULL DEFAULT 0,
    currency       TEXT NOT NULL,
    eligible       BOOLEAN NOT NULL DEFAULT TRUE,
    active         BOOLEAN NOT NULL DEFAULT TRUE,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CHECK (current_usage >= 0 AND current_usage <= max_limit)
)
"#;

pub const CREATE_CREDIT_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS credit_entries_tb (
    entry_id     TEXT PRIMARY KEY,
    user_id      BIGINT NOT NULL,
    kind         SMALLINT NOT NULL,
    amount       NUMERIC(20, 4) NOT NULL,
    order_ref    BIGINT,
    description  TEXT NOT NULL DEFAULT '',
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_DISPUTES: &str = r#"
CREATE TABLE IF NOT EXISTS disputes_tb (
    dispute_id        TEXT PRIMARY KEY,
    order_id          BIGINT NOT NULL UNIQUE,
    reason            TEXT NOT NULL,
    status            SMALLINT NOT NULL DEFAULT 0,
    resolution_notes  TEXT,
    resolved_by       BIGINT,
    resolved_at       TIMESTAMPTZ,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_SETTLEMENT_RUNS: &str = r#"
CREATE TABLE IF NOT EXISTS settlement_runs_tb (
    run_id          UUID PRIMARY KEY,
    period_start    TIMESTAMPTZ NOT NULL,
    period_end      TIMESTAMPTZ NOT NULL,
    processed       BIGINT NOT NULL,
    credited        BIGINT NOT NULL,
    skipped         BIGINT NOT NULL,
    total_credited  NUMERIC(20, 4) NOT NULL,
    failure_count   BIGINT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Create all tables and indexes
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("initializing marketplace ledger schema");

    for ddl in [
        CREATE_WALLETS,
        CREATE_LEDGER_ENTRIES,
        CREATE_EARNING_UNIQUE_INDEX,
        CREATE_LEDGER_WALLET_INDEX,
        CREATE_VENDOR_PROFILES,
        CREATE_ORDER_ITEMS,
        CREATE_ORDER_ITEMS_DELIVERED_INDEX,
        CREATE_WITHDRAWALS,
        CREATE_PAYOUT_LOGS,
        CREATE_CREDIT_LIMITS,
        CREATE_CREDIT_ENTRIES,
        CREATE_DISPUTES,
        CREATE_SETTLEMENT_RUNS,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("schema initialized");
    Ok(())
}
