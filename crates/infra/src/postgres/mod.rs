//! Postgres persistence (feature `postgres`).
//!
//! The store traits are synchronous; every call is bridged onto the tokio
//! runtime captured at connect time. Calls may come from runtime worker
//! threads (they are moved off the async scheduler first) or from plain
//! threads such as the drift workers.
//!
//! ## Error Mapping
//!
//! | SQLx error | Code | Mapped to |
//! |---|---|---|
//! | Database (unique violation) | `23505` | duplicate / concurrency |
//! | Database (other) | any | unavailable / storage |
//! | PoolClosed, Io, Tls, ... | N/A | unavailable / storage |

mod drift;
mod journal;
mod records;
mod retrain;

pub use drift::PostgresDriftHistory;
pub use journal::PostgresRegistryJournal;
pub use records::PostgresRecordStore;
pub use retrain::PostgresRetrainQueue;

use std::future::Future;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::runtime::Handle;
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS load_records (
        ts TIMESTAMPTZ PRIMARY KEY,
        actual_load DOUBLE PRECISION NOT NULL,
        intraday_forecast DOUBLE PRECISION,
        day_ahead_forecast DOUBLE PRECISION,
        exogenous JSONB NOT NULL DEFAULT '{}'::jsonb,
        archived BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS registry_journal (
        sequence_number BIGINT PRIMARY KEY CHECK (sequence_number > 0),
        event_id UUID NOT NULL UNIQUE,
        event_type TEXT NOT NULL,
        event_version INTEGER NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL,
        payload JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS drift_windows (
        id BIGSERIAL PRIMARY KEY,
        horizon TEXT NOT NULL,
        window_start TIMESTAMPTZ NOT NULL,
        payload JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS drift_windows_horizon_idx ON drift_windows (horizon, id)",
    r#"
    CREATE TABLE IF NOT EXISTS retrain_triggers (
        trigger_id UUID PRIMARY KEY,
        horizon TEXT NOT NULL,
        issued_at TIMESTAMPTZ NOT NULL,
        payload JSONB NOT NULL,
        claimed_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS retrain_triggers_unclaimed_idx ON retrain_triggers (issued_at) WHERE claimed_at IS NULL",
];

/// Connection pool plus the runtime handle used to drive it from sync code.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
    handle: Handle,
}

impl PgBackend {
    /// Connect from inside a tokio runtime and create the schema if missing.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let backend = Self {
            pool,
            handle: Handle::current(),
        };
        backend.migrate().await?;
        Ok(backend)
    }

    pub fn from_pool(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("postgres schema ready");
        Ok(())
    }

    /// Run `fut` to completion from synchronous code.
    pub(crate) fn block_on<F: Future>(&self, fut: F) -> F::Output {
        tokio::task::block_in_place(|| self.handle.block_on(fut))
    }
}

/// `23505`: a row with the same key already exists.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

pub(crate) fn describe(operation: &str, err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => format!("database error in {operation}: {}", db.message()),
        sqlx::Error::PoolClosed => format!("connection pool closed in {operation}"),
        other => format!("sqlx error in {operation}: {other}"),
    }
}
