use serde_json::Value as JsonValue;

use gridcast_core::{DriftWindowStat, Horizon};

use super::{PgBackend, describe};
use crate::drift_history::DriftHistoryStore;
use crate::record_store::StoreError;

/// Drift history over `drift_windows`, one JSONB row per closed window.
#[derive(Debug, Clone)]
pub struct PostgresDriftHistory {
    backend: PgBackend,
}

impl PostgresDriftHistory {
    pub fn new(backend: PgBackend) -> Self {
        Self { backend }
    }
}

impl DriftHistoryStore for PostgresDriftHistory {
    fn append(&self, stat: DriftWindowStat) -> Result<(), StoreError> {
        let payload = serde_json::to_value(&stat)
            .map_err(|e| StoreError::Unavailable(format!("drift window encoding failed: {e}")))?;
        self.backend.block_on(async {
            sqlx::query("INSERT INTO drift_windows (horizon, window_start, payload) VALUES ($1, $2, $3)")
                .bind(stat.horizon.to_string())
                .bind(stat.window_start)
                .bind(payload)
                .execute(self.backend.pool())
                .await
                .map_err(|e| StoreError::Unavailable(describe("drift append", &e)))?;
            Ok(())
        })
    }

    fn list(&self, horizon: Horizon, limit: Option<usize>) -> Result<Vec<DriftWindowStat>, StoreError> {
        let limit = limit.map_or(i64::MAX, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let payloads: Vec<JsonValue> = self.backend.block_on(async {
            sqlx::query_scalar(
                r#"
                SELECT payload FROM (
                    SELECT id, payload FROM drift_windows
                    WHERE horizon = $1
                    ORDER BY id DESC
                    LIMIT $2
                ) newest
                ORDER BY id ASC
                "#,
            )
            .bind(horizon.to_string())
            .bind(limit)
            .fetch_all(self.backend.pool())
            .await
            .map_err(|e| StoreError::Unavailable(describe("drift list", &e)))
        })?;

        payloads
            .into_iter()
            .map(|p| {
                serde_json::from_value(p)
                    .map_err(|e| StoreError::Unavailable(format!("stored drift window is invalid: {e}")))
            })
            .collect()
    }
}
