use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use gridcast_core::RetrainTrigger;

use super::{PgBackend, describe};
use crate::record_store::StoreError;
use crate::training::RetrainSink;

/// Retrain queue over `retrain_triggers`. Rows survive restarts until a
/// trainer claims them; claiming stamps `claimed_at` instead of deleting.
#[derive(Debug, Clone)]
pub struct PostgresRetrainQueue {
    backend: PgBackend,
}

impl PostgresRetrainQueue {
    pub fn new(backend: PgBackend) -> Self {
        Self { backend }
    }

    fn insert(&self, trigger: &RetrainTrigger) -> Result<(), StoreError> {
        let payload = serde_json::to_value(trigger)
            .map_err(|e| StoreError::Unavailable(format!("retrain trigger encoding failed: {e}")))?;
        self.backend.block_on(async {
            sqlx::query(
                r#"
                INSERT INTO retrain_triggers (trigger_id, horizon, issued_at, payload)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (trigger_id) DO NOTHING
                "#,
            )
            .bind(*trigger.trigger_id.as_uuid())
            .bind(trigger.horizon.to_string())
            .bind(trigger.issued_at)
            .bind(payload)
            .execute(self.backend.pool())
            .await
            .map_err(|e| StoreError::Unavailable(describe("retrain submit", &e)))?;
            Ok(())
        })
    }
}

impl RetrainSink for PostgresRetrainQueue {
    fn submit(&self, trigger: RetrainTrigger) {
        match self.insert(&trigger) {
            Ok(()) => info!(
                horizon = %trigger.horizon,
                trigger = %trigger.trigger_id,
                model = %trigger.model_version,
                "retrain requested"
            ),
            Err(e) => warn!(
                horizon = %trigger.horizon,
                trigger = %trigger.trigger_id,
                error = ?e,
                "retrain trigger not persisted"
            ),
        }
    }

    #[instrument(skip(self), err)]
    fn claim(&self, limit: usize) -> Result<Vec<RetrainTrigger>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<(chrono::DateTime<chrono::Utc>, JsonValue)> = self.backend.block_on(async {
            sqlx::query_as(
                r#"
                UPDATE retrain_triggers SET claimed_at = now()
                WHERE trigger_id IN (
                    SELECT trigger_id FROM retrain_triggers
                    WHERE claimed_at IS NULL
                    ORDER BY issued_at, trigger_id
                    LIMIT $1
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING issued_at, payload
                "#,
            )
            .bind(limit)
            .fetch_all(self.backend.pool())
            .await
            .map_err(|e| StoreError::Unavailable(describe("retrain claim", &e)))
        })?;

        let mut triggers = rows
            .into_iter()
            .map(|(_, p)| {
                serde_json::from_value::<RetrainTrigger>(p)
                    .map_err(|e| StoreError::Unavailable(format!("stored retrain trigger is invalid: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        // RETURNING carries no order.
        triggers.sort_by_key(|t| (t.issued_at, *t.trigger_id.as_uuid()));
        Ok(triggers)
    }
}
