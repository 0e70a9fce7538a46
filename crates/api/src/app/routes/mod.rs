use axum::{
    Router,
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use tracing::error;

use gridcast_core::{Horizon, VersionId};

use crate::app::errors;

pub mod forecasts;
pub mod horizons;
pub mod models;
pub mod records;
pub mod retrain;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .route("/records", post(records::ingest_records))
        .route("/forecasts", post(forecasts::create_forecast))
        .route("/models", post(models::register_model))
        .route("/models/:version", get(models::get_model))
        .route("/models/:version/validate", post(models::validate_model))
        .route("/models/:version/promote", post(models::promote_model))
        .route("/horizons/:horizon/active", get(horizons::get_active))
        .route("/horizons/:horizon/models", get(horizons::list_models))
        .route("/horizons/:horizon/rollback", post(horizons::rollback))
        .route("/horizons/:horizon/drift", get(horizons::drift_history))
        .route("/retrain-triggers/claim", post(retrain::claim_triggers))
}

/// Run registry and store calls off the async workers; they may block on
/// locks or on a database round trip.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!(error = ?e, "blocking task failed");
        errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "request task failed")
    })
}

pub(crate) fn parse_horizon(raw: &str) -> Result<Horizon, Response> {
    raw.parse::<Horizon>()
        .map_err(|e| errors::bad_request(format!("invalid horizon '{raw}': {e}")))
}

pub(crate) fn parse_version(raw: &str) -> Result<VersionId, Response> {
    raw.parse::<VersionId>()
        .map_err(|e| errors::bad_request(e.to_string()))
}
