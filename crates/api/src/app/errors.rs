use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use gridcast_infra::{ForecastError, StoreError};
use gridcast_registry::RegistryError;

/// HTTP status for a stable error kind.
pub fn status_for(kind: &str) -> StatusCode {
    match kind {
        "feature_gap" | "unrecognized_schema" | "validation_error" => StatusCode::UNPROCESSABLE_ENTITY,
        "schema_mismatch" | "invalid_transition" | "duplicate_version" => StatusCode::CONFLICT,
        "model_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
        "no_prior_version" | "unknown_version" => StatusCode::NOT_FOUND,
        "cancelled" => StatusCode::REQUEST_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn forecast_error_to_response(err: ForecastError) -> Response {
    let kind = err.kind();
    json_error(status_for(kind), kind, err.to_string())
}

pub fn registry_error_to_response(err: RegistryError) -> Response {
    let kind = err.kind();
    json_error(status_for(kind), kind, err.to_string())
}

pub fn store_error_to_response(err: StoreError) -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
}

/// Malformed request bodies never reach the services.
pub fn json_rejection(rejection: JsonRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

pub fn bad_request(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
