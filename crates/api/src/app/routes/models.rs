use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::app::{ApiNode, dto, errors};

use super::{blocking, parse_version};

pub async fn register_model(
    Extension(node): Extension<Arc<ApiNode>>,
    body: Result<Json<dto::RegisterModelRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    let artifact = body.into_artifact(Utc::now());

    match blocking(move || node.registry.register(artifact)).await {
        Ok(Ok(artifact)) => (StatusCode::CREATED, Json(artifact)).into_response(),
        Ok(Err(e)) => errors::registry_error_to_response(e),
        Err(resp) => resp,
    }
}

pub async fn get_model(Extension(node): Extension<Arc<ApiNode>>, Path(version): Path<String>) -> Response {
    let version_id = match parse_version(&version) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match node.registry.get(version_id) {
        Ok(artifact) => Json(artifact).into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}

/// STAGED -> VALIDATED against the node's validation policy.
pub async fn validate_model(Extension(node): Extension<Arc<ApiNode>>, Path(version): Path<String>) -> Response {
    let version_id = match parse_version(&version) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(move || node.registry.validate_with(version_id, &node.config.validation)).await {
        Ok(Ok(artifact)) => Json(artifact).into_response(),
        Ok(Err(e)) => errors::registry_error_to_response(e),
        Err(resp) => resp,
    }
}

pub async fn promote_model(Extension(node): Extension<Arc<ApiNode>>, Path(version): Path<String>) -> Response {
    let version_id = match parse_version(&version) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(move || node.registry.promote(version_id)).await {
        Ok(Ok(artifact)) => Json(artifact).into_response(),
        Ok(Err(e)) => errors::registry_error_to_response(e),
        Err(resp) => resp,
    }
}
