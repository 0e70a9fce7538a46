use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    response::{IntoResponse, Response},
};

use gridcast_infra::DriftHistoryStore;

use crate::app::{ApiNode, dto, errors};

use super::{blocking, parse_horizon};

pub async fn get_active(Extension(node): Extension<Arc<ApiNode>>, Path(horizon): Path<String>) -> Response {
    let horizon = match parse_horizon(&horizon) {
        Ok(h) => h,
        Err(resp) => return resp,
    };

    match node.registry.get_active(horizon) {
        Ok(artifact) => Json(artifact).into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}

/// Every artifact registered for the horizon, in registration order.
pub async fn list_models(Extension(node): Extension<Arc<ApiNode>>, Path(horizon): Path<String>) -> Response {
    match parse_horizon(&horizon) {
        Ok(h) => Json(node.registry.list(h)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn rollback(Extension(node): Extension<Arc<ApiNode>>, Path(horizon): Path<String>) -> Response {
    let horizon = match parse_horizon(&horizon) {
        Ok(h) => h,
        Err(resp) => return resp,
    };

    match blocking(move || node.registry.rollback(horizon)).await {
        Ok(Ok(artifact)) => Json(artifact).into_response(),
        Ok(Err(e)) => errors::registry_error_to_response(e),
        Err(resp) => resp,
    }
}

pub async fn drift_history(
    Extension(node): Extension<Arc<ApiNode>>,
    Path(horizon): Path<String>,
    query: Result<Query<dto::DriftHistoryQuery>, QueryRejection>,
) -> Response {
    let horizon = match parse_horizon(&horizon) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };

    let history = node.drift_history.clone();
    let windows = match blocking(move || history.list(horizon, query.limit)).await {
        Ok(Ok(windows)) => windows,
        Ok(Err(e)) => return errors::store_error_to_response(e),
        Err(resp) => return resp,
    };

    Json(dto::DriftHistoryResponse {
        horizon,
        status: node.drift_board.get(horizon),
        windows,
    })
    .into_response()
}
