use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query, rejection::QueryRejection},
    response::{IntoResponse, Response},
};

use gridcast_infra::RetrainSink;

use crate::app::{ApiNode, dto, errors};

use super::blocking;

/// Hand queued retrain triggers to the training backend. Each trigger is
/// returned by exactly one claim.
pub async fn claim_triggers(
    Extension(node): Extension<Arc<ApiNode>>,
    query: Result<Query<dto::ClaimTriggersQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    let limit = query.limit.unwrap_or(dto::DEFAULT_CLAIM_LIMIT);
    if limit == 0 {
        return errors::bad_request("limit must be at least 1");
    }

    let retrain = node.retrain.clone();
    match blocking(move || retrain.claim(limit)).await {
        Ok(Ok(triggers)) => Json(triggers).into_response(),
        Ok(Err(e)) => errors::store_error_to_response(e),
        Err(resp) => resp,
    }
}
