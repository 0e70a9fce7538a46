use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    response::{IntoResponse, Response},
};

use crate::app::{ApiNode, dto, errors};

use super::blocking;

/// Rejected records are listed in the report; the request itself still succeeds.
pub async fn ingest_records(
    Extension(node): Extension<Arc<ApiNode>>,
    body: Result<Json<dto::IngestRecordsRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match blocking(move || node.ingestion.ingest_batch(body.records)).await {
        Ok(report) => Json(report).into_response(),
        Err(resp) => resp,
    }
}
