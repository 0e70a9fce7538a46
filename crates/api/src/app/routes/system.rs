use std::sync::Arc;

use axum::{Json, extract::Extension};

use crate::app::{ApiNode, dto::HealthResponse};

pub async fn health(Extension(node): Extension<Arc<ApiNode>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        schema_version: node.pipeline.schema_version().clone(),
        registry_version: node.registry.version(),
    })
}
