use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    response::{IntoResponse, Response},
};

use gridcast_core::ForecastRequest;
use gridcast_infra::CancellationToken;

use crate::app::{ApiNode, errors};

use super::blocking;

/// Cancels the in-flight forecast when the handler future is dropped
/// (client went away before the response was ready).
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

pub async fn create_forecast(
    Extension(node): Extension<Arc<ApiNode>>,
    body: Result<Json<ForecastRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let token = CancellationToken::new();
    let _guard = CancelOnDrop(token.clone());

    match blocking(move || node.inference.forecast_with_cancel(request, &token)).await {
        Ok(Ok(result)) => Json(result).into_response(),
        Ok(Err(e)) => errors::forecast_error_to_response(e),
        Err(resp) => resp,
    }
}
