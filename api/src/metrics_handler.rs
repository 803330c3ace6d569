use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use prometheus::TEXT_FORMAT;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// GET /metrics: every `arr_*` family in the Prometheus text format
pub async fn metrics_endpoint(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = metrics::gather_metrics(&state.registry).map_err(|err| {
        tracing::error!(error = %err, "metrics encoding failed");
        ApiError::internal("Metrics could not be encoded")
    })?;
    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body))
}
