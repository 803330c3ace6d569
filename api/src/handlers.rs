use std::time::Instant;

use arr_engine::{BreakdownOutcome, LineageFault};
use arr_shared::ArrBreakdown;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::period::period_from_params;
use crate::state::AppState;
use crate::store::SnapshotStore;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let uptime = state.started_at.elapsed().as_secs();
    let now = Utc::now().to_rfc3339();
    let cache = state.snapshots.config();

    tracing::info!(uptime_secs = uptime, "health check passed");
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": now,
            "uptime_secs": uptime,
            "cache": {
                "enabled": cache.enabled,
                "hit_rate": state.snapshots.metrics().hit_rate(),
            }
        })),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct ArrBreakdownQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Report body. Faults are only listed when some lineage was left out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrBreakdownResponse {
    #[serde(flatten)]
    pub breakdown: ArrBreakdown,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<LineageFault>,
}

impl From<BreakdownOutcome> for ArrBreakdownResponse {
    fn from(outcome: BreakdownOutcome) -> Self {
        Self {
            breakdown: outcome.breakdown,
            faults: outcome.faults,
        }
    }
}

/// GET /api/tenants/:tenant/dashboard/arr-breakdown?start=&end=
pub async fn get_arr_breakdown(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Query(query): Query<ArrBreakdownQuery>,
) -> ApiResult<Json<ArrBreakdownResponse>> {
    let started = Instant::now();
    let result = compute_breakdown(&state, &tenant, &query).await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.outcome(),
    };
    metrics::observe_breakdown(outcome, started.elapsed().as_secs_f64());

    result.map(Json)
}

async fn compute_breakdown(
    state: &AppState,
    tenant: &str,
    query: &ArrBreakdownQuery,
) -> ApiResult<ArrBreakdownResponse> {
    let period = period_from_params(query.start.as_deref(), query.end.as_deref())?;
    let snapshot = state.snapshots.load(tenant).await?;

    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.compute(&snapshot, period, Utc::now()))
        .await
        .map_err(|err| ApiError::internal(format!("Breakdown task failed: {}", err)))??;

    metrics::record_faults(&outcome.faults);
    if !outcome.faults.is_empty() {
        tracing::warn!(
            tenant,
            faults = outcome.faults.len(),
            "lineages excluded from ARR breakdown"
        );
    }

    Ok(outcome.into())
}

pub async fn route_not_found() -> impl IntoResponse {
    ApiError::not_found("RouteNotFound", "Route not found")
}
