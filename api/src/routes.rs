use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    http::{header, Method},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, metrics, metrics_handler, state::AppState};

pub fn observability_routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler::metrics_endpoint))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health_check))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route(
        "/api/tenants/:tenant/dashboard/arr-breakdown",
        get(handlers::get_arr_breakdown),
    )
}

/// Full service router with request tracking, tracing and CORS.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(dashboard_routes())
        .merge(health_routes())
        .merge(observability_routes())
        .fallback(handlers::route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn(track_requests)),
        )
        .with_state(state)
}

async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    // Route templates keep the label set bounded.
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    metrics::observe_http(method.as_str(), &path, status, elapsed.as_secs_f64());
    tracing::info!("{method} {uri} {status} {}ms", elapsed.as_millis());

    response
}
