//! Router construction and HTTP handlers

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use metricgate_config::ServerConfig;
use metricgate_interfaces::SinkHealth;
use metricgate_pipeline::Accepted;
use metricgate_web::{cors_layer, request_id_middleware, ApiKey, WebError, WebResult};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::websocket::stream_handler;

/// Main listener: one-shot ingestion, `/ws` streaming, health and stats
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/metrics", post(submit_metrics))
        .route("/api/stats", get(stats_handler))
        .route("/ws", get(stream_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .with_state(state);

    apply_layers(app, server)
}

/// Dedicated stream listener: upgrades on `/`
pub fn build_stream_router(state: AppState, server: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/", get(stream_handler))
        .fallback(not_found_handler)
        .with_state(state);

    apply_layers(app, server)
}

fn apply_layers(mut app: Router, server: &ServerConfig) -> Router {
    if server.enable_tracing {
        app = app.layer(TraceLayer::new_for_http());
    }

    if server.enable_request_id {
        app = app.layer(middleware::from_fn(request_id_middleware));
    }

    if server.enable_cors {
        app = app.layer(cors_layer());
    }

    app
}

/// `POST /api/metrics`
async fn submit_metrics(State(state): State<AppState>, key: ApiKey, body: Bytes) -> WebResult<(StatusCode, Json<Value>)> {
    match state.ingest.submit_once(&body, key.as_deref()).await? {
        Accepted::Created { samples } => Ok((
            StatusCode::CREATED,
            Json(json!({ "status": "created", "samples": samples })),
        )),
        Accepted::Queued { .. } => Err(WebError::internal("one-shot submission was queued as a stream frame")),
    }
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let sink_health = state.sink.health_check().await;
    let closing = state.ingest.governor().is_closed() || state.is_shutting_down();

    let (status, sink_status, reason) = match &sink_health {
        SinkHealth::Healthy => ("ok", "healthy", None),
        SinkHealth::Degraded { reason } => ("degraded", "degraded", Some(reason.as_str())),
        SinkHealth::Unhealthy { reason } => ("unhealthy", "unhealthy", Some(reason.as_str())),
    };
    let status = if closing { "shutting_down" } else { status };

    let code = if closing || matches!(sink_health, SinkHealth::Unhealthy { .. }) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let body = json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "sink": {
            "name": state.sink.name(),
            "status": sink_status,
            "reason": reason,
        },
        "connections": state.ingest.governor().connection_count(),
        "in_flight": state.ingest.governor().in_flight(),
    });

    (code, Json(body))
}

async fn stats_handler(State(state): State<AppState>) -> Json<Value> {
    let engine = state.ingest.engine();
    Json(json!({
        "counters": state.ingest.stats().snapshot(),
        "buffer": {
            "accumulating": engine.accumulating(),
            "outstanding": engine.outstanding(),
        },
        "in_flight": state.ingest.governor().in_flight(),
        "connections": state.ingest.governor().connection_count(),
    }))
}

async fn root_handler() -> Json<Value> {
    Json(json!({
        "service": "metricgate",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "submit": "/api/metrics",
            "stream": "/ws",
            "stats": "/api/stats",
            "health": "/health"
        }
    }))
}

async fn not_found_handler() -> WebError {
    WebError::not_found("No route for this path")
}
