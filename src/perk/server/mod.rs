// SPDX-License-Identifier: MIT

//! HTTP ingress surface
//!
//! Routes:
//! - `POST /v1/events`: synchronous single-event processing
//! - `POST /v1/events/batch`: asynchronous batch ingestion (max 100)
//! - `GET /v1/rules`: the active rule document
//! - `POST /v1/rules/reload`: forced reload, rebuild and swap
//! - `GET /healthz`: liveness
//! - `GET /readyz`: readiness, gated on queue utilization

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::perk::action::ActionRegistry;
use crate::perk::config::{self, Loader};
use crate::perk::dag;
use crate::perk::engine::Engine;
use crate::perk::error::{PerkError, ProcessError};
use crate::perk::event::Event;
use crate::perk::metrics;

/// Hard cap on events per batch request, enforced before any enqueue.
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub loader: Arc<Loader>,
    pub registry: Arc<ActionRegistry>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", post(ingest_event))
        .route("/v1/events/batch", post(ingest_batch))
        .route("/v1/rules", get(list_rules))
        .route("/v1/rules/reload", post(reload_rules))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the shutdown token fires.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), PerkError> {
    let app = router(state);
    log::info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn ingest_event(
    State(state): State<AppState>,
    Json(mut event): Json<Event>,
) -> (StatusCode, Json<Value>) {
    event.ensure_id();
    event.received_at = Some(Utc::now());

    match state
        .engine
        .process_sync(event, CancellationToken::new())
        .await
    {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        },
        Err(e) => {
            let status = match &e {
                ProcessError::QueueFull { .. } => StatusCode::TOO_MANY_REQUESTS,
                ProcessError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                ProcessError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            };
            error_response(status, &e.to_string())
        }
    }
}

async fn ingest_batch(
    State(state): State<AppState>,
    Json(events): Json<Vec<Event>>,
) -> (StatusCode, Json<Value>) {
    if events.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "batch must contain at least one event");
    }
    if events.len() > MAX_BATCH_SIZE {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("batch size {} exceeds max {MAX_BATCH_SIZE}", events.len()),
        );
    }

    let now = Utc::now();
    let job_id = Uuid::new_v4().to_string();
    let total = events.len();
    let mut queued = 0;
    for mut event in events {
        event.ensure_id();
        event.received_at = Some(now);
        if state.engine.process_async(event) {
            queued += 1;
        }
    }

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "job_id": job_id,
            "total": total,
            "queued": queued,
            "rejected": total - queued,
        })),
    )
}

async fn list_rules(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let doc = state.loader.document();
    (
        StatusCode::OK,
        Json(json!({
            "version": doc.version,
            "scenarios": doc.scenarios,
        })),
    )
}

async fn reload_rules(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let doc = match state.loader.reload() {
        Ok(doc) => doc,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    if let Err(e) = config::validate(&doc) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string());
    }
    match dag::build(&doc, &state.registry) {
        Ok(graph) => {
            let nodes = graph.node_count();
            state.engine.swap_graph(Arc::new(graph));
            log::info!("rule graph reloaded via API: {nodes} nodes");
            (
                StatusCode::OK,
                Json(json!({
                    "reloaded": true,
                    "scenarios_count": doc.scenarios.len(),
                })),
            )
        }
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()),
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let utilization = state.engine.queue_utilization();
    metrics::queue_utilization().record(utilization, &[]);
    if utilization > 0.8 {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "overloaded",
                "queue_utilization": utilization,
            })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "queue_utilization": utilization,
        })),
    )
}

fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"error": message})))
}
