// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! HTTP API — runs alongside the dispatch fabric.
//!
//! Endpoints:
//!   GET  /api/status            → per-sink counters (JSON)
//!   POST /api/trigger?zone=0    → fire the motion gate

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::dispatch::Dispatcher;
use crate::sink::record::MotionGate;
use crate::sink::SinkStats;

/// Shared state passed to all handlers.
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Present when a record sink is configured.
    pub gate: Option<Arc<MotionGate>>,
}

#[derive(Deserialize)]
pub struct TriggerParams {
    #[serde(default)]
    zone: i32,
}

#[derive(Serialize)]
struct StatusResponse {
    sinks: Vec<SinkStats>,
}

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(handle_status))
        .route("/api/trigger", post(handle_trigger))
        .with_state(state)
}

async fn handle_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse { sinks: state.dispatcher.stats() })
}

async fn handle_trigger(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TriggerParams>,
) -> impl IntoResponse {
    match &state.gate {
        Some(gate) => {
            gate.on_trigger(params.zone);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<AppState>, port: u16) {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    info!(port, "HTTP API listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "Failed to bind HTTP server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "HTTP server error");
    }
}
