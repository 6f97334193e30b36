use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{scheduler::SharedStatus, store::TelemetryStore};

pub const DEFAULT_READINGS_LIMIT: usize = 50;
pub const MAX_READINGS_LIMIT: usize = 500;

#[derive(Clone)]
pub struct ApiState {
    pub store: TelemetryStore,
    pub status: SharedStatus,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct ReadingsQuery {
    limit: Option<usize>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/readings", get(handle_get_readings))
        .route("/api/readings/latest", get(handle_get_latest))
        .route("/api/status", get(handle_get_status))
        .with_state(state)
}

async fn handle_get_readings(
    State(state): State<ApiState>,
    Query(query): Query<ReadingsQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_READINGS_LIMIT)
        .min(MAX_READINGS_LIMIT);

    match state.store.recent(limit) {
        Ok(readings) => Json(readings).into_response(),
        Err(err) => {
            warn!("readings query failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read telemetry")
        }
    }
}

async fn handle_get_latest(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.latest() {
        Ok(Some(reading)) => Json(reading).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "no readings stored yet"),
        Err(err) => {
            warn!("latest reading query failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read telemetry")
        }
    }
}

async fn handle_get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let status = state.status.lock().await.clone();
    Json(status)
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
