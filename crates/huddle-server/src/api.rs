use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub access_code: String,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub valid: bool,
}

/// Compare a submitted code against the shared secret. With no secret
/// configured, every code validates. The response never says why a code
/// failed.
pub async fn validate_access(
    State(state): State<AppState>,
    payload: Result<Json<AccessRequest>, JsonRejection>,
) -> Result<Json<AccessResponse>, AppError> {
    let Json(request) =
        payload.map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))?;
    let valid = match state.config.access_code.as_deref() {
        Some(secret) => request.access_code == secret,
        None => true,
    };
    Ok(Json(AccessResponse { valid }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub estimation_rooms: usize,
    pub retro_rooms: usize,
    pub breakout_rooms: usize,
    pub ws_connections: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        estimation_rooms: state.estimation.read().await.room_count(),
        retro_rooms: state.retro.read().await.room_count(),
        breakout_rooms: state.breakout.read().await.room_count(),
        ws_connections: state
            .ws_connection_count
            .load(std::sync::atomic::Ordering::Relaxed),
    })
}
