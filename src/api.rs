//! HTTP API endpoints for session management.
//!
//! Game play happens over the WebSocket; these endpoints create, inspect and
//! delete sessions.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::GameError;
use crate::protocol::SessionSnapshot;
use crate::state::{AppState, CreatedGame};
use crate::types::GameSettings;

pub const HOST_TOKEN_HEADER: &str = "x-host-token";

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub host_id: String,
    #[serde(default)]
    pub settings: GameSettings,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
    pub running_timers: usize,
}

/// Engine error rendered as `{ success: false, error, code }`
#[derive(Debug)]
pub struct ApiError(pub GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            err if err.is_not_found() => StatusCode::NOT_FOUND,
            GameError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GameError::InvalidInput(_)
            | GameError::InvalidSettings(_)
            | GameError::InvalidTeam(_) => StatusCode::BAD_REQUEST,
            GameError::CodeSpaceExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::CONFLICT,
        };
        let body = serde_json::json!({
            "success": false,
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        (status, Json(body)).into_response()
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/games", post(create_game))
        .route("/api/games/{key}", get(get_game).delete(delete_game))
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.session_count().await,
        running_timers: state.timers.active_count(),
    })
}

/// Create a session in the lobby.
///
/// POST /api/games
///
/// The response is the only place the host token is ever returned.
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<CreatedGame>), ApiError> {
    let created = state.create_game(req.host_id, req.settings).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/games/{key}
pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.snapshot(&key).await?))
}

/// Delete a session. Requires the host token header.
///
/// DELETE /api/games/{key}
pub async fn delete_game(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = headers
        .get(HOST_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    state.verify_host(&key, token).await?;
    state.delete_session(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
