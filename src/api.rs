//! HTTP API endpoints for room management.
//!
//! Clients create a room here, then connect to `/ws?room=CODE`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::engine::RoomSnapshot;
use crate::error::{AppError, StandardError};
use crate::room::RoomRegistry;
use crate::ws;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    /// Requested room code; a random one is generated when absent
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub rooms: usize,
}

/// Error response carrying the standard envelope
pub struct ApiError(StandardError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(StandardError::from(err))
    }
}

impl From<StandardError> for ApiError {
    fn from(err: StandardError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0.log();
        let status =
            StatusCode::from_u16(self.0.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.envelope())).into_response()
    }
}

/// Create a new room.
///
/// POST /api/rooms
pub async fn create_room(
    State(registry): State<RoomRegistry>,
    body: Option<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let room = registry.create_room(request.code.as_deref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            code: room.code().to_string(),
        }),
    ))
}

/// Public view of a room.
///
/// GET /api/rooms/{code}
pub async fn get_room(
    State(registry): State<RoomRegistry>,
    Path(code): Path<String>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    let room = registry.get(&code).await?;
    Ok(Json(room.snapshot().await?))
}

/// GET /health
pub async fn health(State(registry): State<RoomRegistry>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        rooms: registry.room_count().await,
    })
}

pub fn router(registry: RoomRegistry) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/{code}", get(get_room))
        .route("/health", get(health))
        .with_state(registry)
}
