//! Board creation and query routes.
//!
//! Handlers translate HTTP into hub requests; every board rule lives in the
//! hub. Failures map to a status code plus a JSON `{error}` body.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use crate::protocol::ErrorCode;
use crate::services::hub::{BoardSummary, HubError};
use crate::services::session::SessionError;
use crate::services::store::CreatedBoard;
use crate::state::{AppState, BoardId};

// =============================================================================
// ERRORS
// =============================================================================

/// HTTP-facing error: status plus `{ "error": message }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        let status = hub_error_to_status(&err);
        if status.is_server_error() {
            warn!(code = err.error_code(), error = %err, "board request failed");
        }
        let message = match &err {
            HubError::Session(SessionError::BoardNotFound(_)) => "Board not found".to_owned(),
            HubError::Session(SessionError::InvalidPassword) => "Invalid password".to_owned(),
            other => other.to_string(),
        };
        Self { status, message }
    }
}

pub(crate) fn hub_error_to_status(err: &HubError) -> StatusCode {
    match err {
        HubError::Session(SessionError::BoardNotFound(_) | SessionError::NoteNotFound(_) | SessionError::CommentNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        HubError::Session(SessionError::InvalidPassword | SessionError::Unjoined(_)) => StatusCode::UNAUTHORIZED,
        HubError::Session(SessionError::NotOwner(_)) => StatusCode::FORBIDDEN,
        HubError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

// =============================================================================
// BODIES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CreateBoardBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinBoardBody {
    #[serde(default)]
    pub password: Option<String>,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/board`: create a board, optionally password protected.
pub async fn create_board(
    State(state): State<AppState>,
    body: Option<Json<CreateBoardBody>>,
) -> Result<Json<CreatedBoard>, ApiError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let created = state.hub.create_board(body.title, body.password).await?;
    info!(board_id = %created.id, has_password = created.has_password, "board created");
    Ok(Json(created))
}

/// `GET /api/board/:id`: board metadata and full content. Never includes
/// the password.
pub async fn get_board(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<BoardSummary>, ApiError> {
    let summary = state.hub.board_summary(BoardId::from(id)).await?;
    Ok(Json(summary))
}

/// `POST /api/board/:id/join`: password pre-check before opening a socket.
pub async fn join_board(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<JoinBoardBody>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    state.hub.check_join(BoardId::from(id), body.password).await?;
    Ok(Json(json!({ "success": true })))
}

/// `GET /api/board`: board API liveness.
pub async fn api_status() -> Json<serde_json::Value> {
    Json(json!({ "message": "Board API working", "status": "ok" }))
}

/// `GET /api/health`
pub async fn health() -> Json<serde_json::Value> {
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    Json(json!({ "status": "ok", "timestamp": timestamp }))
}

#[cfg(test)]
#[path = "boards_test.rs"]
mod tests;
