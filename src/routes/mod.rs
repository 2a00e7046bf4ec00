//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the board HTTP API and the realtime websocket endpoint under a single
//! Axum router. Everything lives under `/api`; the drawing front-end is served
//! elsewhere.

pub mod boards;
pub mod ws;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/api/board", get(boards::api_status).post(boards::create_board))
        .route("/api/board/{id}", get(boards::get_board))
        .route("/api/board/{id}/join", post(boards::join_board))
        .route("/api/health", get(boards::health))
        .route("/api/ws", get(ws::handle_ws))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive CORS unless an explicit origin list is configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}
