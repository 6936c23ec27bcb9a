//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router carries the live websocket endpoint, the out-of-band
//! board hydration endpoint, the new-board redirect, and the health check.
//! CORS is open to any origin and every request is traced.

pub mod boards;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[must_use]
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ws", get(ws::handle_ws))
        .route("/api/boards/{board_id}", get(boards::get_board))
        .route("/new", get(boards::new_board))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
