//! Board HTTP routes: out-of-band hydration and new-board redirect.

use axum::extract::{Path, State};
use axum::response::{Json, Redirect};
use frames::Shape;
use serde::Serialize;

use crate::services::session::generate_board_id;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub board_id: String,
    pub shapes: Vec<Shape>,
}

/// `GET /api/boards/{board_id}`: current shapes, creating the room if absent.
pub async fn get_board(State(state): State<AppState>, Path(board_id): Path<String>) -> Json<BoardResponse> {
    let existing = state.rooms.read().await.get(&board_id).map(|room| room.state.snapshot());
    let shapes = match existing {
        Some(shapes) => shapes,
        None => state.rooms.write().await.get_or_create(&board_id).state.snapshot(),
    };
    Json(BoardResponse { board_id, shapes })
}

/// `GET /new`: redirect to a fresh random board.
pub async fn new_board() -> Redirect {
    Redirect::temporary(&format!("/?board={}", generate_board_id()))
}

#[cfg(test)]
#[path = "boards_test.rs"]
mod tests;
