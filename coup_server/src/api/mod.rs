//! HTTP/WebSocket API for the Coup server.
//!
//! The HTTP surface is intentionally small: rooms are created and looked up
//! over REST, then everything else happens over the WebSocket.
//!
//! ```text
//! GET  /health                 - Health check
//! GET  /api/characters         - Static character ability reference
//! POST /api/rooms              - Create a room, returns its join code
//! GET  /api/rooms/{code}       - Check whether a room exists
//! GET  /ws/{code}?name=<name>  - Join the room and open the WebSocket
//! GET  /ws/{code}?player_id=.. - Reconnect an existing player
//! ```

pub mod websocket;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use coup_engine::game::entities::Character;
use coup_engine::room::RoomManager;
use serde_json::json;
use tower_http::cors::CorsLayer;

/// Application state shared across handlers and WebSocket connections.
/// Cloning is cheap; the manager is all `Arc` inside.
#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomManager,
    pub max_rooms: usize,
}

/// Create the API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/characters", get(list_characters))
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/{code}", get(get_room))
        .route("/ws/{code}", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Static reference data for client card galleries.
async fn list_characters() -> impl IntoResponse {
    let characters: Vec<_> = Character::ALL
        .into_iter()
        .map(|character| {
            let info = character.info();
            json!({
                "character": character,
                "name": info.name,
                "ability": info.ability,
                "block_ability": info.block_ability,
            })
        })
        .collect();
    Json(json!({ "characters": characters }))
}

async fn create_room(State(state): State<AppState>) -> impl IntoResponse {
    if state.rooms.room_count().await >= state.max_rooms {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "room limit reached" })),
        );
    }
    let handle = state.rooms.create_room().await;
    (StatusCode::CREATED, Json(json!({ "code": handle.code() })))
}

async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> impl IntoResponse {
    match state.rooms.get_room(&code).await {
        Some(handle) => (
            StatusCode::OK,
            Json(json!({ "code": handle.code() })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "room not found" })),
        ),
    }
}
