//! WebSocket handler for real-time room communication.
//!
//! # Connection flow
//!
//! 1. Client connects via `GET /ws/{code}?name=<name>` to join, or
//!    `GET /ws/{code}?player_id=<id>` to reconnect.
//! 2. The handler registers a subscriber channel with the room actor.
//! 3. A send task pushes per-player state views, chat lines, and countdown
//!    ticks; the receive loop forwards client commands to the actor.
//! 4. On disconnect the room is told so it can pause the player's seat.
//!
//! In-game intents never produce error responses: the room drops invalid
//! ones silently, and clients only ever learn about state through their own
//! masked view.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use coup_engine::game::{
    entities::{CardId, Character, PlayerId},
    rules::ActionKind,
};
use coup_engine::room::{
    ChatMessage, GameIntent, RoomError, RoomEvent, RoomHandle, RoomMessage, RoomView,
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    name: Option<String>,
    player_id: Option<PlayerId>,
}

/// Client messages received over the WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Toggle lobby readiness.
    Ready { ready: bool },
    /// Start the game (host only).
    StartGame,
    /// Declare an action on your turn.
    Action {
        kind: ActionKind,
        target_id: Option<PlayerId>,
    },
    /// Challenge the open claim.
    Challenge,
    /// Block the pending action.
    Block { character: Character },
    /// Pass on the open response window.
    Pass,
    /// Choose which card to reveal.
    LoseInfluence { card_id: CardId },
    /// Choose which cards to keep after an exchange.
    SelectExchange { keep: Vec<CardId> },
    /// Send a chat line.
    Chat { text: String },
    /// Leave the room for good.
    Leave,
}

/// Messages sent to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    /// Sent once after joining; carries the client's player id.
    Joined { player_id: PlayerId, code: String },
    /// Full per-player room view.
    State { view: RoomView },
    /// A relayed chat line.
    Chat { message: ChatMessage },
    /// Response-window countdown.
    Timer { remaining_secs: u64 },
    /// A lobby command failed.
    Error { message: String },
    /// The room shut down.
    RoomClosed,
}

/// Upgrade to a WebSocket for the given room. Joining requires `name`;
/// reconnecting requires `player_id`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(room) = state.rooms.get_room(&code).await else {
        return (StatusCode::NOT_FOUND, "room not found").into_response();
    };

    let player_id = match (query.player_id, query.name) {
        (Some(player_id), _) => {
            // Reconnects must name a player the room actually knows;
            // otherwise anyone could subscribe to a room's events.
            let (tx, rx) = oneshot::channel();
            let sent = room
                .send(RoomMessage::GetView {
                    player_id,
                    response: tx,
                })
                .await
                .is_ok();
            match if sent { rx.await.ok() } else { None } {
                Some(Ok(_)) => player_id,
                Some(Err(e)) => {
                    return (StatusCode::FORBIDDEN, e.to_string()).into_response();
                }
                None => {
                    return (StatusCode::GONE, "room closed").into_response();
                }
            }
        }
        (None, Some(name)) => {
            let (tx, rx) = oneshot::channel();
            let joined = room
                .send(RoomMessage::Join { name, response: tx })
                .await
                .is_ok();
            match if joined { rx.await.ok() } else { None } {
                Some(Ok(player_id)) => player_id,
                Some(Err(e)) => {
                    return (StatusCode::CONFLICT, e.to_string()).into_response();
                }
                None => {
                    return (StatusCode::GONE, "room closed").into_response();
                }
            }
        }
        (None, None) => {
            return (StatusCode::BAD_REQUEST, "name or player_id required").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, room, player_id))
}

async fn handle_socket(socket: WebSocket, room: RoomHandle, player_id: PlayerId) {
    let (mut sender, mut receiver) = socket.split();
    let code = room.code().to_string();
    info!("websocket connected: room={code}, player={player_id}");

    // Subscriber channel for push events from the room actor.
    let (event_tx, mut event_rx) = mpsc::channel::<RoomEvent>(32);
    if room
        .send(RoomMessage::Subscribe {
            player_id,
            sender: event_tx,
        })
        .await
        .is_err()
    {
        warn!("room {code} closed before subscribe");
        return;
    }
    let _ = room
        .send(RoomMessage::Reconnected { player_id })
        .await;

    // Channel for command responses produced by the receive loop.
    let (response_tx, mut response_rx) = mpsc::channel::<ServerMessage>(32);
    let _ = response_tx
        .send(ServerMessage::Joined {
            player_id,
            code: code.clone(),
        })
        .await;

    let send_room = room.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                event = event_rx.recv() => match event {
                    Some(RoomEvent::StateChanged) => {
                        match fetch_view(&send_room, player_id).await {
                            Some(view) => ServerMessage::State { view },
                            None => continue,
                        }
                    }
                    Some(RoomEvent::Chat(message)) => ServerMessage::Chat { message },
                    Some(RoomEvent::Timer { remaining_secs }) => {
                        ServerMessage::Timer { remaining_secs }
                    }
                    Some(RoomEvent::Closed) | None => ServerMessage::RoomClosed,
                },
                response = response_rx.recv() => match response {
                    Some(message) => message,
                    None => break,
                },
            };

            let closing = matches!(message, ServerMessage::RoomClosed);
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() || closing {
                break;
            }

            // A Joined response is immediately followed by a first view.
            if matches!(message, ServerMessage::Joined { .. }) {
                if let Some(view) = fetch_view(&send_room, player_id).await {
                    let Ok(json) = serde_json::to_string(&ServerMessage::State { view }) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut left = false;
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_message) => {
                        if handle_client_message(client_message, &room, player_id, &response_tx)
                            .await
                        {
                            left = true;
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("unparseable client message from {player_id}: {e}");
                        let _ = response_tx
                            .send(ServerMessage::Error {
                                message: "invalid message format".to_string(),
                            })
                            .await;
                    }
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    if !left {
        let _ = room.send(RoomMessage::Disconnected { player_id }).await;
    }
    send_task.abort();
    info!("websocket disconnected: room={code}, player={player_id}");
}

/// Forward one client message to the room. Returns true when the client
/// asked to leave and the connection should close.
async fn handle_client_message(
    message: ClientMessage,
    room: &RoomHandle,
    player_id: PlayerId,
    response_tx: &mpsc::Sender<ServerMessage>,
) -> bool {
    match message {
        ClientMessage::Ready { ready } => {
            let (tx, rx) = oneshot::channel();
            let _ = room
                .send(RoomMessage::SetReady {
                    player_id,
                    ready,
                    response: tx,
                })
                .await;
            relay_result(rx, response_tx).await;
        }
        ClientMessage::StartGame => {
            let (tx, rx) = oneshot::channel();
            let _ = room
                .send(RoomMessage::StartGame {
                    player_id,
                    response: tx,
                })
                .await;
            relay_result(rx, response_tx).await;
        }
        ClientMessage::Action { kind, target_id } => {
            send_intent(room, player_id, GameIntent::DeclareAction { kind, target_id }).await;
        }
        ClientMessage::Challenge => {
            send_intent(room, player_id, GameIntent::Challenge).await;
        }
        ClientMessage::Block { character } => {
            send_intent(room, player_id, GameIntent::Block { character }).await;
        }
        ClientMessage::Pass => {
            send_intent(room, player_id, GameIntent::Pass).await;
        }
        ClientMessage::LoseInfluence { card_id } => {
            send_intent(room, player_id, GameIntent::LoseInfluence { card_id }).await;
        }
        ClientMessage::SelectExchange { keep } => {
            send_intent(room, player_id, GameIntent::SelectExchange { keep }).await;
        }
        ClientMessage::Chat { text } => {
            let _ = room.send(RoomMessage::Chat { player_id, text }).await;
        }
        ClientMessage::Leave => {
            let (tx, _rx) = oneshot::channel();
            let _ = room
                .send(RoomMessage::Leave {
                    player_id,
                    response: tx,
                })
                .await;
            return true;
        }
    }
    false
}

async fn send_intent(room: &RoomHandle, player_id: PlayerId, intent: GameIntent) {
    let _ = room.send(RoomMessage::Intent { player_id, intent }).await;
}

async fn relay_result(
    rx: oneshot::Receiver<Result<(), RoomError>>,
    response_tx: &mpsc::Sender<ServerMessage>,
) {
    if let Ok(Err(e)) = rx.await {
        let _ = response_tx
            .send(ServerMessage::Error {
                message: e.to_string(),
            })
            .await;
    }
}

async fn fetch_view(room: &RoomHandle, player_id: PlayerId) -> Option<RoomView> {
    let (tx, rx) = oneshot::channel();
    room.send(RoomMessage::GetView {
        player_id,
        response: tx,
    })
    .await
    .ok()?;
    rx.await.ok()?.ok()
}
