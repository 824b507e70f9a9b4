//! Room actor message types.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::game::engine::GameView;
use crate::game::entities::{CardId, Character, PlayerId};
use crate::game::rules::ActionKind;

/// Chat messages are truncated to this many characters before relay.
pub const MAX_CHAT_LEN: usize = 200;

/// Errors surfaced to the requesting client for lobby operations. In-game
/// intents never produce errors; invalid ones are dropped.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomError {
    #[error("room is full")]
    RoomFull,
    #[error("game already in progress")]
    GameInProgress,
    #[error("game has not started")]
    GameNotStarted,
    #[error("only the host can do that")]
    NotHost,
    #[error("not enough players")]
    NotEnoughPlayers,
    #[error("all players must be ready")]
    NotAllReady,
    #[error("that name is taken")]
    NameTaken,
    #[error("player is not in this room")]
    UnknownPlayer,
    #[error("room is closed")]
    RoomClosed,
}

/// An in-game decision from a client. Delivered fire-and-forget; the room
/// drops anything the engine refuses.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameIntent {
    DeclareAction {
        kind: ActionKind,
        target_id: Option<PlayerId>,
    },
    Challenge,
    Block {
        character: Character,
    },
    Pass,
    LoseInfluence {
        card_id: CardId,
    },
    SelectExchange {
        keep: Vec<CardId>,
    },
}

/// Messages that can be sent to a `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Join the room lobby.
    Join {
        name: String,
        response: oneshot::Sender<Result<PlayerId, RoomError>>,
    },

    /// Leave the room. Mid-game this force-eliminates the player.
    Leave {
        player_id: PlayerId,
        response: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Toggle lobby readiness.
    SetReady {
        player_id: PlayerId,
        ready: bool,
        response: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Start the game (host only, everyone ready).
    StartGame {
        player_id: PlayerId,
        response: oneshot::Sender<Result<(), RoomError>>,
    },

    /// An in-game decision. No response channel: invalid intents vanish.
    Intent {
        player_id: PlayerId,
        intent: GameIntent,
    },

    /// Relay a chat line to everyone in the room.
    Chat {
        player_id: PlayerId,
        text: String,
    },

    /// Subscribe to push notifications for this player's connection.
    Subscribe {
        player_id: PlayerId,
        sender: mpsc::Sender<RoomEvent>,
    },

    /// The player's connection dropped without leaving.
    Disconnected {
        player_id: PlayerId,
    },

    /// The player's connection came back.
    Reconnected {
        player_id: PlayerId,
    },

    /// Fetch this player's view of the room.
    GetView {
        player_id: PlayerId,
        response: oneshot::Sender<Result<RoomView, RoomError>>,
    },
}

/// Push notifications delivered to subscribed connections. State payloads
/// are fetched separately per player so nothing leaks through a shared
/// broadcast.
#[derive(Clone, Debug)]
pub enum RoomEvent {
    /// Something changed; refetch your view.
    StateChanged,
    /// A chat line, already truncated.
    Chat(ChatMessage),
    /// Seconds remaining in the open response window.
    Timer { remaining_secs: u64 },
    /// The room shut down.
    Closed,
}

/// A relayed chat line.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub player_id: PlayerId,
    pub name: String,
    pub text: String,
    pub timestamp: i64,
}

/// One player's view of the whole room: lobby roster plus, once started,
/// their masked view of the game.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RoomView {
    pub code: String,
    pub host_id: Option<PlayerId>,
    pub players: Vec<LobbyPlayerView>,
    pub game: Option<GameView>,
    /// Present while a response window is open.
    pub window_remaining_secs: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LobbyPlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_ready: bool,
    pub is_connected: bool,
    pub is_host: bool,
}
