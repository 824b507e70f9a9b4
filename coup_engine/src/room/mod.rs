//! Room layer: one async actor per room, a registry keyed by join code,
//! and the message protocol between connections and rooms.
//!
//! Each room runs in its own Tokio task with an mpsc inbox. Connections
//! talk to rooms exclusively through [`RoomHandle`]; push notifications
//! flow back over per-connection subscriber channels.

pub mod actor;
pub mod manager;
pub mod messages;

pub use actor::{RoomActor, RoomHandle};
pub use manager::RoomManager;
pub use messages::{
    ChatMessage, GameIntent, LobbyPlayerView, RoomError, RoomEvent, RoomMessage, RoomView,
};
