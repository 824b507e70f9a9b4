//! # Coup Engine
//!
//! The authoritative server-side engine for the social deduction card game
//! Coup (2-6 players).
//!
//! The engine is split in two layers:
//!
//! - [`game`]: pure in-memory game logic. Entities (characters, cards,
//!   players, the court deck), the static rules table, and a resolution
//!   engine that validates actions, resolves challenge/block chains,
//!   applies effects, and detects the winner. Hidden information only ever
//!   leaves this layer through per-player views.
//! - [`room`]: the async boundary. One actor per room serializes every
//!   mutation, drives the 30-second response-window countdown, and pushes
//!   change notifications to subscribed connections. A [`RoomManager`]
//!   maps six-character join codes to live rooms.
//!
//! ## Example
//!
//! ```
//! use coup_engine::game::{ActionKind, GameState, Player};
//!
//! let roster = vec![Player::new("alice"), Player::new("bob")];
//! let mut game = GameState::new(&roster);
//! let first = game.current_player().id;
//! game.declare_action(first, ActionKind::Income, None).unwrap();
//! ```

/// Core game logic: entities, rules table, resolution engine.
pub mod game;
pub use game::{
    entities::{self, MAX_PLAYERS, MIN_PLAYERS, RESPONSE_WINDOW_SECS},
    rules, ActionKind, GameState, GameView, IntentError, Phase, Player, PlayerId,
};

/// Async room layer: per-room actors and the join-code registry.
pub mod room;
pub use room::{GameIntent, RoomError, RoomEvent, RoomHandle, RoomManager, RoomMessage, RoomView};
