//! Room actor: owns one room's lobby roster and game state, serializing
//! every mutation through its message inbox.
//!
//! Each room runs in its own Tokio task. A one-second interval drives the
//! response-window countdown; everything else arrives as a [`RoomMessage`].
//! Because the actor is the only writer, no two mutations for the same room
//! are ever in flight concurrently.

use std::collections::HashMap;

use chrono::Utc;
use tokio::{
    sync::mpsc,
    time::{interval, Duration},
};
use uuid::Uuid;

use super::messages::{
    ChatMessage, GameIntent, LobbyPlayerView, RoomError, RoomEvent, RoomMessage, RoomView,
    MAX_CHAT_LEN,
};
use crate::game::engine::{GameState, Phase};
use crate::game::entities::{
    Player, PlayerId, DISCONNECT_GRACE_SECS, MAX_PLAYERS, MIN_PLAYERS, RESPONSE_WINDOW_SECS,
};

/// Cloneable handle for sending messages to a room.
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    code: String,
}

impl RoomHandle {
    pub fn new(sender: mpsc::Sender<RoomMessage>, code: String) -> Self {
        Self { sender, code }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Whether the actor behind this handle has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn send(&self, message: RoomMessage) -> Result<(), RoomError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| RoomError::RoomClosed)
    }
}

/// Countdown for the open response window, keyed by the phase that opened
/// it so a block arriving mid-window restarts the clock.
struct ResponseWindow {
    phase: Phase,
    remaining_secs: u64,
}

/// Actor managing a single room.
pub struct RoomActor {
    code: String,
    host_id: Option<PlayerId>,
    roster: Vec<Player>,
    game: Option<GameState>,
    window: Option<ResponseWindow>,
    /// Seconds left before a disconnected player is treated as departed.
    disconnect_deadlines: HashMap<PlayerId, u64>,
    inbox: mpsc::Receiver<RoomMessage>,
    subscribers: HashMap<PlayerId, mpsc::Sender<RoomEvent>>,
    is_closed: bool,
}

impl RoomActor {
    #[must_use]
    pub fn new(code: String) -> (Self, RoomHandle) {
        let (sender, inbox) = mpsc::channel(100);
        let handle = RoomHandle::new(sender, code.clone());
        let actor = Self {
            code,
            host_id: None,
            roster: Vec::new(),
            game: None,
            window: None,
            disconnect_deadlines: HashMap::new(),
            inbox,
            subscribers: HashMap::new(),
            is_closed: false,
        };
        (actor, handle)
    }

    /// Run the room event loop until the room empties out.
    pub async fn run(mut self) {
        log::info!("room {} starting", self.code);
        let mut tick_interval = interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                message = self.inbox.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => break,
                    }
                    if self.is_closed {
                        break;
                    }
                }
                _ = tick_interval.tick() => {
                    self.tick();
                }
            }
        }

        self.broadcast(RoomEvent::Closed);
        log::info!("room {} closed", self.code);
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join { name, response } => {
                let _ = response.send(self.handle_join(name));
            }
            RoomMessage::Leave {
                player_id,
                response,
            } => {
                let _ = response.send(self.handle_leave(player_id));
            }
            RoomMessage::SetReady {
                player_id,
                ready,
                response,
            } => {
                let _ = response.send(self.handle_set_ready(player_id, ready));
            }
            RoomMessage::StartGame {
                player_id,
                response,
            } => {
                let _ = response.send(self.handle_start(player_id));
            }
            RoomMessage::Intent { player_id, intent } => {
                self.handle_intent(player_id, intent);
            }
            RoomMessage::Chat { player_id, text } => {
                self.handle_chat(player_id, text);
            }
            RoomMessage::Subscribe { player_id, sender } => {
                self.subscribers.insert(player_id, sender);
            }
            RoomMessage::Disconnected { player_id } => {
                self.subscribers.remove(&player_id);
                self.set_connected(player_id, false);
                // A dropped connection mid-game gets a grace period to come
                // back before the player counts as having left.
                if self.game.as_ref().is_some_and(|g| {
                    g.winner.is_none() && g.player(player_id).is_some_and(|p| p.is_alive)
                }) {
                    self.disconnect_deadlines
                        .insert(player_id, DISCONNECT_GRACE_SECS);
                }
                self.broadcast(RoomEvent::StateChanged);
            }
            RoomMessage::Reconnected { player_id } => {
                self.disconnect_deadlines.remove(&player_id);
                self.set_connected(player_id, true);
                self.broadcast(RoomEvent::StateChanged);
            }
            RoomMessage::GetView {
                player_id,
                response,
            } => {
                let _ = response.send(self.view_for(player_id));
            }
        }
    }

    fn handle_join(&mut self, name: String) -> Result<PlayerId, RoomError> {
        if self.game.as_ref().is_some_and(|g| g.winner.is_none()) {
            return Err(RoomError::GameInProgress);
        }
        if self.roster.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull);
        }
        if self
            .roster
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(&name))
        {
            return Err(RoomError::NameTaken);
        }
        let player = Player::new(name);
        let id = player.id;
        self.roster.push(player);
        if self.host_id.is_none() {
            self.host_id = Some(id);
        }
        self.broadcast(RoomEvent::StateChanged);
        Ok(id)
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        let index = self
            .roster
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(RoomError::UnknownPlayer)?;
        self.roster.remove(index);
        self.subscribers.remove(&player_id);
        self.disconnect_deadlines.remove(&player_id);

        if let Some(game) = &mut self.game {
            game.handle_departure(player_id);
        }
        if self.host_id == Some(player_id) {
            self.host_id = self.roster.first().map(|p| p.id);
        }
        if self.roster.is_empty() {
            self.is_closed = true;
        }
        self.sync_window();
        self.broadcast(RoomEvent::StateChanged);
        Ok(())
    }

    fn handle_set_ready(&mut self, player_id: PlayerId, ready: bool) -> Result<(), RoomError> {
        if self.game.as_ref().is_some_and(|g| g.winner.is_none()) {
            return Err(RoomError::GameInProgress);
        }
        let player = self
            .roster
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or(RoomError::UnknownPlayer)?;
        player.is_ready = ready;
        self.broadcast(RoomEvent::StateChanged);
        Ok(())
    }

    fn handle_start(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        if self.host_id != Some(player_id) {
            return Err(RoomError::NotHost);
        }
        if self.game.as_ref().is_some_and(|g| g.winner.is_none()) {
            return Err(RoomError::GameInProgress);
        }
        if self.roster.len() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers);
        }
        // The host starting the game counts as their own ready signal.
        if !self
            .roster
            .iter()
            .all(|p| p.is_ready || Some(p.id) == self.host_id)
        {
            return Err(RoomError::NotAllReady);
        }

        self.game = Some(GameState::new(&self.roster));
        self.window = None;
        self.disconnect_deadlines.clear();
        // Ready flags are spent; a rematch needs everyone to ready up again.
        for player in &mut self.roster {
            player.is_ready = false;
        }
        log::info!(
            "room {} started a game with {} players",
            self.code,
            self.roster.len()
        );
        self.broadcast(RoomEvent::StateChanged);
        Ok(())
    }

    /// Apply an in-game intent. Refusals are logged at debug and dropped;
    /// the sender learns nothing and nobody else sees anything.
    fn handle_intent(&mut self, player_id: PlayerId, intent: GameIntent) {
        let Some(game) = &mut self.game else {
            return;
        };
        if game.winner.is_some() {
            return;
        }

        let result = match intent {
            GameIntent::DeclareAction { kind, target_id } => {
                game.declare_action(player_id, kind, target_id)
            }
            GameIntent::Challenge => game.challenge(player_id).map(|_| ()),
            GameIntent::Block { character } => game.declare_block(player_id, character),
            GameIntent::Pass => match game.pass(player_id) {
                Ok(all_passed) => {
                    if all_passed {
                        game.resolve_window();
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
            GameIntent::LoseInfluence { card_id } => {
                game.lose_influence(player_id, card_id).map(|_| ())
            }
            GameIntent::SelectExchange { keep } => game.complete_exchange(player_id, &keep),
        };

        match result {
            Ok(()) => {
                self.sync_window();
                self.broadcast(RoomEvent::StateChanged);
            }
            Err(e) => {
                log::debug!("room {}: dropped intent from {player_id}: {e}", self.code);
            }
        }
    }

    fn handle_chat(&mut self, player_id: PlayerId, text: String) {
        let Some(name) = self
            .roster
            .iter()
            .find(|p| p.id == player_id)
            .map(|p| p.name.clone())
        else {
            return;
        };
        let text: String = text.chars().take(MAX_CHAT_LEN).collect();
        if text.is_empty() {
            return;
        }
        self.broadcast(RoomEvent::Chat(ChatMessage {
            id: Uuid::new_v4(),
            player_id,
            name,
            text,
            timestamp: Utc::now().timestamp_millis(),
        }));
    }

    fn set_connected(&mut self, player_id: PlayerId, connected: bool) {
        if let Some(player) = self.roster.iter_mut().find(|p| p.id == player_id) {
            player.is_connected = connected;
        }
        let mut resolved = false;
        if let Some(game) = &mut self.game {
            game.set_connected(player_id, connected);
            // The departing connection may have been the last holdout on an
            // open window.
            if !connected && self.window.is_some() && game.all_relevant_passed() {
                game.resolve_window();
                resolved = true;
            }
        }
        if resolved {
            self.sync_window();
        }
    }

    /// Arm or clear the countdown to match the game phase. A window opens
    /// fresh whenever the phase that needs one changes.
    fn sync_window(&mut self) {
        let phase = self.game.as_ref().map(|g| g.phase);
        match phase {
            Some(phase @ (Phase::ActionResponse | Phase::BlockResponse)) => {
                if self.window.as_ref().is_none_or(|w| w.phase != phase) {
                    self.window = Some(ResponseWindow {
                        phase,
                        remaining_secs: RESPONSE_WINDOW_SECS,
                    });
                    self.broadcast(RoomEvent::Timer {
                        remaining_secs: RESPONSE_WINDOW_SECS,
                    });
                }
            }
            _ => self.window = None,
        }
    }

    /// One second elapsed. Count down the disconnect grace periods and the
    /// open window, resolving the window by default when it expires.
    fn tick(&mut self) {
        self.tick_disconnects();
        let Some(window) = &mut self.window else {
            return;
        };
        window.remaining_secs = window.remaining_secs.saturating_sub(1);
        let remaining = window.remaining_secs;
        if remaining == 0 {
            self.window = None;
            if let Some(game) = &mut self.game {
                log::debug!("room {}: response window expired", self.code);
                game.resolve_window();
            }
            self.sync_window();
            self.broadcast(RoomEvent::StateChanged);
        } else {
            self.broadcast(RoomEvent::Timer {
                remaining_secs: remaining,
            });
        }
    }

    /// Count the disconnect grace periods down; whoever reaches zero is
    /// handled as a departure so an owed reveal cannot park the game.
    fn tick_disconnects(&mut self) {
        if self.disconnect_deadlines.is_empty() {
            return;
        }
        let mut timed_out = Vec::new();
        self.disconnect_deadlines.retain(|player_id, secs| {
            *secs = secs.saturating_sub(1);
            if *secs == 0 {
                timed_out.push(*player_id);
                false
            } else {
                true
            }
        });
        if timed_out.is_empty() {
            return;
        }
        if let Some(game) = &mut self.game {
            for player_id in timed_out {
                log::info!(
                    "room {}: {player_id} timed out while disconnected",
                    self.code
                );
                game.handle_departure(player_id);
            }
        }
        self.sync_window();
        self.broadcast(RoomEvent::StateChanged);
    }

    fn view_for(&self, player_id: PlayerId) -> Result<RoomView, RoomError> {
        if !self.roster.iter().any(|p| p.id == player_id) {
            return Err(RoomError::UnknownPlayer);
        }
        Ok(RoomView {
            code: self.code.clone(),
            host_id: self.host_id,
            players: self
                .roster
                .iter()
                .map(|p| LobbyPlayerView {
                    id: p.id,
                    name: p.name.clone(),
                    is_ready: p.is_ready,
                    is_connected: p.is_connected,
                    is_host: self.host_id == Some(p.id),
                })
                .collect(),
            game: self.game.as_ref().map(|g| g.view_for(player_id)),
            window_remaining_secs: self.window.as_ref().map(|w| w.remaining_secs),
        })
    }

    /// Push an event to every subscriber, dropping the ones that went away.
    fn broadcast(&mut self, event: RoomEvent) {
        self.subscribers.retain(|player_id, sender| {
            match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("subscriber {player_id} channel full, dropping event");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}
