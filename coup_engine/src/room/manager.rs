//! Room manager: spawns room actors and maps join codes to their handles.

use std::{collections::HashMap, sync::Arc};

use rand::seq::IndexedRandom;
use tokio::sync::RwLock;

use super::actor::{RoomActor, RoomHandle};

/// Join-code alphabet with the lookalikes (I, O, 0, 1) removed.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

/// Registry of live rooms, shared across connections.
#[derive(Clone, Default)]
pub struct RoomManager {
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
}

impl RoomManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room under a fresh join code and spawn its actor.
    pub async fn create_room(&self) -> RoomHandle {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, handle| !handle.is_closed());

        let code = loop {
            let code = generate_code();
            if !rooms.contains_key(&code) {
                break code;
            }
        };
        let (actor, handle) = RoomActor::new(code.clone());
        tokio::spawn(actor.run());
        rooms.insert(code, handle.clone());
        log::info!("created room {}", handle.code());
        handle
    }

    /// Look up a room by join code. Codes are case-insensitive on the way
    /// in; closed rooms are dropped lazily.
    pub async fn get_room(&self, code: &str) -> Option<RoomHandle> {
        let code = code.to_ascii_uppercase();
        let rooms = self.rooms.read().await;
        rooms
            .get(&code)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.values().filter(|h| !h.is_closed()).count()
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| {
            let byte = CODE_ALPHABET
                .choose(&mut rng)
                .copied()
                .unwrap_or(b'A');
            char::from(byte)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_the_restricted_alphabet() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.contains(['I', 'O', '0', '1']));
        }
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let manager = RoomManager::new();
        let handle = manager.create_room().await;
        let code = handle.code().to_ascii_lowercase();
        assert!(manager.get_room(&code).await.is_some());
        assert!(manager.get_room("NOSUCH").await.is_none());
    }
}
