//! Game engine core: entities, the static rules table, and the resolution
//! engine that drives a game from first deal to winner.

pub mod engine;
pub mod entities;
pub mod rules;

pub use engine::{
    ChallengeVerdict, GameState, GameView, IntentError, PendingAction, PendingBlock, Phase,
    PlayerView, ResolutionOutcome,
};
pub use entities::{
    Card, CardId, CardView, Character, Coins, Deck, LogEntry, LogKind, Player, PlayerId,
};
pub use rules::{ActionKind, ActionRules, CharacterInfo};
