//! Core game entities: characters, cards, players, the deck, and the log.

use std::fmt;

use chrono::Utc;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const COPIES_PER_CHARACTER: usize = 3;
pub const DECK_SIZE: usize = COPIES_PER_CHARACTER * 5;
pub const CARDS_PER_PLAYER: usize = 2;
pub const STARTING_COINS: Coins = 2;
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;
/// Holding this many coins (or more) forces a coup.
pub const FORCED_COUP_THRESHOLD: Coins = 10;
pub const RESPONSE_WINDOW_SECS: u64 = 30;
/// How long a disconnected player may linger mid-game before they are
/// treated as having left.
pub const DISCONNECT_GRACE_SECS: u64 = 60;

/// Type alias for coin counts. Coins never go negative; all debits are
/// bounded by the holder's balance before they're applied.
pub type Coins = u32;

pub type PlayerId = Uuid;
pub type CardId = Uuid;

/// The five character kinds in the court deck.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Character {
    Duke,
    Assassin,
    Captain,
    Ambassador,
    Contessa,
}

impl Character {
    pub const ALL: [Self; 5] = [
        Self::Duke,
        Self::Assassin,
        Self::Captain,
        Self::Ambassador,
        Self::Contessa,
    ];
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Duke => "Duke",
            Self::Assassin => "Assassin",
            Self::Captain => "Captain",
            Self::Ambassador => "Ambassador",
            Self::Contessa => "Contessa",
        };
        write!(f, "{repr}")
    }
}

/// A single influence card. Identity is fixed at creation; `is_revealed`
/// flips false -> true exactly once, when the influence is lost.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Card {
    pub id: CardId,
    pub character: Character,
    pub is_revealed: bool,
}

impl Card {
    #[must_use]
    pub fn new(character: Character) -> Self {
        Self {
            id: Uuid::new_v4(),
            character,
            is_revealed: false,
        }
    }
}

/// A card as seen by a particular viewer. `character` is `None` for another
/// player's unrevealed card.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CardView {
    pub id: CardId,
    pub character: Option<Character>,
    pub is_revealed: bool,
}

impl Card {
    /// Project this card for a viewer. Owners see their own cards; everyone
    /// sees revealed cards; everything else is masked.
    #[must_use]
    pub fn view(&self, visible: bool) -> CardView {
        CardView {
            id: self.id,
            character: if visible || self.is_revealed {
                Some(self.character)
            } else {
                None
            },
            is_revealed: self.is_revealed,
        }
    }
}

/// The court deck: three copies of each character, shuffled on creation and
/// reshuffled whenever a card is returned so card positions leak nothing.
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Default for Deck {
    fn default() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for character in Character::ALL {
            for _ in 0..COPIES_PER_CHARACTER {
                cards.push(Card::new(character));
            }
        }
        let mut deck = Self { cards };
        deck.shuffle();
        deck
    }
}

impl Deck {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut rand::rng());
    }

    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Return a card to the deck and reshuffle.
    pub fn put_back(&mut self, mut card: Card) {
        card.is_revealed = false;
        self.cards.push(card);
        self.shuffle();
    }

    /// Return several cards at once with a single reshuffle.
    pub fn return_cards(&mut self, cards: Vec<Card>) {
        for mut card in cards {
            card.is_revealed = false;
            self.cards.push(card);
        }
        self.shuffle();
    }

    /// Build a deck with an exact card sequence; the back of the vector is
    /// the top of the deck. For tests and tools needing a deterministic
    /// deal.
    #[must_use]
    pub fn stacked(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Count how many copies of `character` remain un-dealt. Test-side
    /// conservation checks need this; gameplay never does.
    #[must_use]
    pub fn count_of(&self, character: Character) -> usize {
        self.cards
            .iter()
            .filter(|c| c.character == character)
            .count()
    }
}

/// A participant in a game. The two card slots persist after reveals; a
/// player is alive exactly while at least one slot is unrevealed.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub coins: Coins,
    pub cards: Vec<Card>,
    pub is_alive: bool,
    pub is_connected: bool,
    pub is_ready: bool,
}

impl Player {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            coins: STARTING_COINS,
            cards: Vec::with_capacity(CARDS_PER_PLAYER),
            is_alive: true,
            is_connected: true,
            is_ready: false,
        }
    }

    /// Number of unrevealed cards left.
    #[must_use]
    pub fn influence(&self) -> usize {
        self.cards.iter().filter(|c| !c.is_revealed).count()
    }

    pub fn unrevealed_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|c| !c.is_revealed)
    }

    /// Whether this player truly holds an unrevealed card of `character`.
    /// This is the bluff test at the heart of challenge resolution.
    #[must_use]
    pub fn holds(&self, character: Character) -> bool {
        self.cards
            .iter()
            .any(|c| c.character == character && !c.is_revealed)
    }
}

/// Audit-trail entry kinds, matching how clients color the game log.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Action,
    Challenge,
    Block,
    System,
    Elimination,
}

/// Append-only game log entry, visible identically to all players.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: i64,
    pub message: String,
    pub kind: LogKind,
}

impl LogEntry {
    #[must_use]
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now().timestamp_millis(),
            message: message.into(),
            kind,
        }
    }
}
