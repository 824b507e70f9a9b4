//! The resolution engine: validates declared actions, resolves
//! challenge/block chains, applies effects, and detects game over.
//!
//! All mutation happens through the methods on [`GameState`]. Invalid intents
//! come back as [`IntentError`] and leave the state untouched; callers are
//! expected to drop them silently since they are almost always a client
//! racing a phase change, not a fault.

use std::collections::{HashMap, HashSet};

use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entities::{
    Card, CardId, CardView, Character, Coins, Deck, LogEntry, LogKind, Player, PlayerId,
    CARDS_PER_PLAYER, FORCED_COUP_THRESHOLD, STARTING_COINS,
};
use super::rules::ActionKind;

/// Phases of a single turn. `GameOver` is absorbing.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    ActionSelect,
    ActionResponse,
    ChallengeResolution,
    BlockResponse,
    LoseInfluence,
    ExchangeSelect,
    GameOver,
}

/// Reasons an intent is refused. None of these mutate state and none of
/// them are surfaced to other players.
#[derive(Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum IntentError {
    #[error("player does not exist")]
    UnknownPlayer,
    #[error("player is eliminated")]
    NotAlive,
    #[error("not this player's turn")]
    OutOfTurn,
    #[error("intent does not match the current phase")]
    WrongPhase,
    #[error("need {cost} coins")]
    InsufficientCoins { cost: Coins },
    #[error("10+ coins, must coup")]
    CoupForced,
    #[error("action requires a target")]
    MissingTarget,
    #[error("invalid target")]
    InvalidTarget,
    #[error("that character does not block this action")]
    CannotBlock,
    #[error("cannot respond to your own claim")]
    SelfResponse,
    #[error("a different player owes this decision")]
    WrongPlayer,
    #[error("card not found in hand")]
    UnknownCard,
    #[error("kept cards must match remaining influence")]
    BadExchangeSelection,
}

/// An action that has been declared but not yet resolved. Everything else
/// about it (cost, blockers, claim) comes from the static rules table via
/// [`ActionKind::rules`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub player_id: PlayerId,
    pub target_id: Option<PlayerId>,
}

/// A declared block, alive only during `BlockResponse`.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct PendingBlock {
    pub player_id: PlayerId,
    pub claimed_character: Character,
}

/// Outcome of a challenge: did the challenger catch a bluff?
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChallengeVerdict {
    /// The claim was true. The claimant swapped the shown card for a fresh
    /// one and the challenger owes an influence.
    Failed,
    /// The claim was a bluff. The claimant owes an influence.
    Succeeded,
}

/// What an influence reveal settled, consumed by the room orchestrator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolutionOutcome {
    /// The pending action survived its challenge/block chain and executed.
    /// The phase may now be parked again (`LoseInfluence`, `ExchangeSelect`)
    /// if the action itself needs further input.
    ActionProceeded,
    /// The pending action (or the challenged block's underlying action) was
    /// canceled; the turn advanced.
    ActionCanceled,
    /// The reveal settled a coup or assassination; the turn advanced.
    TurnAdvanced,
    /// The reveal eliminated the second-to-last player.
    GameOver,
}

/// The canonical per-room game snapshot. One instance per started room,
/// mutated only by the owning room actor.
#[derive(Debug)]
pub struct GameState {
    pub players: Vec<Player>,
    pub current_player_index: usize,
    pub phase: Phase,
    deck: Deck,
    pub pending_action: Option<PendingAction>,
    pub pending_block: Option<PendingBlock>,
    pub challenger_id: Option<PlayerId>,
    pub player_losing_influence: Option<PlayerId>,
    pub exchange_cards: Vec<Card>,
    pub winner: Option<PlayerId>,
    pub game_log: Vec<LogEntry>,
    pub passed_players: HashSet<PlayerId>,
}

impl GameState {
    /// Start a game for the given roster. Turn order is the roster order and
    /// stays fixed for the whole game. Coins and hands are reset; lobby
    /// ready flags are irrelevant from here on.
    #[must_use]
    pub fn new(roster: &[Player]) -> Self {
        Self::with_deck(roster, Deck::new())
    }

    /// Start a game drawing from a caller-supplied deck. The top of the
    /// deck is the back of its card sequence. `Deck::new` shuffles, so use
    /// [`Deck::stacked`] when a deterministic deal is needed.
    #[must_use]
    pub fn with_deck(roster: &[Player], mut deck: Deck) -> Self {
        let players = roster
            .iter()
            .map(|p| {
                let mut cards = Vec::with_capacity(CARDS_PER_PLAYER);
                for _ in 0..CARDS_PER_PLAYER {
                    match deck.draw() {
                        Some(card) => cards.push(card),
                        None => error!("deck underflow during initial deal"),
                    }
                }
                Player {
                    id: p.id,
                    name: p.name.clone(),
                    coins: STARTING_COINS,
                    cards,
                    is_alive: true,
                    is_connected: p.is_connected,
                    is_ready: p.is_ready,
                }
            })
            .collect();

        let mut state = Self {
            players,
            current_player_index: 0,
            phase: Phase::ActionSelect,
            deck,
            pending_action: None,
            pending_block: None,
            challenger_id: None,
            player_losing_influence: None,
            exchange_cards: Vec::new(),
            winner: None,
            game_log: Vec::new(),
            passed_players: HashSet::new(),
        };
        state.log(LogKind::System, "Game started!");
        state
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    #[must_use]
    pub fn current_player(&self) -> &Player {
        &self.players[self.current_player_index]
    }

    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive).count()
    }

    #[must_use]
    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    fn log(&mut self, kind: LogKind, message: impl Into<String>) {
        self.game_log.push(LogEntry::new(kind, message));
    }

    fn player_name(&self, id: PlayerId) -> String {
        self.player(id)
            .map_or_else(|| "unknown".to_string(), |p| p.name.clone())
    }

    fn next_alive_index(&self, from: usize) -> usize {
        let mut index = (from + 1) % self.players.len();
        while !self.players[index].is_alive {
            index = (index + 1) % self.players.len();
        }
        index
    }

    /// Move to the next alive player and reset all per-turn interaction
    /// state.
    pub fn advance_turn(&mut self) {
        if self.alive_count() == 0 {
            error!("advance_turn with no alive players");
            return;
        }
        self.current_player_index = self.next_alive_index(self.current_player_index);
        self.phase = Phase::ActionSelect;
        self.pending_action = None;
        self.pending_block = None;
        self.challenger_id = None;
        self.player_losing_influence = None;
        self.exchange_cards.clear();
        self.passed_players.clear();
    }

    /// Record the winner once exactly one player remains alive.
    pub fn check_for_winner(&mut self) {
        if self.winner.is_some() {
            return;
        }
        let mut alive = self.players.iter().filter(|p| p.is_alive);
        if let (Some(last), None) = (alive.next(), alive.next()) {
            let (id, name) = (last.id, last.name.clone());
            self.winner = Some(id);
            self.phase = Phase::GameOver;
            self.log(LogKind::System, format!("{name} wins the game!"));
        }
    }

    /// Check every precondition for declaring `kind`, without mutating
    /// anything. Each failure is a distinct refusal.
    pub fn validate_action(
        &self,
        player_id: PlayerId,
        kind: ActionKind,
        target_id: Option<PlayerId>,
    ) -> Result<(), IntentError> {
        let player = self.player(player_id).ok_or(IntentError::UnknownPlayer)?;
        if !player.is_alive {
            return Err(IntentError::NotAlive);
        }

        let rules = kind.rules();
        if player.coins < rules.cost {
            return Err(IntentError::InsufficientCoins { cost: rules.cost });
        }
        if player.coins >= FORCED_COUP_THRESHOLD && kind != ActionKind::Coup {
            return Err(IntentError::CoupForced);
        }

        if rules.needs_target {
            let target_id = target_id.ok_or(IntentError::MissingTarget)?;
            let target = self.player(target_id).ok_or(IntentError::InvalidTarget)?;
            if !target.is_alive || target.id == player_id {
                return Err(IntentError::InvalidTarget);
            }
            if kind == ActionKind::Steal && target.coins == 0 {
                return Err(IntentError::InvalidTarget);
            }
        }

        Ok(())
    }

    /// Convenience predicate over [`Self::validate_action`].
    #[must_use]
    pub fn can_perform_action(
        &self,
        player_id: PlayerId,
        kind: ActionKind,
        target_id: Option<PlayerId>,
    ) -> bool {
        self.validate_action(player_id, kind, target_id).is_ok()
    }

    /// Declare an action on the acting player's turn. Income and Coup
    /// resolve immediately; every other action parks in `ActionResponse`
    /// and waits for the response window.
    pub fn declare_action(
        &mut self,
        player_id: PlayerId,
        kind: ActionKind,
        target_id: Option<PlayerId>,
    ) -> Result<(), IntentError> {
        if self.phase != Phase::ActionSelect {
            return Err(IntentError::WrongPhase);
        }
        if self.current_player().id != player_id {
            return Err(IntentError::OutOfTurn);
        }
        self.validate_action(player_id, kind, target_id)?;

        let rules = kind.rules();
        self.pending_action = Some(PendingAction {
            kind,
            player_id,
            target_id,
        });

        let actor = self.player_name(player_id);
        let message = match target_id.filter(|_| rules.needs_target) {
            Some(target) => format!("{actor} attempts {kind} on {}", self.player_name(target)),
            None => format!("{actor} attempts {kind}"),
        };
        self.log(LogKind::Action, message);

        if rules.resolves_immediately() {
            self.execute_pending();
        } else {
            self.phase = Phase::ActionResponse;
            self.passed_players.clear();
        }
        Ok(())
    }

    /// Apply the pending action's effect. Called at declaration for
    /// unrespondable actions, and again after a response window or
    /// challenge chain lets the action through (deferred execution).
    pub fn execute_pending(&mut self) {
        let Some(action) = self.pending_action else {
            return;
        };
        if self.player(action.player_id).is_none() {
            error!("pending action actor missing from game");
            self.advance_turn();
            return;
        }
        let cost = action.kind.rules().cost;
        let mut actor = String::new();
        if let Some(player) = self.player_mut(action.player_id) {
            player.coins -= cost;
            actor = player.name.clone();
        }

        match action.kind {
            ActionKind::Income => {
                self.current_actor_gains(action.player_id, 1);
                self.log(LogKind::Action, format!("{actor} takes income (+1 coin)"));
                self.advance_turn();
            }
            ActionKind::ForeignAid => {
                self.current_actor_gains(action.player_id, 2);
                self.log(
                    LogKind::Action,
                    format!("{actor} takes foreign aid (+2 coins)"),
                );
                self.advance_turn();
            }
            ActionKind::Tax => {
                self.current_actor_gains(action.player_id, 3);
                self.log(LogKind::Action, format!("{actor} collects tax (+3 coins)"));
                self.advance_turn();
            }
            ActionKind::Coup | ActionKind::Assassinate => {
                // The target picks which card to reveal, so execution parks
                // here. A target eliminated earlier in the chain absorbs the
                // hit with no further loss.
                let target = action
                    .target_id
                    .and_then(|id| self.player(id))
                    .filter(|t| t.is_alive)
                    .map(|t| (t.id, t.name.clone()));
                match target {
                    Some((target_id, target_name)) => {
                        let verb = if action.kind == ActionKind::Coup {
                            format!("{actor} launches a coup against {target_name}")
                        } else {
                            format!("{actor} assassinates {target_name}")
                        };
                        self.log(LogKind::Action, verb);
                        self.player_losing_influence = Some(target_id);
                        self.phase = Phase::LoseInfluence;
                        self.passed_players.clear();
                    }
                    None => self.advance_turn(),
                }
            }
            ActionKind::Steal => {
                let stolen = action
                    .target_id
                    .and_then(|id| self.player_mut(id))
                    .map_or(0, |target| {
                        let stolen = target.coins.min(2);
                        target.coins -= stolen;
                        stolen
                    });
                self.current_actor_gains(action.player_id, stolen);
                let target = action.target_id.map_or_else(String::new, |id| self.player_name(id));
                self.log(
                    LogKind::Action,
                    format!("{actor} steals {stolen} coins from {target}"),
                );
                self.advance_turn();
            }
            ActionKind::Exchange => {
                let mut drawn = Vec::with_capacity(2);
                for _ in 0..2 {
                    match self.deck.draw() {
                        Some(card) => drawn.push(card),
                        None => error!("deck underflow during exchange draw"),
                    }
                }
                let Some(player) = self.player_mut(action.player_id) else {
                    return;
                };
                let mut buffer: Vec<Card> = Vec::with_capacity(CARDS_PER_PLAYER + 2);
                player.cards.retain_mut(|card| {
                    if card.is_revealed {
                        true
                    } else {
                        buffer.push(card.clone());
                        false
                    }
                });
                buffer.extend(drawn);
                self.exchange_cards = buffer;
                self.phase = Phase::ExchangeSelect;
                self.log(
                    LogKind::Action,
                    format!("{actor} exchanges cards with the deck"),
                );
            }
        }
    }

    fn current_actor_gains(&mut self, player_id: PlayerId, amount: Coins) {
        if let Some(player) = self.player_mut(player_id) {
            player.coins += amount;
        }
    }

    /// Challenge the open claim: the pending action's implicit character in
    /// `ActionResponse`, or the block's claimed character in
    /// `BlockResponse`. A successful challenge voids the claim.
    pub fn challenge(&mut self, challenger_id: PlayerId) -> Result<ChallengeVerdict, IntentError> {
        let challenger = self
            .player(challenger_id)
            .ok_or(IntentError::UnknownPlayer)?;
        if !challenger.is_alive {
            return Err(IntentError::NotAlive);
        }

        let (claimed, claimant_id) = match self.phase {
            Phase::ActionResponse => {
                let action = self.pending_action.ok_or(IntentError::WrongPhase)?;
                let claimed = action.kind.rules().claims.ok_or(IntentError::WrongPhase)?;
                (claimed, action.player_id)
            }
            Phase::BlockResponse => {
                let block = self.pending_block.ok_or(IntentError::WrongPhase)?;
                (block.claimed_character, block.player_id)
            }
            _ => return Err(IntentError::WrongPhase),
        };
        if claimant_id == challenger_id {
            return Err(IntentError::SelfResponse);
        }

        let against_block = self.phase == Phase::BlockResponse;
        let verdict = self.resolve_claim(challenger_id, claimed, claimant_id);
        if verdict == ChallengeVerdict::Succeeded {
            // The voided claim disappears. For a voided block the original
            // action stays pending and executes once the blocker's reveal
            // completes.
            if against_block {
                self.pending_block = None;
            } else {
                self.pending_action = None;
            }
        }
        Ok(verdict)
    }

    /// Inspect the claimant's true hand and designate who owes an
    /// influence. The actual reveal is deferred to [`Self::lose_influence`].
    fn resolve_claim(
        &mut self,
        challenger_id: PlayerId,
        claimed: Character,
        claimant_id: PlayerId,
    ) -> ChallengeVerdict {
        let challenger_name = self.player_name(challenger_id);
        let claimant_name = self.player_name(claimant_id);

        let holds = self
            .player(claimant_id)
            .is_some_and(|p| p.holds(claimed));

        let verdict = if holds {
            self.log(
                LogKind::Challenge,
                format!("{challenger_name} challenges {claimant_name} - Challenge FAILED!"),
            );
            self.replace_shown_card(claimant_id, claimed);
            self.player_losing_influence = Some(challenger_id);
            ChallengeVerdict::Failed
        } else {
            self.log(
                LogKind::Challenge,
                format!("{challenger_name} challenges {claimant_name} - Challenge SUCCESSFUL!"),
            );
            self.player_losing_influence = Some(claimant_id);
            ChallengeVerdict::Succeeded
        };
        self.challenger_id = Some(challenger_id);
        self.phase = Phase::ChallengeResolution;
        self.passed_players.clear();
        verdict
    }

    /// After a failed challenge the shown card goes back into the deck, the
    /// deck reshuffles, and the claimant draws a fresh secret replacement.
    fn replace_shown_card(&mut self, claimant_id: PlayerId, claimed: Character) {
        let Some(index) = self.player(claimant_id).and_then(|p| {
            p.cards
                .iter()
                .position(|c| c.character == claimed && !c.is_revealed)
        }) else {
            error!("claimed card vanished between bluff check and replacement");
            return;
        };
        let Some(player) = self.player_mut(claimant_id) else {
            return;
        };
        let shown = player.cards.remove(index);
        self.deck.put_back(shown);
        match self.deck.draw() {
            Some(fresh) => {
                if let Some(player) = self.player_mut(claimant_id) {
                    player.cards.insert(index, fresh);
                }
            }
            None => error!("deck underflow drawing challenge replacement"),
        }
    }

    /// Declare a block against the pending action. Targeted actions may only
    /// be blocked by their target; Foreign Aid may be blocked by anyone.
    pub fn declare_block(
        &mut self,
        player_id: PlayerId,
        character: Character,
    ) -> Result<(), IntentError> {
        if self.phase != Phase::ActionResponse {
            return Err(IntentError::WrongPhase);
        }
        let action = self.pending_action.ok_or(IntentError::WrongPhase)?;
        let rules = action.kind.rules();
        if !rules.blockable_by.contains(&character) {
            return Err(IntentError::CannotBlock);
        }
        if action.player_id == player_id {
            return Err(IntentError::SelfResponse);
        }
        if rules.needs_target && action.target_id != Some(player_id) {
            return Err(IntentError::WrongPlayer);
        }
        let blocker = self.player(player_id).ok_or(IntentError::UnknownPlayer)?;
        if !blocker.is_alive {
            return Err(IntentError::NotAlive);
        }
        let blocker_name = blocker.name.clone();

        self.pending_block = Some(PendingBlock {
            player_id,
            claimed_character: character,
        });
        self.phase = Phase::BlockResponse;
        self.passed_players.clear();
        self.log(
            LogKind::Block,
            format!("{blocker_name} blocks with {character}"),
        );
        Ok(())
    }

    /// Record an explicit pass on the open response window. Returns whether
    /// every relevant player has now passed.
    pub fn pass(&mut self, player_id: PlayerId) -> Result<bool, IntentError> {
        if !matches!(self.phase, Phase::ActionResponse | Phase::BlockResponse) {
            return Err(IntentError::WrongPhase);
        }
        let player = self.player(player_id).ok_or(IntentError::UnknownPlayer)?;
        if !player.is_alive {
            return Err(IntentError::NotAlive);
        }
        self.passed_players.insert(player_id);
        Ok(self.all_relevant_passed())
    }

    /// The all-passed fast path considers alive, connected players who are
    /// neither the actor nor the blocker. Disconnected players never pass,
    /// so counting them would leave the window hostage to the timer.
    #[must_use]
    pub fn all_relevant_passed(&self) -> bool {
        let actor = self.pending_action.map(|a| a.player_id);
        let blocker = self.pending_block.map(|b| b.player_id);
        self.players
            .iter()
            .filter(|p| p.is_alive && p.is_connected)
            .filter(|p| Some(p.id) != actor && Some(p.id) != blocker)
            .all(|p| self.passed_players.contains(&p.id))
    }

    /// Default resolution when a response window closes with no open
    /// challenge: the pending action executes, or the unchallenged block
    /// stands and cancels it.
    pub fn resolve_window(&mut self) {
        match self.phase {
            Phase::ActionResponse => {
                self.passed_players.clear();
                self.execute_pending();
            }
            Phase::BlockResponse => {
                self.log(LogKind::Block, "Block successful - action canceled");
                self.advance_turn();
            }
            _ => {}
        }
    }

    /// Reveal one of the designated player's cards and orchestrate what the
    /// turn does next based on how the loss came about.
    pub fn lose_influence(
        &mut self,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<ResolutionOutcome, IntentError> {
        if !matches!(
            self.phase,
            Phase::LoseInfluence | Phase::ChallengeResolution
        ) {
            return Err(IntentError::WrongPhase);
        }
        if self.player_losing_influence != Some(player_id) {
            return Err(IntentError::WrongPlayer);
        }
        let in_challenge = self.phase == Phase::ChallengeResolution;
        self.reveal_card(player_id, card_id)?;

        if self.winner.is_some() {
            return Ok(ResolutionOutcome::GameOver);
        }
        Ok(self.settle_reveal(player_id, in_challenge))
    }

    /// What the turn does after `player_id`'s reveal, chosen or forced by a
    /// departure, settles the open interaction.
    fn settle_reveal(&mut self, player_id: PlayerId, in_challenge: bool) -> ResolutionOutcome {
        if in_challenge {
            let loser_was_challenger = self.challenger_id == Some(player_id);
            if self.pending_block.is_some() && loser_was_challenger {
                // Failed challenge against the block: the block stands and
                // the underlying action dies with it.
                self.log(LogKind::Block, "Block successful - action canceled");
                self.advance_turn();
                ResolutionOutcome::ActionCanceled
            } else if self.pending_action.is_some() && loser_was_challenger {
                // Failed challenge against the action: it executes late.
                self.execute_pending();
                ResolutionOutcome::ActionProceeded
            } else if self.pending_action.is_some() && self.pending_block.is_none() {
                // Successful challenge against the block: the blocker has
                // revealed and the original action finally goes through.
                self.execute_pending();
                ResolutionOutcome::ActionProceeded
            } else {
                // Successful challenge against the action: the bluffed
                // action is gone.
                self.pending_action = None;
                self.pending_block = None;
                self.advance_turn();
                ResolutionOutcome::ActionCanceled
            }
        } else {
            self.advance_turn();
            ResolutionOutcome::TurnAdvanced
        }
    }

    /// Mark one unrevealed card revealed, eliminating the player if it was
    /// their last, and rerun win detection.
    fn reveal_card(&mut self, player_id: PlayerId, card_id: CardId) -> Result<(), IntentError> {
        let player = self.player_mut(player_id).ok_or(IntentError::UnknownPlayer)?;
        let card = player
            .cards
            .iter_mut()
            .find(|c| c.id == card_id && !c.is_revealed)
            .ok_or(IntentError::UnknownCard)?;
        card.is_revealed = true;
        let character = card.character;
        let eliminated = player.influence() == 0;
        if eliminated {
            player.is_alive = false;
        }
        let name = player.name.clone();

        self.log(LogKind::Elimination, format!("{name} reveals {character}"));
        if eliminated {
            self.log(LogKind::Elimination, format!("{name} has been eliminated!"));
        }
        self.check_for_winner();
        Ok(())
    }

    /// Finish an exchange: keep exactly as many cards as the player has
    /// influence, return the rest to the deck, reshuffle, advance.
    pub fn complete_exchange(
        &mut self,
        player_id: PlayerId,
        keep: &[CardId],
    ) -> Result<(), IntentError> {
        if self.phase != Phase::ExchangeSelect {
            return Err(IntentError::WrongPhase);
        }
        let actor = self
            .pending_action
            .filter(|a| a.kind == ActionKind::Exchange)
            .map(|a| a.player_id);
        if actor != Some(player_id) {
            return Err(IntentError::WrongPlayer);
        }

        if self.player(player_id).is_none() {
            return Err(IntentError::UnknownPlayer);
        }
        // Hand size never changes through an exchange: the buffer holds the
        // old unrevealed cards, so influence == buffer - 2 drawn.
        let influence = self.exchange_cards.len().saturating_sub(2);
        let keep: HashSet<CardId> = keep.iter().copied().collect();
        if keep.len() != influence
            || !keep
                .iter()
                .all(|id| self.exchange_cards.iter().any(|c| c.id == *id))
        {
            return Err(IntentError::BadExchangeSelection);
        }

        let buffer = std::mem::take(&mut self.exchange_cards);
        let (kept, returned): (Vec<Card>, Vec<Card>) =
            buffer.into_iter().partition(|c| keep.contains(&c.id));

        if let Some(player) = self.player_mut(player_id) {
            player.cards.extend(kept);
        }
        self.deck.return_cards(returned);
        self.advance_turn();
        Ok(())
    }

    /// A player left the room mid-game. They are force-eliminated (all
    /// influence revealed, so the alive/cards invariant holds) and the turn
    /// sequence is unstuck if they were part of the open interaction.
    pub fn handle_departure(&mut self, player_id: PlayerId) {
        let game_over = self.phase == Phase::GameOver;
        let Some(player) = self.player_mut(player_id) else {
            return;
        };
        player.is_connected = false;
        if !player.is_alive || game_over {
            self.check_for_winner();
            return;
        }

        let name = player.name.clone();
        for card in &mut player.cards {
            card.is_revealed = true;
        }
        player.is_alive = false;
        self.log(
            LogKind::Elimination,
            format!("{name} left the game and has been eliminated!"),
        );
        self.check_for_winner();
        if self.phase == Phase::GameOver {
            return;
        }

        if self.player_losing_influence == Some(player_id)
            && matches!(self.phase, Phase::LoseInfluence | Phase::ChallengeResolution)
        {
            // Their forced reveal settles the open interaction like a
            // chosen one would, so a defended action still pays out.
            let in_challenge = self.phase == Phase::ChallengeResolution;
            self.settle_reveal(player_id, in_challenge);
        } else {
            let involved = self.pending_action.is_some_and(|a| a.player_id == player_id)
                || self.pending_block.is_some_and(|b| b.player_id == player_id);
            if involved || self.current_player().id == player_id {
                self.advance_turn();
            }
        }
        self.passed_players.remove(&player_id);
    }

    pub fn set_connected(&mut self, player_id: PlayerId, connected: bool) {
        if let Some(player) = self.player_mut(player_id) {
            player.is_connected = connected;
        }
    }

    /// Multiset of card characters across every location (deck, all hands,
    /// exchange buffer). Conservation demands this never drifts from three
    /// copies of each character.
    #[must_use]
    pub fn card_census(&self) -> HashMap<Character, usize> {
        let mut census: HashMap<Character, usize> = HashMap::new();
        for character in Character::ALL {
            census.insert(character, self.deck.count_of(character));
        }
        let hands = self
            .players
            .iter()
            .flat_map(|p| p.cards.iter())
            .chain(self.exchange_cards.iter());
        for card in hands {
            *census.entry(card.character).or_insert(0) += 1;
        }
        census
    }

    /// Per-recipient view: the deck is never serialized, other players'
    /// unrevealed cards are masked, and the exchange buffer is visible only
    /// to the exchanging player.
    #[must_use]
    pub fn view_for(&self, viewer: PlayerId) -> GameView {
        let exchanging = self.phase == Phase::ExchangeSelect
            && self
                .pending_action
                .is_some_and(|a| a.player_id == viewer);
        GameView {
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id,
                    name: p.name.clone(),
                    coins: p.coins,
                    cards: p.cards.iter().map(|c| c.view(p.id == viewer)).collect(),
                    is_alive: p.is_alive,
                    is_connected: p.is_connected,
                })
                .collect(),
            current_player_index: self.current_player_index,
            phase: self.phase,
            deck_size: self.deck.len(),
            pending_action: self.pending_action,
            pending_block: self.pending_block,
            challenger_id: self.challenger_id,
            player_losing_influence: self.player_losing_influence,
            exchange_cards: if exchanging {
                self.exchange_cards.clone()
            } else {
                Vec::new()
            },
            winner: self.winner,
            game_log: self.game_log.clone(),
            passed_players: self.passed_players.iter().copied().collect(),
        }
    }
}

/// What one particular player is allowed to see.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GameView {
    pub players: Vec<PlayerView>,
    pub current_player_index: usize,
    pub phase: Phase,
    pub deck_size: usize,
    pub pending_action: Option<PendingAction>,
    pub pending_block: Option<PendingBlock>,
    pub challenger_id: Option<PlayerId>,
    pub player_losing_influence: Option<PlayerId>,
    pub exchange_cards: Vec<Card>,
    pub winner: Option<PlayerId>,
    pub game_log: Vec<LogEntry>,
    pub passed_players: Vec<PlayerId>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub coins: Coins,
    pub cards: Vec<CardView>,
    pub is_alive: bool,
    pub is_connected: bool,
}
