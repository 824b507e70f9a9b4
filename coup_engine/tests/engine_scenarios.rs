//! End-to-end engine scenarios: full challenge/block chains played out
//! against deterministic deals.

use coup_engine::game::{
    engine::{ChallengeVerdict, GameState, Phase, ResolutionOutcome},
    entities::{Card, CardId, Character, Deck, Player, PlayerId},
    rules::ActionKind,
};

/// Deal so that player 0 receives the first listed hand, player 1 the next,
/// and so on, with the rest of the court deck underneath.
fn game_with_hands(names: &[&str], hands: &[[Character; 2]]) -> GameState {
    let roster: Vec<Player> = names.iter().map(|n| Player::new(*n)).collect();
    let mut remaining: Vec<Character> = Character::ALL
        .into_iter()
        .flat_map(|c| std::iter::repeat_n(c, 3))
        .collect();
    let mut sequence: Vec<Card> = Vec::new();
    for hand in hands {
        for character in hand {
            let index = remaining
                .iter()
                .position(|c| c == character)
                .expect("hand exceeds the three copies of a character");
            remaining.remove(index);
            sequence.push(Card::new(*character));
        }
    }
    sequence.extend(remaining.into_iter().map(Card::new));
    sequence.reverse();
    GameState::with_deck(&roster, Deck::stacked(sequence))
}

fn ids(game: &GameState) -> Vec<PlayerId> {
    game.players.iter().map(|p| p.id).collect()
}

fn first_unrevealed(game: &GameState, player: PlayerId) -> CardId {
    game.player(player)
        .unwrap()
        .unrevealed_cards()
        .next()
        .unwrap()
        .id
}

#[test]
fn defended_tax_costs_the_challenger_an_influence() {
    let mut game = game_with_hands(
        &["alice", "bob", "carol"],
        &[
            [Character::Duke, Character::Assassin],
            [Character::Captain, Character::Captain],
            [Character::Contessa, Character::Contessa],
        ],
    );
    let [alice, bob, _] = ids(&game)[..] else {
        unreachable!()
    };

    game.declare_action(alice, ActionKind::Tax, None).unwrap();
    assert_eq!(game.phase, Phase::ActionResponse);

    let verdict = game.challenge(bob).unwrap();
    assert_eq!(verdict, ChallengeVerdict::Failed);
    assert_eq!(game.player_losing_influence, Some(bob));
    // Alice showed her Duke, swapped it for a fresh card, and keeps two
    // secrets.
    assert_eq!(game.player(alice).unwrap().influence(), 2);

    let reveal = first_unrevealed(&game, bob);
    let outcome = game.lose_influence(bob, reveal).unwrap();
    assert_eq!(outcome, ResolutionOutcome::ActionProceeded);
    assert_eq!(game.player(alice).unwrap().coins, 5);
    assert_eq!(game.player(bob).unwrap().influence(), 1);
    assert_eq!(game.current_player().id, bob);
}

#[test]
fn bluffed_contessa_block_means_two_influence_losses() {
    let mut game = game_with_hands(
        &["alice", "bob", "carol"],
        &[
            [Character::Assassin, Character::Duke],
            [Character::Captain, Character::Captain],
            [Character::Contessa, Character::Contessa],
        ],
    );
    let [alice, bob, carol] = ids(&game)[..] else {
        unreachable!()
    };
    game.players[0].coins = 3;

    game.declare_action(alice, ActionKind::Assassinate, Some(bob))
        .unwrap();
    game.declare_block(bob, Character::Contessa).unwrap();
    assert_eq!(game.phase, Phase::BlockResponse);

    // Bob holds no Contessa; Carol calls it.
    let verdict = game.challenge(carol).unwrap();
    assert_eq!(verdict, ChallengeVerdict::Succeeded);
    assert_eq!(game.player_losing_influence, Some(bob));

    // First loss: the voided block. The assassination then finally lands
    // and demands a second reveal.
    let reveal = first_unrevealed(&game, bob);
    let outcome = game.lose_influence(bob, reveal).unwrap();
    assert_eq!(outcome, ResolutionOutcome::ActionProceeded);
    assert_eq!(game.phase, Phase::LoseInfluence);
    assert_eq!(game.player_losing_influence, Some(bob));
    // The cost was paid when the action executed.
    assert_eq!(game.player(alice).unwrap().coins, 0);

    let reveal = first_unrevealed(&game, bob);
    game.lose_influence(bob, reveal).unwrap();
    assert!(!game.player(bob).unwrap().is_alive);
    assert!(game.winner.is_none());
    assert_eq!(game.current_player().id, carol);
}

#[test]
fn genuine_duke_block_survives_its_challenge_and_cancels_foreign_aid() {
    let mut game = game_with_hands(
        &["alice", "bob", "carol"],
        &[
            [Character::Captain, Character::Captain],
            [Character::Duke, Character::Contessa],
            [Character::Assassin, Character::Assassin],
        ],
    );
    let [alice, bob, carol] = ids(&game)[..] else {
        unreachable!()
    };

    game.declare_action(alice, ActionKind::ForeignAid, None)
        .unwrap();
    game.declare_block(bob, Character::Duke).unwrap();

    let verdict = game.challenge(carol).unwrap();
    assert_eq!(verdict, ChallengeVerdict::Failed);
    assert_eq!(game.player_losing_influence, Some(carol));
    assert_eq!(game.player(bob).unwrap().influence(), 2);

    let reveal = first_unrevealed(&game, carol);
    let outcome = game.lose_influence(carol, reveal).unwrap();
    // The block stood, so the foreign aid never pays out.
    assert_eq!(outcome, ResolutionOutcome::ActionCanceled);
    assert_eq!(game.player(alice).unwrap().coins, 2);
    assert_eq!(game.current_player().id, bob);
}

#[test]
fn assassination_absorbed_by_the_challenge_loss_ends_the_turn() {
    // Bob has a single influence left. His bluffed block costs him that
    // card, which also absorbs the assassination: no second loss owed.
    let mut game = game_with_hands(
        &["alice", "bob", "carol"],
        &[
            [Character::Assassin, Character::Duke],
            [Character::Captain, Character::Captain],
            [Character::Contessa, Character::Contessa],
        ],
    );
    let [alice, bob, carol] = ids(&game)[..] else {
        unreachable!()
    };
    game.players[0].coins = 3;
    game.players[1].cards[1].is_revealed = true;

    game.declare_action(alice, ActionKind::Assassinate, Some(bob))
        .unwrap();
    game.declare_block(bob, Character::Contessa).unwrap();
    game.challenge(carol).unwrap();

    let reveal = first_unrevealed(&game, bob);
    let outcome = game.lose_influence(bob, reveal).unwrap();
    assert!(!game.player(bob).unwrap().is_alive);
    // Execution found a dead target and simply advanced.
    assert_eq!(outcome, ResolutionOutcome::ActionProceeded);
    assert_eq!(game.phase, Phase::ActionSelect);
    assert_eq!(game.current_player().id, carol);
}

#[test]
fn two_player_game_plays_to_a_winner() {
    let mut game = game_with_hands(
        &["alice", "bob"],
        &[
            [Character::Duke, Character::Duke],
            [Character::Contessa, Character::Contessa],
        ],
    );
    let [alice, bob] = ids(&game)[..] else {
        unreachable!()
    };

    game.players[0].coins = 7;
    game.declare_action(alice, ActionKind::Coup, Some(bob))
        .unwrap();
    let reveal = first_unrevealed(&game, bob);
    let outcome = game.lose_influence(bob, reveal).unwrap();
    assert_eq!(outcome, ResolutionOutcome::TurnAdvanced);
    assert!(game.player(bob).unwrap().is_alive);

    game.declare_action(bob, ActionKind::Income, None).unwrap();

    game.players[0].coins = 7;
    game.declare_action(alice, ActionKind::Coup, Some(bob))
        .unwrap();
    let reveal = first_unrevealed(&game, bob);
    let outcome = game.lose_influence(bob, reveal).unwrap();
    assert_eq!(outcome, ResolutionOutcome::GameOver);

    assert_eq!(game.winner, Some(alice));
    assert_eq!(game.phase, Phase::GameOver);
    assert!(!game.player(bob).unwrap().is_alive);
    // Absorbing state: nothing further is accepted.
    assert!(game
        .declare_action(alice, ActionKind::Income, None)
        .is_err());
}
