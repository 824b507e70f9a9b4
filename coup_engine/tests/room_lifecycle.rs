//! Room actor lifecycle tests: lobby flow, intent delivery, chat relay,
//! and the response-window countdown.

use coup_engine::game::{
    entities::{PlayerId, DISCONNECT_GRACE_SECS},
    rules::ActionKind,
    Phase,
};
use coup_engine::room::{
    GameIntent, RoomError, RoomEvent, RoomHandle, RoomManager, RoomMessage, RoomView,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{advance, Duration};

async fn join(room: &RoomHandle, name: &str) -> Result<PlayerId, RoomError> {
    let (tx, rx) = oneshot::channel();
    room.send(RoomMessage::Join {
        name: name.to_string(),
        response: tx,
    })
    .await
    .unwrap();
    rx.await.unwrap()
}

async fn ready(room: &RoomHandle, player_id: PlayerId) {
    let (tx, rx) = oneshot::channel();
    room.send(RoomMessage::SetReady {
        player_id,
        ready: true,
        response: tx,
    })
    .await
    .unwrap();
    rx.await.unwrap().unwrap();
}

async fn start(room: &RoomHandle, player_id: PlayerId) -> Result<(), RoomError> {
    let (tx, rx) = oneshot::channel();
    room.send(RoomMessage::StartGame {
        player_id,
        response: tx,
    })
    .await
    .unwrap();
    rx.await.unwrap()
}

async fn view(room: &RoomHandle, player_id: PlayerId) -> RoomView {
    let (tx, rx) = oneshot::channel();
    room.send(RoomMessage::GetView {
        player_id,
        response: tx,
    })
    .await
    .unwrap();
    rx.await.unwrap().unwrap()
}

/// Step the paused clock one second at a time, yielding after each so the
/// actor's interval serves every tick before the next one queues up.
async fn step_secs(secs: u64) {
    for _ in 0..secs {
        advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
    }
}

/// Set up a started two-player room.
async fn started_room() -> (RoomHandle, PlayerId, PlayerId) {
    let manager = RoomManager::new();
    let room = manager.create_room().await;
    let alice = join(&room, "alice").await.unwrap();
    let bob = join(&room, "bob").await.unwrap();
    ready(&room, alice).await;
    ready(&room, bob).await;
    start(&room, alice).await.unwrap();
    (room, alice, bob)
}

#[tokio::test]
async fn lobby_flow_host_ready_gate_and_start() {
    let manager = RoomManager::new();
    let room = manager.create_room().await;
    assert_eq!(room.code().len(), 6);

    let alice = join(&room, "alice").await.unwrap();
    let bob = join(&room, "bob").await.unwrap();
    assert_eq!(join(&room, "ALICE").await, Err(RoomError::NameTaken));

    // Non-host cannot start; host cannot start before everyone is ready.
    assert_eq!(start(&room, bob).await, Err(RoomError::NotHost));
    ready(&room, alice).await;
    assert_eq!(start(&room, alice).await, Err(RoomError::NotAllReady));
    ready(&room, bob).await;
    start(&room, alice).await.unwrap();

    let v = view(&room, alice).await;
    assert!(v.game.is_some());
    assert_eq!(v.host_id, Some(alice));
    // Joining mid-game is refused.
    assert_eq!(join(&room, "carol").await, Err(RoomError::GameInProgress));
}

#[tokio::test]
async fn room_caps_at_six_players() {
    let manager = RoomManager::new();
    let room = manager.create_room().await;
    for i in 0..6 {
        join(&room, &format!("p{i}")).await.unwrap();
    }
    assert_eq!(join(&room, "seventh").await, Err(RoomError::RoomFull));
}

#[tokio::test]
async fn intents_flow_through_and_invalid_ones_vanish() {
    let (room, alice, bob) = started_room().await;

    // Bob acting out of turn is silently dropped.
    room.send(RoomMessage::Intent {
        player_id: bob,
        intent: GameIntent::DeclareAction {
            kind: ActionKind::Income,
            target_id: None,
        },
    })
    .await
    .unwrap();

    room.send(RoomMessage::Intent {
        player_id: alice,
        intent: GameIntent::DeclareAction {
            kind: ActionKind::Income,
            target_id: None,
        },
    })
    .await
    .unwrap();

    let v = view(&room, alice).await;
    let game = v.game.unwrap();
    let me = game.players.iter().find(|p| p.id == alice).unwrap();
    assert_eq!(me.coins, 3);
    let other = game.players.iter().find(|p| p.id == bob).unwrap();
    assert_eq!(other.coins, 2);
}

#[tokio::test]
async fn views_mask_the_other_hand() {
    let (room, alice, bob) = started_room().await;
    let v = view(&room, alice).await;
    let game = v.game.unwrap();

    let me = game.players.iter().find(|p| p.id == alice).unwrap();
    assert!(me.cards.iter().all(|c| c.character.is_some()));
    let other = game.players.iter().find(|p| p.id == bob).unwrap();
    assert!(other.cards.iter().all(|c| c.character.is_none()));
    assert_eq!(game.deck_size, 11);
}

#[tokio::test]
async fn chat_is_relayed_truncated_to_subscribers() {
    let (room, alice, bob) = started_room().await;

    let (tx, mut rx) = mpsc::channel(16);
    room.send(RoomMessage::Subscribe {
        player_id: bob,
        sender: tx,
    })
    .await
    .unwrap();

    let long_line = "x".repeat(300);
    room.send(RoomMessage::Chat {
        player_id: alice,
        text: long_line,
    })
    .await
    .unwrap();

    loop {
        match rx.recv().await.unwrap() {
            RoomEvent::Chat(message) => {
                assert_eq!(message.player_id, alice);
                assert_eq!(message.name, "alice");
                assert_eq!(message.text.chars().count(), 200);
                break;
            }
            _ => continue,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn response_window_expires_and_resolves_the_action() {
    let (room, alice, _bob) = started_room().await;

    room.send(RoomMessage::Intent {
        player_id: alice,
        intent: GameIntent::DeclareAction {
            kind: ActionKind::Tax,
            target_id: None,
        },
    })
    .await
    .unwrap();

    let v = view(&room, alice).await;
    assert_eq!(v.game.as_ref().unwrap().phase, Phase::ActionResponse);
    assert!(v.window_remaining_secs.is_some());

    step_secs(31).await;

    let v = view(&room, alice).await;
    let game = v.game.unwrap();
    assert_eq!(game.phase, Phase::ActionSelect);
    let me = game.players.iter().find(|p| p.id == alice).unwrap();
    assert_eq!(me.coins, 5);
    assert!(v.window_remaining_secs.is_none());
}

#[tokio::test]
async fn all_passed_fast_path_skips_the_countdown() {
    let (room, alice, bob) = started_room().await;

    room.send(RoomMessage::Intent {
        player_id: alice,
        intent: GameIntent::DeclareAction {
            kind: ActionKind::Tax,
            target_id: None,
        },
    })
    .await
    .unwrap();
    room.send(RoomMessage::Intent {
        player_id: bob,
        intent: GameIntent::Pass,
    })
    .await
    .unwrap();

    let v = view(&room, alice).await;
    let game = v.game.unwrap();
    assert_eq!(game.phase, Phase::ActionSelect);
    assert_eq!(
        game.players.iter().find(|p| p.id == alice).unwrap().coins,
        5
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_an_owed_reveal_times_out_into_elimination() {
    let (room, alice, bob) = started_room().await;

    // Bob challenges alice's tax; whichever way it lands, someone now owes
    // a reveal and the game cannot move until it happens.
    room.send(RoomMessage::Intent {
        player_id: alice,
        intent: GameIntent::DeclareAction {
            kind: ActionKind::Tax,
            target_id: None,
        },
    })
    .await
    .unwrap();
    room.send(RoomMessage::Intent {
        player_id: bob,
        intent: GameIntent::Challenge,
    })
    .await
    .unwrap();

    let v = view(&room, alice).await;
    let game = v.game.unwrap();
    assert_eq!(game.phase, Phase::ChallengeResolution);
    let loser = game.player_losing_influence.unwrap();
    let survivor = if loser == alice { bob } else { alice };

    room.send(RoomMessage::Disconnected { player_id: loser })
        .await
        .unwrap();
    step_secs(DISCONNECT_GRACE_SECS + 1).await;

    let v = view(&room, survivor).await;
    let game = v.game.unwrap();
    assert_eq!(game.phase, Phase::GameOver);
    assert_eq!(game.winner, Some(survivor));
}

#[tokio::test]
async fn strangers_cannot_fetch_a_view() {
    let manager = RoomManager::new();
    let room = manager.create_room().await;
    join(&room, "alice").await.unwrap();

    let (tx, rx) = oneshot::channel();
    room.send(RoomMessage::GetView {
        player_id: PlayerId::new_v4(),
        response: tx,
    })
    .await
    .unwrap();
    assert!(matches!(rx.await.unwrap(), Err(RoomError::UnknownPlayer)));
}

#[tokio::test]
async fn leaving_mid_game_eliminates_and_hands_victory_over() {
    let (room, alice, bob) = started_room().await;

    let (tx, rx) = oneshot::channel();
    room.send(RoomMessage::Leave {
        player_id: bob,
        response: tx,
    })
    .await
    .unwrap();
    rx.await.unwrap().unwrap();

    let v = view(&room, alice).await;
    let game = v.game.unwrap();
    assert_eq!(game.phase, Phase::GameOver);
    assert_eq!(game.winner, Some(alice));
}
