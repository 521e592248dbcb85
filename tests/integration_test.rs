use partyround::engine::EngineSettings;
use partyround::error::ErrorCategory;
use partyround::room::{JoinRequest, RoomHandle, RoomRegistry, RoomSettings};
use partyround::types::{ActionInput, GameEvent, Phase};
use std::time::Duration;
use tokio::sync::broadcast;

/// Registry whose rooms never tick on their own; tests feed time by hand
fn registry(max_rounds: u32) -> RoomRegistry {
    RoomRegistry::new(RoomSettings {
        engine: EngineSettings {
            max_rounds,
            max_answer_chars: 500,
        },
        tick_every: Duration::from_secs(3600),
        shuffle_prompts: false,
        idle_timeout: Duration::from_secs(3600),
    })
}

fn join_request(name: &str) -> JoinRequest {
    JoinRequest {
        player_id: None,
        name: name.to_string(),
        avatar: None,
    }
}

/// Everything broadcast so far
fn drain(rx: &mut broadcast::Receiver<GameEvent>) -> Vec<GameEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn kinds(events: &[GameEvent]) -> Vec<&'static str> {
    events.iter().map(GameEvent::kind).collect()
}

async fn answer_id_of(room: &RoomHandle, player_id: &str) -> String {
    let state = room.state().await.unwrap();
    let round = state.current_round.expect("round should be active");
    let (id, _) = round.answer_of(player_id).expect("player should have answered");
    id.clone()
}

/// End-to-end integration test for a complete game flow
#[tokio::test]
async fn test_full_game_flow() {
    let registry = registry(2);
    let room = registry.create_room(Some("GAME")).await.unwrap();
    let mut events = room.subscribe();

    // 1. Lobby: two players join, no timer runs
    let alice = room.join(join_request("Alice")).await.unwrap().player_id;
    let bob = room.join(join_request("Bob")).await.unwrap().player_id;
    assert_eq!(
        kinds(&drain(&mut events)),
        vec!["playerJoined", "roomUpdate", "playerJoined", "roomUpdate"]
    );
    assert!(!room.timer_active().await.unwrap());

    // 2. Only the host may start
    let err = room.act(&bob, ActionInput::Start).await.unwrap_err();
    assert_eq!(err.code, "ACTION_NOT_ALLOWED");
    assert_eq!(err.category, ErrorCategory::BusinessLogic);
    assert!(drain(&mut events).is_empty(), "rejections must not broadcast");

    room.act(&alice, ActionInput::Start).await.unwrap();
    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Prompt);
    assert_eq!(snapshot.round, 1);
    assert!(snapshot.time_left_ms > 0);
    assert!(room.timer_active().await.unwrap());
    assert_eq!(kinds(&drain(&mut events)), vec!["prompt", "roomUpdate"]);

    // 3. Both answers in: choose opens before the countdown runs out
    room.act(&alice, ActionInput::SubmitAnswer { text: "Three".to_string() })
        .await
        .unwrap();
    room.act(&bob, ActionInput::SubmitAnswer { text: "Nine".to_string() })
        .await
        .unwrap();
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Choose);
    assert_eq!(
        kinds(&drain(&mut events)),
        vec!["submitted", "submitted", "phaseChange", "roomUpdate"]
    );

    // 4. Both votes in: straight to reveal
    let alice_answer = answer_id_of(&room, &alice).await;
    let bob_answer = answer_id_of(&room, &bob).await;

    let err = room
        .act(&alice, ActionInput::SubmitVote { answer_id: alice_answer.clone() })
        .await
        .unwrap_err();
    assert_eq!(err.code, "SELF_VOTE");

    room.act(&alice, ActionInput::SubmitVote { answer_id: bob_answer })
        .await
        .unwrap();
    room.act(&bob, ActionInput::SubmitVote { answer_id: alice_answer.clone() })
        .await
        .unwrap();
    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Reveal);
    assert!(snapshot.is_round_complete);
    drain(&mut events);

    // 5. Reveal runs out: scoring is applied once
    room.tick(10_000).await.unwrap();
    let state = room.state().await.unwrap();
    assert_eq!(state.phase, Phase::Scoring);
    assert_eq!(state.scores[&alice], 1500);
    assert_eq!(state.scores[&bob], 500);

    let round_events = drain(&mut events);
    match round_events.iter().find(|e| e.kind() == "scores") {
        Some(GameEvent::Scores { round, standings, .. }) => {
            assert_eq!(*round, 1);
            assert_eq!(standings[0].player_id, alice);
            assert_eq!(standings[0].score, 1500);
        }
        other => panic!("Expected scores event, got {other:?}"),
    }

    // 6. Scoring runs out: round end, then round 2
    room.tick(8_000).await.unwrap();
    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Prompt);
    assert_eq!(snapshot.round, 2);
    let transition = drain(&mut events);
    assert_eq!(kinds(&transition), vec!["roundEnd", "prompt", "roomUpdate"]);
    match &transition[0] {
        GameEvent::RoundEnd {
            round,
            correct_answer_id,
        } => {
            assert_eq!(*round, 1);
            assert_eq!(correct_answer_id.as_deref(), Some(alice_answer.as_str()));
        }
        other => panic!("Expected roundEnd, got {other:?}"),
    }
    match &transition[1] {
        GameEvent::Prompt { truth_teller, .. } => {
            assert_eq!(truth_teller.as_deref(), Some(bob.as_str()))
        }
        other => panic!("Expected prompt, got {other:?}"),
    }

    // 7. Nobody plays round 2; every phase times out
    room.tick(60_000).await.unwrap();
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Choose);
    room.tick(30_000).await.unwrap();
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Reveal);
    room.tick(10_000).await.unwrap();
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Scoring);
    drain(&mut events);
    room.tick(8_000).await.unwrap();

    // 8. Round limit reached
    let state = room.state().await.unwrap();
    assert_eq!(state.phase, Phase::GameOver);
    assert_eq!(state.round, 3);
    assert_eq!(state.scores[&alice], 1500);
    assert!(!room.timer_active().await.unwrap());

    let final_events = drain(&mut events);
    assert_eq!(kinds(&final_events), vec!["roundEnd", "gameOver", "roomUpdate"]);

    // Game over is terminal
    room.tick(60_000).await.unwrap();
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::GameOver);
}

#[tokio::test]
async fn test_answers_hidden_until_reveal() {
    let registry = registry(1);
    let room = registry.create_room(None).await.unwrap();
    let alice = room.join(join_request("Alice")).await.unwrap().player_id;
    let bob = room.join(join_request("Bob")).await.unwrap().player_id;
    room.act(&alice, ActionInput::Start).await.unwrap();
    room.act(&alice, ActionInput::SubmitAnswer { text: "Secret".to_string() })
        .await
        .unwrap();

    let snapshot = room.snapshot().await.unwrap();
    let round = snapshot.current_round.unwrap();
    assert!(round.answers.is_empty());
    let alice_view = snapshot.players.iter().find(|p| p.id == alice).unwrap();
    assert!(alice_view.has_acted);

    room.act(&bob, ActionInput::SubmitAnswer { text: "Guess".to_string() })
        .await
        .unwrap();
    let round = room.snapshot().await.unwrap().current_round.unwrap();
    assert_eq!(round.answers.len(), 2);
    assert!(round.answers.iter().all(|a| a.player_id.is_none()));
}

#[tokio::test]
async fn test_concurrent_answers_are_all_kept() {
    let registry = registry(3);
    let room = registry.create_room(Some("BUSY")).await.unwrap();

    let mut ids = Vec::new();
    for i in 0..8 {
        ids.push(room.join(join_request(&format!("Player {i}"))).await.unwrap().player_id);
    }
    room.act(&ids[0], ActionInput::Start).await.unwrap();

    let tasks: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let room = room.clone();
            let id = id.clone();
            tokio::spawn(async move {
                room.act(&id, ActionInput::SubmitAnswer { text: format!("answer {i}") })
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let state = room.state().await.unwrap();
    assert_eq!(state.current_round.unwrap().answers.len(), 8);
    assert_eq!(state.phase, Phase::Choose);
}

#[tokio::test]
async fn test_membership_rules() {
    let registry = registry(3);
    let room = registry.create_room(Some("FULL")).await.unwrap();

    let mut acks = Vec::new();
    for i in 0..8 {
        acks.push(room.join(join_request(&format!("Player {i}"))).await.unwrap());
    }
    let ids: Vec<String> = acks.iter().map(|ack| ack.player_id.clone()).collect();
    let err = room.join(join_request("Latecomer")).await.unwrap_err();
    assert_eq!(err.code, "ROOM_FULL");
    assert_eq!(err.status_code, 409);

    room.act(&ids[0], ActionInput::Start).await.unwrap();

    // Seats are fixed once the game runs, but known players can come back
    room.leave(&ids[3], &acks[3].connection_id).await.unwrap();
    let ack = room
        .join(JoinRequest {
            player_id: Some(ids[3].clone()),
            name: "Player 3".to_string(),
            avatar: None,
        })
        .await
        .unwrap();
    assert!(ack.reconnected);
    assert_eq!(ack.player_id, ids[3]);

    let err = room.join(join_request("Stranger")).await.unwrap_err();
    assert_eq!(err.code, "JOIN_CLOSED");
    assert!(!err.retryable());
}

#[tokio::test]
async fn test_room_closes_when_everyone_leaves() {
    let registry = registry(3);
    let room = registry.create_room(Some("BYEBYE")).await.unwrap();
    let alice = room.join(join_request("Alice")).await.unwrap();
    let bob = room.join(join_request("Bob")).await.unwrap();
    room.act(&alice.player_id, ActionInput::Start).await.unwrap();
    assert!(room.timer_active().await.unwrap());

    room.leave(&alice.player_id, &alice.connection_id).await.unwrap();
    room.leave(&bob.player_id, &bob.connection_id).await.unwrap();

    for _ in 0..50 {
        if registry.room_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(registry.room_count().await, 0);
    assert!(room.is_closed());

    let err = room.snapshot().await.unwrap_err();
    assert_eq!(err.code, "ROOM_CLOSED");
    assert_eq!(err.category, ErrorCategory::Network);
    assert!(err.retryable());
    assert_eq!(err.context["room"], "BYEBYE");
}

#[tokio::test]
async fn test_stale_leave_after_reconnect_is_ignored() {
    let registry = registry(3);
    let room = registry.create_room(Some("REFRESH")).await.unwrap();
    let first = room.join(join_request("Alice")).await.unwrap();

    // A browser refresh: the new socket joins before the old one closes
    let second = room
        .join(JoinRequest {
            player_id: Some(first.player_id.clone()),
            name: "Alice".to_string(),
            avatar: None,
        })
        .await
        .unwrap();
    assert!(second.reconnected);
    assert_ne!(first.connection_id, second.connection_id);

    room.leave(&first.player_id, &first.connection_id).await.unwrap();
    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.players.len(), 1);
    assert!(snapshot.players[0].connected);
    assert_eq!(registry.room_count().await, 1);
    assert!(!room.is_closed());

    // The live connection still leaves normally
    room.leave(&second.player_id, &second.connection_id).await.unwrap();
    for _ in 0..50 {
        if registry.room_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn test_host_leaving_lobby_passes_the_start() {
    let registry = registry(3);
    let room = registry.create_room(Some("LOBBY")).await.unwrap();
    let mut events = room.subscribe();
    let alice = room.join(join_request("Alice")).await.unwrap();
    let bob = room.join(join_request("Bob")).await.unwrap();
    let carol = room.join(join_request("Carol")).await.unwrap();
    drain(&mut events);

    room.leave(&alice.player_id, &alice.connection_id).await.unwrap();
    assert_eq!(kinds(&drain(&mut events)), vec!["playerLeft", "roomUpdate"]);

    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Lobby);
    assert_eq!(snapshot.players.len(), 2);
    assert!(snapshot.players.iter().all(|p| p.connected));

    let err = room.act(&carol.player_id, ActionInput::Start).await.unwrap_err();
    assert_eq!(err.code, "ACTION_NOT_ALLOWED");
    room.act(&bob.player_id, ActionInput::Start).await.unwrap();

    // The freed seat no longer gates the prompt phase
    room.act(&bob.player_id, ActionInput::SubmitAnswer { text: "Eight".to_string() })
        .await
        .unwrap();
    room.act(&carol.player_id, ActionInput::SubmitAnswer { text: "Two".to_string() })
        .await
        .unwrap();
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Choose);
}
