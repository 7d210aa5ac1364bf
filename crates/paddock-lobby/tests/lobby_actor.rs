//! Integration tests for the lobby actor.
//!
//! Run with paused time: the countdown's tick source auto-advances, so a
//! five second countdown completes instantly and deterministically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use paddock_lobby::{
    Collaborators, Command, ConfigError, HandoffRecord, LobbyConfig, LobbyError, LobbyHandle,
    SceneTransport, SpawnCollaborator,
};
use paddock_protocol::{ConnectionId, CountdownState, RejectReason, ServerMessage};
use tokio::sync::mpsc;

// =========================================================================
// Recording collaborators
// =========================================================================

#[derive(Clone, Default)]
struct Recorder {
    spawned: Arc<Mutex<Vec<(Vec<HandoffRecord>, String)>>>,
    scenes: Arc<Mutex<Vec<String>>>,
}

impl SpawnCollaborator for Recorder {
    fn begin_gameplay(&self, records: &[HandoffRecord], scene_id: &str) {
        self.spawned
            .lock()
            .unwrap()
            .push((records.to_vec(), scene_id.to_string()));
    }
}

impl SceneTransport for Recorder {
    fn change_scene(&self, scene_id: &str) {
        self.scenes.lock().unwrap().push(scene_id.to_string());
    }
}

// =========================================================================
// Helpers
// =========================================================================

type Inbox = mpsc::UnboundedReceiver<ServerMessage>;

fn cid(n: u64) -> ConnectionId {
    ConnectionId::new(n)
}

fn spawn_lobby() -> (LobbyHandle, Recorder) {
    let recorder = Recorder::default();
    let handle = LobbyHandle::spawn(
        LobbyConfig::default(),
        Collaborators::new(recorder.clone(), recorder.clone()),
    )
    .expect("default config is valid");
    (handle, recorder)
}

async fn join(handle: &LobbyHandle, id: u64, name: &str) -> Inbox {
    let (tx, rx) = mpsc::unbounded_channel();
    handle.join(cid(id), name, tx).await.expect("join should succeed");
    rx
}

/// Receives until `pred` matches, skipping everything else.
async fn recv_until(inbox: &mut Inbox, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(60), inbox.recv())
            .await
            .expect("timed out waiting for message")
            .expect("channel closed");
        if pred(&msg) {
            return msg;
        }
    }
}

/// Everything that arrives within `window`.
async fn drain(inbox: &mut Inbox, window: Duration) -> Vec<ServerMessage> {
    let mut received = Vec::new();
    while let Ok(Some(msg)) = tokio::time::timeout(window, inbox.recv()).await {
        received.push(msg);
    }
    received
}

fn is_countdown(state: CountdownState) -> impl Fn(&ServerMessage) -> bool {
    move |msg| matches!(msg, ServerMessage::Countdown { state: s, .. } if *s == state)
}

async fn two_ready_players(handle: &LobbyHandle) -> (Inbox, Inbox) {
    let mut a = join(handle, 1, "Ayrton").await;
    let b = join(handle, 2, "Alain").await;
    handle.command(cid(1), Command::SetReady).await.unwrap();
    handle.command(cid(2), Command::SetReady).await.unwrap();
    recv_until(&mut a, |m| {
        matches!(m, ServerMessage::ParticipantUpdated { participant }
            if participant.connection == cid(2) && participant.ready)
    })
    .await;
    (a, b)
}

// =========================================================================
// Join / Leave
// =========================================================================

#[tokio::test]
async fn test_join_receives_welcome_and_others_see_delta() {
    let (handle, _) = spawn_lobby();
    let mut a = join(&handle, 1, "Ayrton").await;

    match a.recv().await.unwrap() {
        ServerMessage::Welcome { you, snapshot } => {
            assert_eq!(you, cid(1));
            assert_eq!(snapshot.participants.len(), 1);
            assert_eq!(snapshot.host, Some(cid(1)));
            assert_eq!(snapshot.maps.len(), 3);
        }
        other => panic!("expected Welcome, got {other:?}"),
    }

    let _b = join(&handle, 2, "Alain").await;
    let joined = recv_until(&mut a, |m| matches!(m, ServerMessage::ParticipantJoined { .. })).await;
    match joined {
        ServerMessage::ParticipantJoined { participant } => {
            assert_eq!(participant.connection, cid(2));
            assert_eq!(participant.slot, 1);
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_duplicate_join_is_rejected() {
    let (handle, _) = spawn_lobby();
    let _a = join(&handle, 1, "a").await;
    let (tx, _rx) = mpsc::unbounded_channel();
    let result = handle.join(cid(1), "a", tx).await;
    assert_eq!(result, Err(LobbyError::AlreadyJoined(cid(1))));
}

#[tokio::test]
async fn test_leave_broadcasts_and_is_idempotent() {
    let (handle, _) = spawn_lobby();
    let mut a = join(&handle, 1, "a").await;
    let mut b = join(&handle, 2, "b").await;

    handle.leave(cid(1)).await.unwrap();
    handle.leave(cid(1)).await.unwrap();

    // The leaver's channel is closed after its last message.
    assert!(drain(&mut a, Duration::from_millis(50)).await.iter().all(|m| {
        !matches!(m, ServerMessage::ParticipantLeft { .. })
    }));
    assert!(a.recv().await.is_none());

    recv_until(&mut b, |m| *m == ServerMessage::ParticipantLeft { connection: cid(1) }).await;
    recv_until(&mut b, |m| *m == ServerMessage::HostChanged { host: Some(cid(2)) }).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.participants.len(), 1);
    assert_eq!(snapshot.host, Some(cid(2)));
}

#[tokio::test]
async fn test_rejection_is_sent_to_requester_only() {
    let (handle, _) = spawn_lobby();
    let mut a = join(&handle, 1, "a").await;
    let mut b = join(&handle, 2, "b").await;

    handle.command(cid(2), Command::RequestStart).await.unwrap();
    let rejected = recv_until(&mut b, |m| matches!(m, ServerMessage::Rejected { .. })).await;
    assert!(matches!(
        rejected,
        ServerMessage::Rejected { reason: RejectReason::NotHost, code: 403, .. }
    ));

    let seen_by_host = drain(&mut a, Duration::from_millis(50)).await;
    assert!(!seen_by_host.iter().any(|m| matches!(m, ServerMessage::Rejected { .. })));
}

// =========================================================================
// Countdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_countdown_runs_to_handoff() {
    let (handle, recorder) = spawn_lobby();
    let (mut a, mut b) = two_ready_players(&handle).await;

    handle.command(cid(1), Command::RequestStart).await.unwrap();
    recv_until(&mut a, is_countdown(CountdownState::Counting)).await;

    let mut remaining = Vec::new();
    loop {
        match recv_until(&mut a, |m| {
            matches!(m, ServerMessage::Countdown { .. } | ServerMessage::SceneChange { .. })
        })
        .await
        {
            ServerMessage::Countdown {
                state: CountdownState::Counting,
                remaining_ms,
            } => remaining.push(remaining_ms),
            ServerMessage::Countdown {
                state: CountdownState::Expired,
                ..
            } => {}
            ServerMessage::SceneChange { scene_id, map_index } => {
                assert_eq!(scene_id, "harbor_loop");
                assert_eq!(map_index, 0);
                break;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(remaining, vec![4000, 3000, 2000, 1000]);

    // Lobby streams end after the handoff.
    assert!(a.recv().await.is_none());
    recv_until(&mut b, |m| matches!(m, ServerMessage::SceneChange { .. })).await;
    assert!(b.recv().await.is_none());

    {
        let spawned = recorder.spawned.lock().unwrap();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].0.len(), 2);
        assert_eq!(spawned[0].1, "harbor_loop");
        assert_eq!(*recorder.scenes.lock().unwrap(), vec!["harbor_loop".to_string()]);
    }

    // A fresh session is open for the next lobby phase.
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.participants.is_empty());
    assert_eq!(snapshot.countdown.state, CountdownState::Idle);
    let _c = join(&handle, 3, "next").await;
}

#[tokio::test(start_paused = true)]
async fn test_unready_cancels_and_no_tick_fires_after() {
    let (handle, recorder) = spawn_lobby();
    let (mut a, _b) = two_ready_players(&handle).await;

    handle.command(cid(1), Command::RequestStart).await.unwrap();
    recv_until(&mut a, |m| {
        matches!(m, ServerMessage::Countdown { remaining_ms: 3000, .. })
    })
    .await;

    handle.command(cid(2), Command::SetReady).await.unwrap();
    recv_until(&mut a, is_countdown(CountdownState::Cancelled)).await;
    let idle = recv_until(&mut a, is_countdown(CountdownState::Idle)).await;
    assert_eq!(
        idle,
        ServerMessage::Countdown {
            state: CountdownState::Idle,
            remaining_ms: 5000,
        }
    );

    let later = drain(&mut a, Duration::from_secs(30)).await;
    assert!(
        !later.iter().any(|m| matches!(m, ServerMessage::Countdown { .. })),
        "tick fired after cancel: {later:?}"
    );
    assert!(recorder.spawned.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_countdown_cancels() {
    let (handle, recorder) = spawn_lobby();
    let (mut a, _b) = two_ready_players(&handle).await;

    handle.command(cid(1), Command::RequestStart).await.unwrap();
    recv_until(&mut a, is_countdown(CountdownState::Counting)).await;

    handle.leave(cid(2)).await.unwrap();
    recv_until(&mut a, is_countdown(CountdownState::Cancelled)).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(recorder.spawned.lock().unwrap().is_empty());
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.countdown.state, CountdownState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop_counts_full_duration() {
    let (handle, _) = spawn_lobby();
    let (mut a, _b) = two_ready_players(&handle).await;

    handle.command(cid(1), Command::RequestStart).await.unwrap();
    recv_until(&mut a, |m| {
        matches!(m, ServerMessage::Countdown { remaining_ms: 2000, .. })
    })
    .await;
    handle.command(cid(1), Command::StopCountdown).await.unwrap();
    recv_until(&mut a, is_countdown(CountdownState::Idle)).await;

    handle.command(cid(1), Command::RequestStart).await.unwrap();
    let started = recv_until(&mut a, is_countdown(CountdownState::Counting)).await;
    assert_eq!(
        started,
        ServerMessage::Countdown {
            state: CountdownState::Counting,
            remaining_ms: 5000,
        }
    );
    let first_tick = recv_until(&mut a, is_countdown(CountdownState::Counting)).await;
    assert_eq!(
        first_tick,
        ServerMessage::Countdown {
            state: CountdownState::Counting,
            remaining_ms: 4000,
        }
    );
}

// =========================================================================
// Startup
// =========================================================================

#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let recorder = Recorder::default();
    let result = LobbyHandle::spawn(
        LobbyConfig {
            vehicles: Vec::new(),
            ..Default::default()
        },
        Collaborators::new(recorder.clone(), recorder),
    );
    assert!(matches!(result, Err(ConfigError::EmptyVehicleCatalog)));
}

#[tokio::test]
async fn test_pending_lobby_opens_after_registration() {
    let (handle, registrar) = LobbyHandle::spawn_pending(LobbyConfig::default()).unwrap();
    let recorder = Recorder::default();
    registrar
        .register(Collaborators::new(recorder.clone(), recorder))
        .unwrap();

    let mut a = join(&handle, 1, "a").await;
    assert!(matches!(a.recv().await, Some(ServerMessage::Welcome { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_pending_lobby_closes_after_registration_timeout() {
    let (handle, _registrar) = LobbyHandle::spawn_pending(LobbyConfig::default()).unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = handle.join(cid(1), "a", tx).await;
    assert_eq!(result, Err(LobbyError::SessionClosed));
}

#[tokio::test]
async fn test_shutdown_makes_handle_unavailable() {
    let (handle, _) = spawn_lobby();
    handle.shutdown().await.unwrap();
    // Requests queued behind the shutdown are dropped with the receiver.
    assert_eq!(handle.snapshot().await, Err(LobbyError::Unavailable));
}
