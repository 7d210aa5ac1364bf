//! Replicated lobby state as clients see it.
//!
//! The server sends one [`LobbySnapshot`] on join and deltas afterwards.
//! [`LobbyView::apply`] is the single reducer a client runs every incoming
//! [`ServerMessage`] through; there are no per-field callbacks.

use paddock_transport::ConnectionId;
use serde::{Deserialize, Serialize};

use crate::{CountdownState, MapOption, RejectReason, ServerMessage, VehicleOption};

/// Public state of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub connection: ConnectionId,
    pub name: String,
    pub vehicle_index: usize,
    pub ready: bool,
    pub slot: usize,
    pub map_vote: usize,
}

/// Countdown phase plus remaining time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountdownStatus {
    pub state: CountdownState,
    pub remaining_ms: u64,
}

/// Current plurality winner of the map vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TallyView {
    pub map_index: usize,
    pub votes: usize,
}

/// Full session state, sent to a connection when it joins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LobbySnapshot {
    /// In registration order.
    pub participants: Vec<ParticipantView>,
    pub host: Option<ConnectionId>,
    pub countdown: CountdownStatus,
    pub tally: TallyView,
    pub maps: Vec<MapOption>,
    pub vehicles: Vec<VehicleOption>,
    pub min_players: usize,
    pub max_players: usize,
    pub slot_count: usize,
}

/// Client-side replica of the lobby.
///
/// May lag the server (a departed participant lingers until its
/// `ParticipantLeft` arrives) but converges once every broadcast is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LobbyView {
    me: Option<ConnectionId>,
    snapshot: LobbySnapshot,
    scene: Option<String>,
    last_rejection: Option<RejectReason>,
}

impl LobbyView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one server message into the view.
    ///
    /// Returns `true` if the replicated state changed.
    pub fn apply(&mut self, msg: &ServerMessage) -> bool {
        match msg {
            ServerMessage::Welcome { you, snapshot } => {
                self.me = Some(*you);
                self.snapshot = snapshot.clone();
                self.scene = None;
                true
            }
            ServerMessage::ParticipantJoined { participant }
            | ServerMessage::ParticipantUpdated { participant } => self.upsert(participant),
            ServerMessage::ParticipantLeft { connection } => {
                let before = self.snapshot.participants.len();
                self.snapshot
                    .participants
                    .retain(|p| p.connection != *connection);
                before != self.snapshot.participants.len()
            }
            ServerMessage::HostChanged { host } => {
                replace(&mut self.snapshot.host, *host)
            }
            ServerMessage::Countdown {
                state,
                remaining_ms,
            } => replace(
                &mut self.snapshot.countdown,
                CountdownStatus {
                    state: *state,
                    remaining_ms: *remaining_ms,
                },
            ),
            ServerMessage::VoteTally { map_index, votes } => replace(
                &mut self.snapshot.tally,
                TallyView {
                    map_index: *map_index,
                    votes: *votes,
                },
            ),
            ServerMessage::SceneChange { scene_id, .. } => {
                self.scene = Some(scene_id.clone());
                true
            }
            ServerMessage::Rejected { reason, .. } => {
                self.last_rejection = Some(*reason);
                false
            }
            ServerMessage::HeartbeatAck { .. } | ServerMessage::Error { .. } => false,
        }
    }

    fn upsert(&mut self, participant: &ParticipantView) -> bool {
        match self
            .snapshot
            .participants
            .iter_mut()
            .find(|p| p.connection == participant.connection)
        {
            Some(existing) => replace(existing, participant.clone()),
            None => {
                self.snapshot.participants.push(participant.clone());
                true
            }
        }
    }

    /// This client's connection id, known after `Welcome`.
    pub fn me(&self) -> Option<ConnectionId> {
        self.me
    }

    pub fn snapshot(&self) -> &LobbySnapshot {
        &self.snapshot
    }

    pub fn participant(&self, connection: ConnectionId) -> Option<&ParticipantView> {
        self.snapshot
            .participants
            .iter()
            .find(|p| p.connection == connection)
    }

    /// This client's own participant entry.
    pub fn local_participant(&self) -> Option<&ParticipantView> {
        self.me.and_then(|me| self.participant(me))
    }

    pub fn is_host(&self) -> bool {
        self.me.is_some() && self.me == self.snapshot.host
    }

    /// Scene to load, set once the server announced the handoff.
    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    pub fn last_rejection(&self) -> Option<RejectReason> {
        self.last_rejection
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
