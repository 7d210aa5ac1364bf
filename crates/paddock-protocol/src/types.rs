//! Core protocol types for Paddock's wire format.
//!
//! Everything here travels on the wire. The shapes are fixed by the JSON
//! tests at the bottom of this file; a client SDK relies on them.

use std::fmt;

use paddock_transport::ConnectionId;
use serde::{Deserialize, Serialize};

use crate::view::{LobbySnapshot, ParticipantView};

/// Version a client must announce in [`ClientMessage::Hello`].
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Recipient: who should receive a message?
// ---------------------------------------------------------------------------

/// Addressing for an outbound [`ServerMessage`].
///
/// The lobby core returns `(Recipient, ServerMessage)` pairs after every
/// command; the dispatcher fans them out to connection channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every participant in the session.
    All,
    /// One connection only (targeted updates, rejections).
    Connection(ConnectionId),
    /// Everyone but the given connection (deltas about that connection).
    AllExcept(ConnectionId),
}

impl Recipient {
    /// Returns `true` if a message addressed this way reaches `connection`.
    pub fn includes(&self, connection: ConnectionId) -> bool {
        match self {
            Self::All => true,
            Self::Connection(target) => *target == connection,
            Self::AllExcept(excluded) => *excluded != connection,
        }
    }
}

// ---------------------------------------------------------------------------
// Small value types shared by requests and events
// ---------------------------------------------------------------------------

/// Which way to cycle through the vehicle catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    /// `+1` or `-1`.
    pub fn step(self) -> isize {
        match self {
            Self::Next => 1,
            Self::Previous => -1,
        }
    }
}

impl TryFrom<i32> for Direction {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Next),
            -1 => Ok(Self::Previous),
            other => Err(other),
        }
    }
}

/// Phase of the start countdown.
///
/// ```text
/// Idle ──start──▶ Counting ──reaches zero──▶ Expired
///                    │
///                    └──invalidated/stop──▶ Cancelled ──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CountdownState {
    #[default]
    Idle,
    Counting,
    /// Terminal for the session generation; triggers the handoff.
    Expired,
    /// Transient: always followed by `Idle` within the same command.
    Cancelled,
}

impl fmt::Display for CountdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Counting => write!(f, "Counting"),
            Self::Expired => write!(f, "Expired"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Machine-readable reason attached to a [`ServerMessage::Rejected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Every slot is taken or the participant cap is reached.
    NoSlot,
    AlreadyJoined,
    UnknownConnection,
    /// Only the host may start or stop the countdown.
    NotHost,
    NotEnoughPlayers,
    TooManyPlayers,
    NotAllReady,
    /// Vehicle and map choices are frozen while the participant is ready.
    LockedWhileReady,
    InvalidMap,
    InvalidName,
    CountdownActive,
    CountdownNotRunning,
    /// The session was handed off or never finished initializing.
    SessionClosed,
    Unavailable,
}

impl RejectReason {
    /// HTTP-style status code sent alongside the reason.
    pub fn code(self) -> u16 {
        match self {
            Self::InvalidMap | Self::InvalidName => 400,
            Self::NotHost | Self::LockedWhileReady => 403,
            Self::UnknownConnection => 404,
            Self::NoSlot
            | Self::AlreadyJoined
            | Self::NotEnoughPlayers
            | Self::TooManyPlayers
            | Self::NotAllReady
            | Self::CountdownActive
            | Self::CountdownNotRunning => 409,
            Self::SessionClosed | Self::Unavailable => 503,
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client may send.
///
/// `Hello` must be the first frame on a connection; it carries the display
/// name and is what admits the connection into the lobby. All other
/// requests are fire-and-forget: the server's broadcast is the only ack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Hello { version: u32, name: String },
    Heartbeat { client_time: u64 },
    /// Toggles the sender's ready flag.
    SetReady,
    ChangeVehicle { direction: Direction },
    VoteMap { map_index: usize },
    RequestStart,
    StopCountdown,
    SetName { name: String },
    Leave,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything the server may send.
///
/// `Welcome` carries a full snapshot; the rest are deltas a client folds
/// into its [`LobbyView`](crate::LobbyView).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Welcome {
        you: ConnectionId,
        snapshot: LobbySnapshot,
    },
    ParticipantJoined {
        participant: ParticipantView,
    },
    ParticipantUpdated {
        participant: ParticipantView,
    },
    ParticipantLeft {
        connection: ConnectionId,
    },
    HostChanged {
        host: Option<ConnectionId>,
    },
    Countdown {
        state: CountdownState,
        remaining_ms: u64,
    },
    VoteTally {
        map_index: usize,
        votes: usize,
    },
    /// The lobby phase is over; load `scene_id`.
    SceneChange {
        scene_id: String,
        map_index: usize,
    },
    Rejected {
        code: u16,
        reason: RejectReason,
        message: String,
    },
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },
    /// Protocol-level failure (bad handshake, undecodable frame).
    Error {
        code: u16,
        message: String,
    },
}

impl ServerMessage {
    /// Builds a `Rejected` message with the reason's status code.
    pub fn rejected(reason: RejectReason, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: reason.code(),
            reason,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// Direction-tagged content of an [`Envelope`].
///
/// Adjacently tagged: `{ "type": "Client", "data": { "type": "SetReady" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    Client(ClientMessage),
    Server(ServerMessage),
}

/// The top-level message wrapper. Every frame on the wire is one Envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number, starting at 0.
    pub seq: u64,
    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,
    pub payload: Payload,
}
