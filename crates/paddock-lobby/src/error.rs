//! Error types for the lobby layer.

use std::time::Duration;

use paddock_protocol::{ConnectionId, RejectReason, ServerMessage};

/// A command the lobby refused.
///
/// Rejections never mutate state. Each variant maps to one wire
/// [`RejectReason`], which the actor sends back to the requesting
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// Every slot is taken or the participant cap is reached.
    #[error("no free slot")]
    NoSlot,

    #[error("{0} already joined")]
    AlreadyJoined(ConnectionId),

    #[error("{0} is not in the lobby")]
    UnknownConnection(ConnectionId),

    #[error("only the host can do that")]
    NotHost,

    #[error("need at least {min} players, have {count}")]
    NotEnoughPlayers { count: usize, min: usize },

    #[error("at most {max} players allowed, have {count}")]
    TooManyPlayers { count: usize, max: usize },

    #[error("{waiting} participant(s) not ready")]
    NotAllReady { waiting: usize },

    /// Vehicle and map choices are frozen while ready.
    #[error("choices are locked while ready")]
    LockedWhileReady,

    #[error("map {index} does not exist (catalog has {len})")]
    InvalidMap { index: usize, len: usize },

    #[error("name must not be empty")]
    InvalidName,

    #[error("countdown already running")]
    CountdownActive,

    #[error("countdown is not running")]
    CountdownNotRunning,

    /// Handed off to gameplay, or never opened.
    #[error("lobby session is closed")]
    SessionClosed,

    /// The actor's command channel is full or closed.
    #[error("lobby is unavailable")]
    Unavailable,
}

impl LobbyError {
    pub fn reason(&self) -> RejectReason {
        match self {
            Self::NoSlot => RejectReason::NoSlot,
            Self::AlreadyJoined(_) => RejectReason::AlreadyJoined,
            Self::UnknownConnection(_) => RejectReason::UnknownConnection,
            Self::NotHost => RejectReason::NotHost,
            Self::NotEnoughPlayers { .. } => RejectReason::NotEnoughPlayers,
            Self::TooManyPlayers { .. } => RejectReason::TooManyPlayers,
            Self::NotAllReady { .. } => RejectReason::NotAllReady,
            Self::LockedWhileReady => RejectReason::LockedWhileReady,
            Self::InvalidMap { .. } => RejectReason::InvalidMap,
            Self::InvalidName => RejectReason::InvalidName,
            Self::CountdownActive => RejectReason::CountdownActive,
            Self::CountdownNotRunning => RejectReason::CountdownNotRunning,
            Self::SessionClosed => RejectReason::SessionClosed,
            Self::Unavailable => RejectReason::Unavailable,
        }
    }

    /// The `Rejected` message sent to the requesting connection.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::rejected(self.reason(), self.to_string())
    }
}

/// A lobby configuration that cannot host a session.
///
/// Fatal: a lobby with an invalid config never admits a participant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("map catalog is empty")]
    EmptyMapCatalog,

    #[error("vehicle catalog is empty")]
    EmptyVehicleCatalog,

    #[error("slot count must be at least 1")]
    ZeroSlots,

    #[error("min_players must be at least 1")]
    ZeroMinPlayers,

    #[error("min_players ({min}) exceeds max_players ({max})")]
    MinAboveMax { min: usize, max: usize },

    #[error("max_players ({max}) exceeds slot count ({slots})")]
    MaxAboveSlots { max: usize, slots: usize },

    #[error("countdown duration must be non-zero")]
    ZeroCountdown,

    #[error("tick interval must be non-zero")]
    ZeroTickInterval,

    #[error("map {index} has an empty scene id")]
    EmptySceneId { index: usize },

    #[error("collaborators did not register within {0:?}")]
    CollaboratorTimeout(Duration),
}
