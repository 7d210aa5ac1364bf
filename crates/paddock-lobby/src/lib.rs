//! Authoritative pre-race lobby for Paddock.
//!
//! One [`SessionDirectory`] owns every participant record of a lobby
//! session and is the only code that mutates them. A [`LobbyHandle`] fronts
//! it with an actor, so commands from many connections are applied one at
//! a time.
//!
//! # Key types
//!
//! - [`SessionDirectory`]: join/leave, participant commands, handoff
//! - [`SlotAllocator`]: lowest-free-first grid slots
//! - [`ReadyGate`]: ready-quorum with a self-checking counter
//! - [`CountdownController`]: Idle/Counting/Expired/Cancelled machine
//! - [`VoteTally`]: first-seen-max plurality vote
//! - [`LobbyHandle`]: actor front end, owns the countdown tick source
//! - [`SpawnCollaborator`], [`SceneTransport`]: where the handoff goes

mod actor;
mod config;
mod countdown;
mod directory;
mod error;
mod handoff;
mod participant;
mod ready;
mod slots;
mod vote;

pub use actor::{LobbyHandle, ParticipantSender, Registrar};
pub use config::LobbyConfig;
pub use countdown::{CountdownController, TickOutcome};
pub use directory::{Command, Outbound, SessionDirectory};
pub use error::{ConfigError, LobbyError};
pub use handoff::{Collaborators, HandoffRecord, SceneTransport, SpawnCollaborator};
pub use participant::{MAX_NAME_LEN, ParticipantRecord, sanitize_name};
pub use ready::{GateBlocker, ReadyGate};
pub use slots::{Full, SlotAllocator};
pub use vote::VoteTally;
