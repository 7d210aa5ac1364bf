//! # Paddock
//!
//! Authoritative pre-race lobby server for multiplayer racing games.
//!
//! Clients connect over WebSocket, announce themselves with `Hello`, and
//! from then on receive the replicated lobby state: who is in which grid
//! slot, who is ready, how the map vote stands, and the start countdown.
//! When the countdown expires the frozen selections are handed to your
//! [`SpawnCollaborator`] and [`SceneTransport`], and every client is told
//! which scene to load.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paddock::prelude::*;
//!
//! // Implement SpawnCollaborator and SceneTransport, then:
//! // let server = PaddockServer::builder()
//! //     .bind("0.0.0.0:8080")
//! //     .collaborators(Collaborators::new(spawner, scenes))
//! //     .build()
//! //     .await?;
//! // server.run().await
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{LISTEN_ADDR_ENV, LobbySection, ServerConfig, TickPolicySetting};
pub use error::PaddockError;
pub use server::{PaddockServer, PaddockServerBuilder};

pub use paddock_lobby::{SceneTransport, SpawnCollaborator};

/// Everything a server binary usually needs.
pub mod prelude {
    pub use crate::{PaddockError, PaddockServer, PaddockServerBuilder, ServerConfig};
    pub use paddock_lobby::{
        Collaborators, HandoffRecord, LobbyConfig, LobbyHandle, Registrar, SceneTransport,
        SpawnCollaborator,
    };
    pub use paddock_protocol::{
        ClientMessage, ConnectionId, Envelope, LobbySnapshot, LobbyView, MapOption,
        PROTOCOL_VERSION, Payload, RejectReason, ServerMessage, VehicleOption,
    };
}
