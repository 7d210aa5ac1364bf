//! Unified error type for the Paddock server.

use paddock_lobby::{ConfigError, LobbyError};
use paddock_protocol::ProtocolError;
use paddock_transport::TransportError;

/// Top-level error that wraps every layer's errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors, so the
/// connection handler and the builder only ever return this type.
#[derive(Debug, thiserror::Error)]
pub enum PaddockError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The lobby refused a request or is gone.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// The lobby configuration cannot host a session.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
