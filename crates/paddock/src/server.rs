//! `PaddockServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → lobby actor.

use std::sync::Arc;
use std::time::Duration;

use paddock_lobby::{Collaborators, LobbyHandle, Registrar};
use paddock_protocol::{Codec, JsonCodec};
use paddock_transport::{Transport, WebSocketTransport};

use crate::PaddockError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;

/// Shared state handed to every connection task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) lobby: LobbyHandle,
    pub(crate) codec: C,
    pub(crate) handshake_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Paddock server.
///
/// # Example
///
/// ```rust,ignore
/// use paddock::prelude::*;
///
/// let server = PaddockServer::builder()
///     .config(ServerConfig::load("paddock.toml")?)
///     .collaborators(Collaborators::new(spawner, scenes))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct PaddockServerBuilder {
    config: ServerConfig,
    collaborators: Option<Collaborators>,
}

impl PaddockServerBuilder {
    /// Creates a builder with [`ServerConfig::default`].
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            collaborators: None,
        }
    }

    /// Replaces the whole configuration, including the listen address.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.listen_addr = addr.to_string();
        self
    }

    /// Sets the handoff collaborators.
    ///
    /// Without them the lobby starts pending; register through
    /// [`PaddockServer::take_registrar`] before `collaborator_timeout`.
    pub fn collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    /// Validates the lobby config, spawns the lobby actor and binds the
    /// listener.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<PaddockServer<JsonCodec>, PaddockError> {
        let lobby_config = self
            .config
            .lobby_config()
            .inspect_err(|err| tracing::error!(%err, "invalid lobby configuration"))?;

        let transport = WebSocketTransport::bind(&self.config.listen_addr).await?;

        let (lobby, registrar) = match self.collaborators {
            Some(collaborators) => (LobbyHandle::spawn(lobby_config, collaborators)?, None),
            None => {
                let (lobby, registrar) = LobbyHandle::spawn_pending(lobby_config)?;
                (lobby, Some(registrar))
            }
        };

        let state = Arc::new(ServerState {
            lobby,
            codec: JsonCodec,
            handshake_timeout: self.config.handshake_timeout(),
            idle_timeout: self.config.idle_timeout(),
        });

        Ok(PaddockServer {
            transport,
            state,
            registrar,
        })
    }
}

impl Default for PaddockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Paddock server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PaddockServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    registrar: Option<Registrar>,
}

impl PaddockServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PaddockServerBuilder {
        PaddockServerBuilder::new()
    }
}

impl<C: Codec> PaddockServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle to the lobby actor, for snapshots and shutdown.
    pub fn lobby(&self) -> LobbyHandle {
        self.state.lobby.clone()
    }

    /// The collaborator registrar of a pending lobby. `None` if the
    /// collaborators were given to the builder or it was already taken.
    pub fn take_registrar(&mut self) -> Option<Registrar> {
        self.registrar.take()
    }

    /// Runs the accept loop.
    ///
    /// Each connection gets its own task; see the `handler` module for
    /// what happens there. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), PaddockError> {
        tracing::info!(addr = ?self.local_addr().ok(), "paddock server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
