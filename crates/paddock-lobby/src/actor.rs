//! Lobby actor: a Tokio task that owns the session directory.
//!
//! All commands reach the directory through one mpsc channel, so they are
//! totally ordered and each one, including its broadcasts, completes
//! before the next begins. The actor also owns the countdown's tick
//! source and arms it only while the directory is counting.

use std::collections::HashMap;

use paddock_protocol::{ConnectionId, CountdownState, LobbySnapshot, Recipient, ServerMessage};
use paddock_tick::{TickInfo, TickScheduler};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::directory::Outbound;
use crate::{Collaborators, Command, ConfigError, LobbyConfig, LobbyError, SessionDirectory};

/// Per-connection outbound channel. Dropped by the actor when the
/// connection leaves or the session is handed off.
pub type ParticipantSender = mpsc::UnboundedSender<ServerMessage>;

const CHANNEL_SIZE: usize = 64;

pub(crate) enum LobbyRequest {
    Join {
        connection: ConnectionId,
        name: String,
        sender: ParticipantSender,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },
    Leave {
        connection: ConnectionId,
        reply: oneshot::Sender<()>,
    },
    /// Fire-and-forget; rejections go to the connection's channel.
    Command {
        connection: ConnectionId,
        command: Command,
    },
    Snapshot {
        reply: oneshot::Sender<LobbySnapshot>,
    },
    Shutdown,
}

/// Handle to a running lobby actor. Cheap to clone.
#[derive(Clone)]
pub struct LobbyHandle {
    sender: mpsc::Sender<LobbyRequest>,
}

/// One-shot registration of the collaborators for a pending lobby.
pub struct Registrar {
    tx: oneshot::Sender<Collaborators>,
}

impl Registrar {
    pub fn register(self, collaborators: Collaborators) -> Result<(), LobbyError> {
        self.tx
            .send(collaborators)
            .map_err(|_| LobbyError::Unavailable)
    }
}

impl LobbyHandle {
    /// Spawns a lobby whose collaborators are known up front.
    pub fn spawn(config: LobbyConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        let directory = SessionDirectory::new(config.clone(), collaborators.clone())?;
        let (handle, actor) = LobbyActor::new(config, Some(collaborators), Some(directory));
        tokio::spawn(actor.run(None));
        Ok(handle)
    }

    /// Spawns a lobby that waits for its collaborators.
    ///
    /// Requests queue until [`Registrar::register`] is called. If that does
    /// not happen within `collaborator_timeout`, the lobby stays closed and
    /// rejects every join with [`LobbyError::SessionClosed`].
    pub fn spawn_pending(config: LobbyConfig) -> Result<(Self, Registrar), ConfigError> {
        config
            .validate()
            .inspect_err(|err| error!(%err, "invalid lobby configuration"))?;
        let (tx, rx) = oneshot::channel();
        let (handle, actor) = LobbyActor::new(config, None, None);
        tokio::spawn(actor.run(Some(rx)));
        Ok((handle, Registrar { tx }))
    }

    /// Admits `connection`. On success the `Welcome` snapshot is already
    /// queued on `sender`.
    pub async fn join(
        &self,
        connection: ConnectionId,
        name: impl Into<String>,
        sender: ParticipantSender,
    ) -> Result<(), LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyRequest::Join {
            connection,
            name: name.into(),
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)?
    }

    /// Removes `connection`. Idempotent.
    pub async fn leave(&self, connection: ConnectionId) -> Result<(), LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyRequest::Leave {
            connection,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)
    }

    /// Queues a participant command (fire-and-forget).
    pub async fn command(
        &self,
        connection: ConnectionId,
        command: Command,
    ) -> Result<(), LobbyError> {
        self.send(LobbyRequest::Command {
            connection,
            command,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<LobbySnapshot, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyRequest::Snapshot { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)
    }

    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.send(LobbyRequest::Shutdown).await
    }

    async fn send(&self, request: LobbyRequest) -> Result<(), LobbyError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| LobbyError::Unavailable)
    }
}

struct LobbyActor {
    config: LobbyConfig,
    collaborators: Option<Collaborators>,
    /// `None` while pending, or after collaborators failed to register.
    directory: Option<SessionDirectory>,
    senders: HashMap<ConnectionId, ParticipantSender>,
    scheduler: TickScheduler,
    /// Countdown generation the scheduler is armed for.
    armed_for: Option<u64>,
    sessions: u64,
    receiver: mpsc::Receiver<LobbyRequest>,
}

impl LobbyActor {
    fn new(
        config: LobbyConfig,
        collaborators: Option<Collaborators>,
        directory: Option<SessionDirectory>,
    ) -> (LobbyHandle, Self) {
        let (tx, rx) = mpsc::channel(CHANNEL_SIZE);
        let actor = Self {
            scheduler: TickScheduler::new(config.tick_config()),
            sessions: u64::from(directory.is_some()),
            config,
            collaborators,
            directory,
            senders: HashMap::new(),
            armed_for: None,
            receiver: rx,
        };
        (LobbyHandle { sender: tx }, actor)
    }

    async fn run(mut self, registration: Option<oneshot::Receiver<Collaborators>>) {
        if let Some(rx) = registration {
            self.await_collaborators(rx).await;
        }
        info!(open = self.directory.is_some(), "lobby actor started");

        loop {
            tokio::select! {
                request = self.receiver.recv() => {
                    let Some(request) = request else { break };
                    if !self.handle(request) {
                        break;
                    }
                }
                tick = self.scheduler.wait_for_tick() => {
                    self.on_tick(tick);
                    self.scheduler.record_tick_end();
                }
            }
        }

        info!(sessions = self.sessions, "lobby actor stopped");
    }

    async fn await_collaborators(&mut self, rx: oneshot::Receiver<Collaborators>) {
        let timeout = self.config.collaborator_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(collaborators)) => {
                info!("collaborators registered");
                self.collaborators = Some(collaborators);
                self.open_session();
            }
            Ok(Err(_)) => {
                error!("registrar dropped before registering collaborators, lobby closed");
            }
            Err(_) => {
                let err = ConfigError::CollaboratorTimeout(timeout);
                error!(%err, "lobby closed");
            }
        }
    }

    /// Starts a fresh session generation.
    fn open_session(&mut self) {
        let Some(collaborators) = self.collaborators.clone() else {
            return;
        };
        match SessionDirectory::new(self.config.clone(), collaborators) {
            Ok(directory) => {
                self.sessions += 1;
                debug!(session = self.sessions, "lobby session opened");
                self.directory = Some(directory);
            }
            Err(err) => {
                error!(%err, "could not open lobby session");
                self.directory = None;
            }
        }
    }

    /// Returns `false` when the actor should stop.
    fn handle(&mut self, request: LobbyRequest) -> bool {
        match request {
            LobbyRequest::Join {
                connection,
                name,
                sender,
                reply,
            } => {
                let result = match self.directory.as_mut() {
                    Some(directory) => directory.join(connection, &name),
                    None => Err(LobbyError::SessionClosed),
                };
                match result {
                    Ok(out) => {
                        self.senders.insert(connection, sender);
                        self.dispatch(out);
                        self.sync_timer();
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        debug!(%connection, %err, "join rejected");
                        let _ = reply.send(Err(err));
                    }
                }
            }
            LobbyRequest::Leave { connection, reply } => {
                let out = self
                    .directory
                    .as_mut()
                    .map(|directory| directory.leave(connection))
                    .unwrap_or_default();
                self.senders.remove(&connection);
                self.dispatch(out);
                self.sync_timer();
                let _ = reply.send(());
            }
            LobbyRequest::Command {
                connection,
                command,
            } => {
                let result = match self.directory.as_mut() {
                    Some(directory) => directory.apply(connection, command),
                    None => Err(LobbyError::SessionClosed),
                };
                match result {
                    Ok(out) => {
                        self.dispatch(out);
                        self.sync_timer();
                    }
                    Err(err) => self.send_to(connection, err.to_message()),
                }
            }
            LobbyRequest::Snapshot { reply } => {
                let snapshot = self
                    .directory
                    .as_ref()
                    .map(SessionDirectory::snapshot)
                    .unwrap_or_default();
                let _ = reply.send(snapshot);
            }
            LobbyRequest::Shutdown => {
                info!("lobby shutting down");
                return false;
            }
        }
        true
    }

    fn on_tick(&mut self, tick: TickInfo) {
        let (Some(generation), Some(directory)) = (self.armed_for, self.directory.as_mut()) else {
            return;
        };
        let out = directory.tick(generation);
        let closed = directory.is_closed();
        self.dispatch(out);

        if closed {
            debug!(ticks = tick.tick, "session handed off, starting a new one");
            self.scheduler.disarm();
            self.armed_for = None;
            // Closing the channels ends each connection's lobby stream.
            self.senders.clear();
            self.open_session();
        } else {
            self.sync_timer();
        }
    }

    /// Arms the tick source iff the directory is counting.
    fn sync_timer(&mut self) {
        let counting = self
            .directory
            .as_ref()
            .filter(|d| d.countdown_state() == CountdownState::Counting)
            .map(SessionDirectory::countdown_generation);

        match (counting, self.armed_for) {
            (Some(generation), Some(armed)) if generation == armed => {}
            (Some(generation), _) => {
                self.scheduler.arm();
                self.armed_for = Some(generation);
            }
            (None, Some(_)) => {
                self.scheduler.disarm();
                self.armed_for = None;
            }
            (None, None) => {}
        }
    }

    fn dispatch(&self, out: Outbound) {
        for (recipient, msg) in out {
            match recipient {
                Recipient::Connection(connection) => self.send_to(connection, msg),
                Recipient::All | Recipient::AllExcept(_) => {
                    for (connection, sender) in &self.senders {
                        if recipient.includes(*connection) {
                            let _ = sender.send(msg.clone());
                        }
                    }
                }
            }
        }
    }

    /// Drops the message if the receiver is gone.
    fn send_to(&self, connection: ConnectionId, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&connection) {
            let _ = sender.send(msg);
        }
    }
}
