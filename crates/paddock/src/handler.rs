//! Per-connection handler: handshake, lobby admission, message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `Hello` → validate version
//!   2. Join the lobby → the `Welcome` snapshot is queued
//!   3. Loop: forward lobby messages out, route client requests in
//!
//! The loop ends when the peer closes, goes idle, sends `Leave`, or the
//! lobby drops the connection's channel after the handoff.

use std::sync::Arc;

use paddock_lobby::{Command, LobbyHandle};
use paddock_protocol::{
    ClientMessage, Codec, ConnectionId, Envelope, PROTOCOL_VERSION, Payload, ProtocolError,
    ServerMessage,
};
use paddock_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::PaddockError;
use crate::server::ServerState;

/// Drop guard that removes the connection from the lobby when the handler
/// exits, however it exits.
///
/// `Drop` is synchronous, so the leave request is sent from a spawned task.
struct LeaveGuard {
    connection: ConnectionId,
    lobby: LobbyHandle,
}

impl Drop for LeaveGuard {
    fn drop(&mut self) {
        let connection = self.connection;
        let lobby = self.lobby.clone();
        tokio::spawn(async move {
            let _ = lobby.leave(connection).await;
        });
    }
}

/// Outbound side of one connection: sequence numbers and timestamps.
struct Outgoing<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    seq: u64,
    start: Instant,
}

impl<C: Codec> Outgoing<'_, C> {
    fn millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    async fn send(&mut self, msg: ServerMessage) -> Result<(), PaddockError> {
        let envelope = Envelope {
            seq: next_seq(&mut self.seq),
            timestamp: self.millis(),
            payload: Payload::Server(msg),
        };
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn send_error(
        &mut self,
        code: u16,
        message: impl Into<String>,
    ) -> Result<(), PaddockError> {
        self.send(ServerMessage::Error {
            code,
            message: message.into(),
        })
        .await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), PaddockError> {
    let connection = conn.id();
    tracing::debug!(%connection, "handling new connection");

    let mut out = Outgoing {
        conn: &conn,
        codec: &state.codec,
        seq: 0,
        start: Instant::now(),
    };

    // --- Step 1: Hello ---
    let name = match perform_handshake(&conn, &state, &mut out).await {
        Ok(name) => name,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };

    // --- Step 2: Join ---
    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Err(err) = state.lobby.join(connection, name, tx).await {
        tracing::info!(%connection, %err, "join refused");
        out.send(err.to_message()).await?;
        let _ = conn.close().await;
        return Err(err.into());
    }
    let _guard = LeaveGuard {
        connection,
        lobby: state.lobby.clone(),
    };
    tracing::info!(%connection, "participant joined");

    // --- Step 3: Message loop ---
    let idle = tokio::time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(msg) => out.send(msg).await?,
                None => {
                    tracing::info!(%connection, "lobby stream ended");
                    break;
                }
            },
            frame = conn.recv() => {
                let data = match frame {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%connection, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%connection, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(Instant::now() + state.idle_timeout);

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(%connection, error = %e, "failed to decode envelope");
                        continue;
                    }
                };

                match envelope.payload {
                    Payload::Client(msg) => {
                        if handle_client_message(&state.lobby, connection, msg, &mut out).await? {
                            break;
                        }
                    }
                    Payload::Server(_) => {
                        out.send_error(400, "clients may not send server messages").await?;
                    }
                }
            }
            () = &mut idle => {
                tracing::info!(%connection, "connection timed out");
                break;
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here → lobby leave fires.
    Ok(())
}

/// Receives `Hello`, checks the version and returns the requested name.
async fn perform_handshake<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    out: &mut Outgoing<'_, C>,
) -> Result<String, PaddockError> {
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(invalid("connection closed before Hello"));
        }
        Ok(Err(e)) => return Err(PaddockError::Transport(e)),
        Err(_) => {
            return Err(invalid("Hello timed out"));
        }
    };

    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(env) => env,
        Err(e) => {
            out.send_error(400, "malformed envelope").await?;
            return Err(e.into());
        }
    };

    let (version, name) = match envelope.payload {
        Payload::Client(ClientMessage::Hello { version, name }) => (version, name),
        _ => {
            out.send_error(400, "expected Hello").await?;
            return Err(invalid("first message must be Hello"));
        }
    };

    if version != PROTOCOL_VERSION {
        out.send_error(
            400,
            format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(invalid("protocol version mismatch"));
    }

    Ok(name)
}

/// Routes one client request. Returns `true` if the connection should
/// close.
async fn handle_client_message<C: Codec>(
    lobby: &LobbyHandle,
    connection: ConnectionId,
    msg: ClientMessage,
    out: &mut Outgoing<'_, C>,
) -> Result<bool, PaddockError> {
    let command = match msg {
        ClientMessage::Heartbeat { client_time } => {
            let server_time = out.millis();
            out.send(ServerMessage::HeartbeatAck {
                client_time,
                server_time,
            })
            .await?;
            return Ok(false);
        }
        ClientMessage::Hello { .. } => {
            out.send_error(400, "already joined").await?;
            return Ok(false);
        }
        ClientMessage::Leave => {
            tracing::info!(%connection, "client left");
            return Ok(true);
        }
        ClientMessage::SetReady => Command::SetReady,
        ClientMessage::ChangeVehicle { direction } => Command::ChangeVehicle(direction),
        ClientMessage::VoteMap { map_index } => Command::VoteMap(map_index),
        ClientMessage::RequestStart => Command::RequestStart,
        ClientMessage::StopCountdown => Command::StopCountdown,
        ClientMessage::SetName { name } => Command::SetName(name),
    };

    lobby.command(connection, command).await?;
    Ok(false)
}

fn invalid(reason: &str) -> PaddockError {
    PaddockError::Protocol(ProtocolError::InvalidMessage(reason.to_string()))
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
