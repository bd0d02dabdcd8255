//! Per-connection handler: welcome, message routing, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Spawn the outbound forwarder and send `Welcome`
//!   2. Loop: receive envelopes → dispatch to the roster or a session
//!   3. On exit (close, error, idle timeout) → leave every session
//!
//! Everything the client receives, direct replies and session broadcasts
//! alike, goes through one unbounded channel drained by the forwarder, so
//! outbound `seq` numbers are gap-free and in send order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use duelhall_protocol::{ClientMessage, Codec, ConnectionId, Envelope, ServerMessage, SessionId};
use duelhall_roster::{AnimationProvider, CombatantProvider};
use duelhall_session::{ParticipantSender, SessionError, SessionHandle};
use duelhall_transport::{Connection, TransportError, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::DuelError;
use crate::server::ServerState;

/// Drop guard that removes the connection from every session when the
/// handler exits, and stops its forwarder.
///
/// Cleanup runs even if the handler panics. Since `Drop` is synchronous,
/// the registry work is spawned as a fire-and-forget task.
struct ParticipantGuard<R: CombatantProvider, A: AnimationProvider, C: Codec> {
    connection_id: ConnectionId,
    state: Arc<ServerState<R, A, C>>,
    forwarder: JoinHandle<()>,
}

impl<R: CombatantProvider, A: AnimationProvider, C: Codec> Drop for ParticipantGuard<R, A, C> {
    fn drop(&mut self) {
        self.forwarder.abort();
        let connection_id = self.connection_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let left = state.registry.disconnect(connection_id).await;
            tracing::info!(%connection_id, sessions = left.len(), "connection cleaned up");
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<R, A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<R, A, C>>,
) -> Result<(), DuelError>
where
    R: CombatantProvider,
    A: AnimationProvider,
    C: Codec,
{
    let conn = Arc::new(conn);
    let connection_id = conn.id();
    let start = Instant::now();
    tracing::info!(%connection_id, peer = %conn.peer_addr(), "connection accepted");

    let (outbound, rx) = mpsc::unbounded_channel();
    let forwarder = tokio::spawn(forward_outbound(
        Arc::clone(&conn),
        Arc::clone(&state),
        rx,
        start,
    ));
    let _guard = ParticipantGuard {
        connection_id,
        state: Arc::clone(&state),
        forwarder,
    };

    reply(
        &outbound,
        ServerMessage::Welcome {
            connection_id,
            server_time: millis_since(start),
        },
    )?;

    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%connection_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%connection_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%connection_id, "connection timed out");
                let _ = conn.close().await;
                break;
            }
        };

        let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "failed to decode envelope");
                reply(
                    &outbound,
                    ServerMessage::Error {
                        code: 400,
                        message: format!("invalid message: {e}"),
                    },
                )?;
                continue;
            }
        };

        let should_close =
            dispatch(&state, connection_id, &outbound, envelope.payload, start).await?;
        if should_close {
            let _ = conn.close().await;
            break;
        }
    }

    // _guard drops here → disconnect cleanup fires.
    Ok(())
}

/// Handles one client message. Returns `true` if the connection should
/// close.
async fn dispatch<R, A, C>(
    state: &Arc<ServerState<R, A, C>>,
    connection_id: ConnectionId,
    outbound: &ParticipantSender,
    msg: ClientMessage,
    start: Instant,
) -> Result<bool, DuelError>
where
    R: CombatantProvider,
    A: AnimationProvider,
    C: Codec,
{
    match msg {
        ClientMessage::Heartbeat { client_time } => {
            reply(
                outbound,
                ServerMessage::HeartbeatAck {
                    client_time,
                    server_time: millis_since(start),
                },
            )?;
        }

        ClientMessage::Join { session_id } => {
            let result = state
                .registry
                .join_session(session_id.clone(), connection_id, outbound.clone())
                .await;
            report(outbound, connection_id, &session_id, result)?;
        }

        ClientMessage::Leave { session_id } => {
            let result = state
                .registry
                .remove_participant(&session_id, connection_id)
                .await;
            report(outbound, connection_id, &session_id, result)?;
        }

        ClientMessage::Search {
            request_id,
            provider,
            query,
        } => {
            // Remote lookups can take seconds; keep reading meanwhile.
            let state = Arc::clone(state);
            let outbound = outbound.clone();
            tokio::spawn(async move {
                let combatants = state.roster.search(provider, &query).await;
                tracing::debug!(%connection_id, request_id, results = combatants.len(), "search answered");
                let _ = outbound.send(ServerMessage::SearchResults {
                    request_id,
                    combatants,
                });
            });
        }

        ClientMessage::Select {
            session_id,
            combatant,
        } => {
            let result = match session_handle(state, &session_id).await {
                Ok(handle) => handle.select(connection_id, combatant).await,
                Err(e) => Err(e),
            };
            report(outbound, connection_id, &session_id, result)?;
        }

        ClientMessage::Attack { session_id, kind } => {
            let result = match session_handle(state, &session_id).await {
                Ok(handle) => handle.attack(connection_id, kind).await,
                Err(e) => Err(e),
            };
            report(outbound, connection_id, &session_id, result)?;
        }

        ClientMessage::Restart { session_id } => {
            let result = match session_handle(state, &session_id).await {
                Ok(handle) => handle.restart(connection_id).await,
                Err(e) => Err(e),
            };
            report(outbound, connection_id, &session_id, result)?;
        }

        ClientMessage::Disconnect { reason } => {
            tracing::info!(%connection_id, %reason, "client disconnected");
            return Ok(true);
        }
    }

    Ok(false)
}

/// Clones the session's handle out of the registry, so the caller awaits
/// the actor without touching the registry.
async fn session_handle<R, A, C>(
    state: &Arc<ServerState<R, A, C>>,
    session_id: &SessionId,
) -> Result<SessionHandle, SessionError>
where
    R: CombatantProvider,
    A: AnimationProvider,
    C: Codec,
{
    state.registry.handle(session_id).await
}

/// Answers a failed session operation with an `Error` frame.
fn report(
    outbound: &ParticipantSender,
    connection_id: ConnectionId,
    session_id: &SessionId,
    result: Result<(), SessionError>,
) -> Result<(), DuelError> {
    if let Err(e) = result {
        tracing::debug!(%connection_id, %session_id, error = %e, "session operation rejected");
        reply(
            outbound,
            ServerMessage::Error {
                code: e.code(),
                message: e.to_string(),
            },
        )?;
    }
    Ok(())
}

/// Queues a message for this connection. Fails once the forwarder is
/// gone, which means the socket is.
fn reply(outbound: &ParticipantSender, msg: ServerMessage) -> Result<(), DuelError> {
    outbound
        .send(msg)
        .map_err(|_| DuelError::Transport(TransportError::ConnectionClosed("outbound channel closed".into())))
}

/// Drains the outbound channel onto the socket, wrapping each message in
/// an envelope.
async fn forward_outbound<R, A, C>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<R, A, C>>,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    start: Instant,
) where
    R: CombatantProvider,
    A: AnimationProvider,
    C: Codec,
{
    let connection_id = conn.id();
    let mut seq: u64 = 0;

    while let Some(payload) = rx.recv().await {
        let envelope = Envelope {
            seq: next_seq(&mut seq),
            timestamp: millis_since(start),
            payload,
        };
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%connection_id, error = %e, "failed to encode outbound message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%connection_id, error = %e, "send failed, stopping forwarder");
            break;
        }
    }
}

/// Milliseconds elapsed since `start`.
fn millis_since(start: Instant) -> u64 {
    whole_millis(start.elapsed())
}

/// `elapsed` in whole milliseconds, saturating at `u64::MAX`.
fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_millis_truncates_sub_millisecond_part() {
        assert_eq!(whole_millis(Duration::from_micros(2_999)), 2);
    }

    #[test]
    fn test_whole_millis_saturates() {
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_next_seq_counts_from_zero() {
        let mut seq = 0;
        assert_eq!(next_seq(&mut seq), 0);
        assert_eq!(next_seq(&mut seq), 1);
        assert_eq!(seq, 2);
    }
}
