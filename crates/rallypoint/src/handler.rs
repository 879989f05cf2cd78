//! Per-connection handler: greeting, message routing, and room fan-out.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Assign a fresh player id and send `Welcome`
//!   2. Loop: wait on the socket, the room broadcast, and the idle deadline
//!   3. On exit, report the disconnect to the registry, then close

use std::sync::Arc;

use rallypoint_protocol::{ClientMessage, Codec, ErrorCode, PROTOCOL_VERSION, PlayerId, ServerMessage};
use rallypoint_room::{Joined, RoomError, RoomEvent, ScoreEvent};
use rallypoint_transport::{Connection, WebSocketConnection};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::RallypointError;
use crate::server::ServerState;

/// What one connection currently is: a player id and, while in a room,
/// a subscription to that room's events.
///
/// The handler reports the disconnect inline before closing the socket.
/// If the task unwinds or is cancelled first, dropping the session reports
/// it from a spawned task instead; nothing is reported once the runtime is
/// gone.
struct Session<C: Codec> {
    player_id: PlayerId,
    events: Option<broadcast::Receiver<RoomEvent>>,
    state: Arc<ServerState<C>>,
    reported: bool,
}

impl<C: Codec> Session<C> {
    fn enter(&mut self, joined: Joined) {
        self.events = Some(joined.events);
    }

    async fn report_disconnect(&mut self) {
        if let Some(room_id) = self.state.registry.handle_disconnect(&self.player_id).await {
            debug!(player_id = %self.player_id, %room_id, "disconnect reported to room");
        }
        self.reported = true;
    }
}

impl<C: Codec> Drop for Session<C> {
    fn drop(&mut self) {
        if self.reported {
            return;
        }
        let player_id = self.player_id.clone();
        let state = Arc::clone(&self.state);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            if let Some(room_id) = state.registry.handle_disconnect(&player_id).await {
                debug!(%player_id, %room_id, "disconnect reported to room");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), RallypointError> {
    let conn_id = conn.id();
    let mut session = Session {
        player_id: PlayerId::new(Uuid::new_v4().to_string()),
        events: None,
        state: Arc::clone(&state),
        reported: false,
    };
    info!(%conn_id, player_id = %session.player_id, peer = %conn.peer_addr(), "player connected");

    let result = serve(&conn, &state, &mut session).await;

    // Release the seat before the close handshake completes, so a client
    // that reconnects as soon as it sees the close finds itself
    // disconnected.
    session.report_disconnect().await;
    let _ = conn.close().await;
    result
}

/// Greets the client, then routes frames and room events until the
/// connection ends or goes idle.
async fn serve<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    session: &mut Session<C>,
) -> Result<(), RallypointError> {
    let conn_id = conn.id();
    send(
        conn,
        state,
        &ServerMessage::Welcome {
            player_id: session.player_id.clone(),
            protocol_version: PROTOCOL_VERSION,
            server_time: state.registry.now_millis(),
        },
    )
    .await?;

    let idle_timeout = state.config.idle_timeout();
    let mut deadline = Instant::now() + idle_timeout;

    loop {
        tokio::select! {
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        info!(%conn_id, player_id = %session.player_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        debug!(%conn_id, player_id = %session.player_id, error = %e, "recv error");
                        break;
                    }
                };
                deadline = Instant::now() + idle_timeout;
                handle_frame(conn, state, session, &data).await?;
            }

            event = next_event(&mut session.events) => match event {
                Ok(event) => send(conn, state, &event.into()).await?,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(player_id = %session.player_id, skipped, "connection fell behind room events");
                }
                Err(RecvError::Closed) => {
                    session.events = None;
                }
            },

            () = tokio::time::sleep_until(deadline) => {
                info!(%conn_id, player_id = %session.player_id, "connection idle, dropping");
                break;
            }
        }
    }
    Ok(())
}

/// Waits for the next room event, or forever when not in a room.
async fn next_event(
    events: &mut Option<broadcast::Receiver<RoomEvent>>,
) -> Result<RoomEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_frame<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    session: &mut Session<C>,
    data: &[u8],
) -> Result<(), RallypointError> {
    let msg = match state
        .codec
        .decode_client(data)
        .and_then(|msg| msg.validate().map(|()| msg))
    {
        Ok(msg) => msg,
        // A score event with unusable fields is a rejected score event,
        // not a bad request.
        Err(e) if state.codec.client_message_type(data).as_deref() == Some("ScoreEvent") => {
            debug!(player_id = %session.player_id, error = %e, "malformed score event");
            return reject_score_event(conn, state, &RoomError::InvalidEvent(e.to_string()))
                .await;
        }
        Err(e) => {
            debug!(player_id = %session.player_id, error = %e, "bad client message");
            return send_error(conn, state, ErrorCode::BadRequest, e.to_string()).await;
        }
    };

    let registry = &state.registry;
    match msg {
        ClientMessage::Heartbeat { client_time } => {
            let ack = ServerMessage::HeartbeatAck {
                client_time,
                server_time: registry.now_millis(),
            };
            send(conn, state, &ack).await?;
        }

        ClientMessage::CreateRoom { player_name } => {
            match registry
                .create_room(session.player_id.clone(), player_name.trim())
                .await
            {
                Ok(joined) => {
                    let reply = ServerMessage::RoomCreated {
                        room_id: joined.room_id().clone(),
                        room_code: joined.room_code().clone(),
                    };
                    session.enter(joined);
                    send(conn, state, &reply).await?;
                }
                Err(e) => send_room_error(conn, state, &e).await?,
            }
        }

        ClientMessage::JoinRoom {
            room_code,
            player_name,
        } => {
            match registry
                .join_room(&room_code, session.player_id.clone(), player_name.trim())
                .await
            {
                Ok(joined) => {
                    let snapshot = joined.snapshot.clone();
                    session.enter(joined);
                    let reply = ServerMessage::RoomJoined {
                        room_id: snapshot.room_id,
                        room_code: snapshot.room_code,
                        players: snapshot.players,
                        state: snapshot.state,
                    };
                    send(conn, state, &reply).await?;
                }
                Err(e) => send_room_error(conn, state, &e).await?,
            }
        }

        ClientMessage::LeaveRoom => {
            if !registry.leave_room(&session.player_id).await {
                debug!(player_id = %session.player_id, "leave while not in a room");
            }
            session.events = None;
        }

        ClientMessage::StartGame => match registry.start_game(&session.player_id).await {
            Ok(()) => send(conn, state, &ServerMessage::GameStartAccepted).await?,
            Err(e) => send_room_error(conn, state, &e).await?,
        },

        ClientMessage::ScoreEvent {
            kind,
            value,
            timestamp,
        } => {
            let event = ScoreEvent {
                kind,
                value,
                timestamp,
            };
            // Success is announced by the room's ScoreUpdate broadcast.
            if let Err(e) = registry.process_score_event(&session.player_id, event).await {
                debug!(player_id = %session.player_id, error = %e, "score event rejected");
                reject_score_event(conn, state, &e).await?;
            }
        }

        ClientMessage::Reconnect { room_id, player_id } => {
            match registry.handle_reconnect(&player_id, &room_id).await {
                Ok(joined) => {
                    if player_id != session.player_id {
                        registry.leave_room(&session.player_id).await;
                    }
                    info!(
                        previous = %session.player_id,
                        %player_id,
                        %room_id,
                        "connection resumed player"
                    );
                    session.player_id = player_id;
                    let snapshot = joined.snapshot.clone();
                    session.enter(joined);
                    let reply = ServerMessage::Reconnected {
                        room_id: snapshot.room_id,
                        room_code: snapshot.room_code,
                        players: snapshot.players,
                        state: snapshot.state,
                    };
                    send(conn, state, &reply).await?;
                }
                Err(e) => {
                    debug!(%player_id, %room_id, error = %e, "reconnect ignored");
                }
            }
        }
    }

    Ok(())
}

async fn send<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    msg: &ServerMessage,
) -> Result<(), RallypointError> {
    let bytes = state.codec.encode_server(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Rejected score events get no reply unless the server is configured to
/// report them.
async fn reject_score_event<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    err: &RoomError,
) -> Result<(), RallypointError> {
    if !state.config.report_score_rejections {
        return Ok(());
    }
    send_room_error(conn, state, err).await
}

async fn send_room_error<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    err: &RoomError,
) -> Result<(), RallypointError> {
    send_error(conn, state, err.code(), err.to_string()).await
}

async fn send_error<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    code: ErrorCode,
    message: String,
) -> Result<(), RallypointError> {
    send(conn, state, &ServerMessage::Error { code, message }).await
}
