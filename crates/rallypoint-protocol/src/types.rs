//! Wire types exchanged between clients and the coordinator.
//!
//! Every message is a JSON object whose `"type"` field names the variant
//! (`#[serde(tag = "type")]`), e.g.
//! `{"type":"JoinRoom","room_code":"AB3XQ9","player_name":"ada"}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque player identifier, assigned by the server when a connection opens.
///
/// It outlives the connection that created it: a client that drops and comes
/// back presents the same id in a `Reconnect` request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Internal room identifier. Unique for the lifetime of the process and
/// never reused, unlike [`RoomCode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short human-facing join code.
///
/// Codes are case-insensitive on input: [`RoomCode::normalize`] trims
/// whitespace and upper-cases, so `" ab3xq9"` finds room `AB3XQ9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Canonical form of user-typed input.
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// LOBBY → COUNTDOWN → ACTIVE → FINISHED
///   ↑                              │
///   └──────────(auto-reset)────────┘
/// ```
///
/// The cycle never skips a state and never runs backwards; the only edge
/// into LOBBY is the post-game reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomState {
    Lobby,
    Countdown,
    Active,
    Finished,
}

impl RoomState {
    /// The single state this one may advance to.
    pub fn next(self) -> Self {
        match self {
            Self::Lobby => Self::Countdown,
            Self::Countdown => Self::Active,
            Self::Active => Self::Finished,
            Self::Finished => Self::Lobby,
        }
    }

    /// Returns `true` if moving to `target` follows the cycle.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == target
    }

    /// Only LOBBY rooms accept new members.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Only ACTIVE rooms accept score events.
    pub fn accepts_score_events(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lobby => "LOBBY",
            Self::Countdown => "COUNTDOWN",
            Self::Active => "ACTIVE",
            Self::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// One player as seen by clients (player lists, leaderboards).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub score: u64,
    pub is_host: bool,
    pub connected: bool,
}

// ---------------------------------------------------------------------------
// Errors on the wire
// ---------------------------------------------------------------------------

/// Machine-readable failure reason sent in [`ServerMessage::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    RoomNotFound,
    GameInProgress,
    RoomFull,
    NotInRoom,
    NotHost,
    AlreadyStarted,
    NotEnoughPlayers,
    RateLimitExceeded,
    GameNotActive,
    PlayerNotFound,
    InvalidEvent,
    AlreadyConnected,
    /// The message could not be decoded.
    BadRequest,
    /// The room exists but could not service the request (shutting down).
    Unavailable,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Requests a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Create a room and become its host.
    CreateRoom { player_name: String },

    /// Join an existing room by its code.
    JoinRoom {
        room_code: String,
        player_name: String,
    },

    /// Leave the current room.
    LeaveRoom,

    /// Host only: begin the countdown.
    StartGame,

    /// A gameplay score delta. `kind` is validated server-side against the
    /// known event kinds; `timestamp` is informational and never trusted.
    ScoreEvent {
        kind: String,
        value: i64,
        #[serde(default)]
        timestamp: Option<u64>,
    },

    /// Reclaim a membership after the previous connection dropped.
    Reconnect { room_id: RoomId, player_id: PlayerId },

    /// Keep-alive. Echoed back with the server's clock.
    Heartbeat { client_time: u64 },
}

/// Longest accepted display name, in characters.
pub const MAX_PLAYER_NAME_CHARS: usize = 32;

impl ClientMessage {
    /// Rejects structurally valid messages with unusable field values.
    ///
    /// Player names must be non-blank and at most
    /// [`MAX_PLAYER_NAME_CHARS`] characters; room codes must be non-blank.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::CreateRoom { player_name } => check_player_name(player_name),
            Self::JoinRoom {
                room_code,
                player_name,
            } => {
                if room_code.trim().is_empty() {
                    return Err(ProtocolError::InvalidMessage("room_code is empty".into()));
                }
                check_player_name(player_name)
            }
            _ => Ok(()),
        }
    }
}

fn check_player_name(name: &str) -> Result<(), ProtocolError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProtocolError::InvalidMessage("player_name is empty".into()));
    }
    if name.chars().count() > MAX_PLAYER_NAME_CHARS {
        return Err(ProtocolError::InvalidMessage(format!(
            "player_name longer than {MAX_PLAYER_NAME_CHARS} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Responses and room broadcasts sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// First message on every connection.
    Welcome {
        player_id: PlayerId,
        protocol_version: u32,
        server_time: u64,
    },

    HeartbeatAck { client_time: u64, server_time: u64 },

    RoomCreated { room_id: RoomId, room_code: RoomCode },

    RoomJoined {
        room_id: RoomId,
        room_code: RoomCode,
        players: Vec<PlayerSnapshot>,
        state: RoomState,
    },

    /// Sent to the reconnecting client itself.
    Reconnected {
        room_id: RoomId,
        room_code: RoomCode,
        players: Vec<PlayerSnapshot>,
        state: RoomState,
    },

    GameStartAccepted,

    // -- Room broadcasts --
    PlayerJoined { player: PlayerSnapshot },

    PlayerLeft { player_id: PlayerId },

    PlayerDisconnected { player_id: PlayerId },

    PlayerReconnected {
        player_id: PlayerId,
        room_id: RoomId,
        players: Vec<PlayerSnapshot>,
        state: RoomState,
    },

    HostChanged { player_id: PlayerId },

    RoomStateChanged { state: RoomState },

    /// `start_at` is the epoch-millisecond instant ACTIVE begins;
    /// `duration_secs` is the length of the ACTIVE phase.
    GameStarting { start_at: u64, duration_secs: u64 },

    GameStarted,

    ScoreUpdate { player_id: PlayerId, score: u64 },

    GameFinished { leaderboard: Vec<PlayerSnapshot> },

    Error { code: ErrorCode, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, score: u64) -> PlayerSnapshot {
        PlayerSnapshot {
            id: PlayerId::new(id),
            name: id.to_uppercase(),
            score,
            is_host: false,
            connected: true,
        }
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        assert_eq!(serde_json::to_string(&PlayerId::new("p1")).unwrap(), "\"p1\"");
        assert_eq!(serde_json::to_string(&RoomId::new("r1")).unwrap(), "\"r1\"");
        assert_eq!(serde_json::to_string(&RoomCode::new("AB3XQ9")).unwrap(), "\"AB3XQ9\"");
    }

    #[test]
    fn test_room_code_normalize_trims_and_uppercases() {
        assert_eq!(RoomCode::normalize("  ab3xq9 "), RoomCode::new("AB3XQ9"));
    }

    #[test]
    fn test_room_state_cycle() {
        assert_eq!(RoomState::Lobby.next(), RoomState::Countdown);
        assert_eq!(RoomState::Countdown.next(), RoomState::Active);
        assert_eq!(RoomState::Active.next(), RoomState::Finished);
        assert_eq!(RoomState::Finished.next(), RoomState::Lobby);
    }

    #[test]
    fn test_room_state_can_transition_to_rejects_skips_and_reversals() {
        assert!(RoomState::Lobby.can_transition_to(RoomState::Countdown));
        assert!(!RoomState::Lobby.can_transition_to(RoomState::Active));
        assert!(!RoomState::Active.can_transition_to(RoomState::Countdown));
        assert!(!RoomState::Countdown.can_transition_to(RoomState::Lobby));
        assert!(RoomState::Finished.can_transition_to(RoomState::Lobby));
    }

    #[test]
    fn test_room_state_predicates() {
        assert!(RoomState::Lobby.is_joinable());
        assert!(!RoomState::Countdown.is_joinable());
        assert!(RoomState::Active.accepts_score_events());
        assert!(!RoomState::Finished.accepts_score_events());
    }

    #[test]
    fn test_room_state_wire_and_display_names() {
        assert_eq!(serde_json::to_string(&RoomState::Countdown).unwrap(), "\"COUNTDOWN\"");
        assert_eq!(RoomState::Finished.to_string(), "FINISHED");
    }

    #[test]
    fn test_client_message_score_event_timestamp_optional() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"ScoreEvent","kind":"click","value":50}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::ScoreEvent {
                kind: "click".into(),
                value: 50,
                timestamp: None
            }
        );
    }

    #[test]
    fn test_client_message_reconnect_shape() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"Reconnect","room_id":"r-9","player_id":"p-3"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Reconnect {
                room_id: RoomId::new("r-9"),
                player_id: PlayerId::new("p-3"),
            }
        );
    }

    #[test]
    fn test_client_message_unknown_type_fails() {
        let result: Result<ClientMessage, _> = serde_json::from_str(r#"{"type":"KickEveryone"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_message_game_finished_shape() {
        let msg = ServerMessage::GameFinished {
            leaderboard: vec![player("b", 50), player("a", 0)],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "GameFinished");
        assert_eq!(json["leaderboard"][0]["id"], "b");
        assert_eq!(json["leaderboard"][0]["score"], 50);
        assert_eq!(json["leaderboard"][1]["is_host"], false);
    }

    #[test]
    fn test_server_message_unit_variant_shape() {
        let json = serde_json::to_value(&ServerMessage::GameStarted).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "GameStarted" }));
    }

    #[test]
    fn test_server_message_game_starting_shape() {
        let json = serde_json::to_value(&ServerMessage::GameStarting {
            start_at: 1_700_000_003_000,
            duration_secs: 60,
        })
        .unwrap();
        assert_eq!(json["start_at"], 1_700_000_003_000u64);
        assert_eq!(json["duration_secs"], 60);
    }

    #[test]
    fn test_validate_player_names() {
        let ok = ClientMessage::CreateRoom {
            player_name: "Ada".into(),
        };
        assert!(ok.validate().is_ok());

        let blank = ClientMessage::CreateRoom {
            player_name: "   ".into(),
        };
        assert!(matches!(blank.validate(), Err(ProtocolError::InvalidMessage(_))));

        let long = ClientMessage::JoinRoom {
            room_code: "AB3XQ9".into(),
            player_name: "x".repeat(MAX_PLAYER_NAME_CHARS + 1),
        };
        assert!(long.validate().is_err());

        // Counted in characters, not bytes.
        let wide = ClientMessage::CreateRoom {
            player_name: "é".repeat(MAX_PLAYER_NAME_CHARS),
        };
        assert!(wide.validate().is_ok());
    }

    #[test]
    fn test_validate_room_code() {
        let msg = ClientMessage::JoinRoom {
            room_code: " ".into(),
            player_name: "Ada".into(),
        };
        assert!(matches!(msg.validate(), Err(ProtocolError::InvalidMessage(_))));
        assert!(ClientMessage::LeaveRoom.validate().is_ok());
    }
}
