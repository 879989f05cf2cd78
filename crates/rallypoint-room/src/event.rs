//! Score input and room broadcasts.

use std::fmt;
use std::str::FromStr;

use rallypoint_protocol::{PlayerId, PlayerSnapshot, RoomId, RoomState, ServerMessage};

use crate::RoomError;

/// Kinds of score event a client may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Combo,
    Bonus,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Combo => "combo",
            Self::Bonus => "bonus",
        }
    }
}

impl FromStr for EventKind {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "click" => Ok(Self::Click),
            "combo" => Ok(Self::Combo),
            "bonus" => Ok(Self::Bonus),
            other => Err(RoomError::InvalidEvent(format!("unknown kind {other:?}"))),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An untrusted score report as received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEvent {
    pub kind: String,
    pub value: i64,
    /// Client-side timestamp. Logged, never used for ordering or limits.
    pub timestamp: Option<u64>,
}

impl ScoreEvent {
    pub fn new(kind: impl Into<String>, value: i64) -> Self {
        Self {
            kind: kind.into(),
            value,
            timestamp: None,
        }
    }

    /// Checks the kind and bounds the value to `0..=max_value`.
    pub fn validate(&self, max_value: u64) -> Result<(EventKind, u64), RoomError> {
        let kind = self.kind.parse::<EventKind>()?;
        let value = u64::try_from(self.value)
            .ok()
            .filter(|v| *v <= max_value)
            .ok_or_else(|| {
                RoomError::InvalidEvent(format!(
                    "value {} outside 0..={max_value}",
                    self.value
                ))
            })?;
        Ok((kind, value))
    }
}

/// Something every member of a room should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    PlayerJoined(PlayerSnapshot),
    PlayerLeft(PlayerId),
    PlayerDisconnected(PlayerId),
    PlayerReconnected {
        player_id: PlayerId,
        room_id: RoomId,
        players: Vec<PlayerSnapshot>,
        state: RoomState,
    },
    HostChanged(PlayerId),
    StateChanged(RoomState),
    GameStarting {
        start_at: u64,
        duration_secs: u64,
    },
    GameStarted,
    ScoreUpdate {
        player_id: PlayerId,
        score: u64,
    },
    GameFinished {
        leaderboard: Vec<PlayerSnapshot>,
    },
}

impl From<RoomEvent> for ServerMessage {
    fn from(event: RoomEvent) -> Self {
        match event {
            RoomEvent::PlayerJoined(player) => Self::PlayerJoined { player },
            RoomEvent::PlayerLeft(player_id) => Self::PlayerLeft { player_id },
            RoomEvent::PlayerDisconnected(player_id) => Self::PlayerDisconnected { player_id },
            RoomEvent::PlayerReconnected {
                player_id,
                room_id,
                players,
                state,
            } => Self::PlayerReconnected {
                player_id,
                room_id,
                players,
                state,
            },
            RoomEvent::HostChanged(player_id) => Self::HostChanged { player_id },
            RoomEvent::StateChanged(state) => Self::RoomStateChanged { state },
            RoomEvent::GameStarting {
                start_at,
                duration_secs,
            } => Self::GameStarting {
                start_at,
                duration_secs,
            },
            RoomEvent::GameStarted => Self::GameStarted,
            RoomEvent::ScoreUpdate { player_id, score } => Self::ScoreUpdate { player_id, score },
            RoomEvent::GameFinished { leaderboard } => Self::GameFinished { leaderboard },
        }
    }
}
