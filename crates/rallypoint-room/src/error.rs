//! Error types for the room layer.

use rallypoint_protocol::{ErrorCode, RoomId};

/// Errors returned by room and registry operations.
///
/// Every variant maps to a wire-level [`ErrorCode`] through
/// [`RoomError::code`], so the transport adapter never has to match on
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No live room matches the given code or id.
    #[error("room not found")]
    RoomNotFound,

    /// The room has left the lobby and is not accepting new members.
    #[error("game already in progress")]
    GameInProgress,

    #[error("room is full ({max} players)")]
    RoomFull { max: usize },

    /// The caller is not a member of any room.
    #[error("not in a room")]
    NotInRoom,

    #[error("only the host can do that")]
    NotHost,

    /// A start was requested outside the lobby.
    #[error("game already started")]
    AlreadyStarted,

    #[error("need at least {need} players, have {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    #[error("too many score events")]
    RateLimitExceeded,

    /// Score events are only accepted while the room is ACTIVE.
    #[error("game is not active")]
    GameNotActive,

    /// The player is not a member of the addressed room.
    #[error("player not found in room")]
    PlayerNotFound,

    #[error("invalid score event: {0}")]
    InvalidEvent(String),

    /// Reconnect was requested for a member whose connection is still live.
    #[error("player is already connected")]
    AlreadyConnected,

    /// No unused room code could be generated.
    #[error("no room code available")]
    CodesExhausted,

    /// The room actor has stopped or its command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound => ErrorCode::RoomNotFound,
            Self::GameInProgress => ErrorCode::GameInProgress,
            Self::RoomFull { .. } => ErrorCode::RoomFull,
            Self::NotInRoom => ErrorCode::NotInRoom,
            Self::NotHost => ErrorCode::NotHost,
            Self::AlreadyStarted => ErrorCode::AlreadyStarted,
            Self::NotEnoughPlayers { .. } => ErrorCode::NotEnoughPlayers,
            Self::RateLimitExceeded => ErrorCode::RateLimitExceeded,
            Self::GameNotActive => ErrorCode::GameNotActive,
            Self::PlayerNotFound => ErrorCode::PlayerNotFound,
            Self::InvalidEvent(_) => ErrorCode::InvalidEvent,
            Self::AlreadyConnected => ErrorCode::AlreadyConnected,
            Self::CodesExhausted | Self::Unavailable(_) => ErrorCode::Unavailable,
        }
    }

    /// A stopped room is indistinguishable from a missing one to callers
    /// that addressed it by code or id.
    pub(crate) fn gone_as_not_found(self) -> Self {
        match self {
            Self::Unavailable(_) => Self::RoomNotFound,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(RoomError::RoomFull { max: 4 }.code(), ErrorCode::RoomFull);
        assert_eq!(
            RoomError::InvalidEvent("kind".into()).code(),
            ErrorCode::InvalidEvent
        );
        assert_eq!(
            RoomError::Unavailable(RoomId::new("r")).code(),
            ErrorCode::Unavailable
        );
    }

    #[test]
    fn test_unavailable_reads_as_not_found() {
        let err = RoomError::Unavailable(RoomId::new("r")).gone_as_not_found();
        assert_eq!(err, RoomError::RoomNotFound);
        assert_eq!(
            RoomError::NotHost.gone_as_not_found(),
            RoomError::NotHost
        );
    }

    #[test]
    fn test_messages() {
        let err = RoomError::NotEnoughPlayers { have: 1, need: 2 };
        assert_eq!(err.to_string(), "need at least 2 players, have 1");
    }
}
