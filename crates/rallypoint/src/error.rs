//! Unified error type for Rallypoint.

use rallypoint_protocol::ProtocolError;
use rallypoint_room::RoomError;
use rallypoint_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RallypointError {
    /// Binding, accepting, sending, or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room operation failed.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Configuration could not be loaded or applied.
    #[error("config error: {0}")]
    Config(String),
}
