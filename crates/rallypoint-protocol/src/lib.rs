//! Wire protocol for Rallypoint.
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`RoomState`], ids) —
//!   what travels between a browser client and the coordinator.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   turned into frame payloads.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections or room logic; the
//! room crate reuses its id and state types so there is one definition of
//! each.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, ErrorCode, MAX_PLAYER_NAME_CHARS, PlayerId, PlayerSnapshot, RoomCode, RoomId,
    RoomState, ServerMessage,
};

/// Protocol revision announced in [`ServerMessage::Welcome`].
pub const PROTOCOL_VERSION: u32 = 1;
