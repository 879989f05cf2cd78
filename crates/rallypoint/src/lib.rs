//! # Rallypoint
//!
//! Authoritative session coordinator for short real-time multiplayer games.
//!
//! Players connect over WebSocket, create or join rooms by a short code, and
//! the host starts a round. The server drives every room through
//! LOBBY → COUNTDOWN → ACTIVE → FINISHED → LOBBY on its own clock, accepts
//! rate-limited score events while ACTIVE, and broadcasts the results.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rallypoint::prelude::*;
//!
//! # async fn run() -> Result<(), RallypointError> {
//! let server = RallypointServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .coordinator(CoordinatorConfig {
//!         game_duration_secs: 30,
//!         ..CoordinatorConfig::default()
//!     })
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
pub mod logging;
mod server;

pub use config::ServerConfig;
pub use error::RallypointError;
pub use server::{RallypointServer, RallypointServerBuilder};

/// Common imports for running and talking to a Rallypoint server.
pub mod prelude {
    pub use crate::{RallypointError, RallypointServer, RallypointServerBuilder, ServerConfig};
    pub use rallypoint_protocol::{
        ClientMessage, Codec, ErrorCode, JsonCodec, PROTOCOL_VERSION, PlayerId, PlayerSnapshot,
        RoomCode, RoomId, RoomState, ServerMessage,
    };
    pub use rallypoint_room::{CoordinatorConfig, RoomError, RoomRegistry};
    pub use rallypoint_timer::{Clock, Scheduler};
}
