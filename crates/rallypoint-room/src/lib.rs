//! Room lifecycle management for Rallypoint.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! membership, scores, and lifecycle state. The [`RoomRegistry`] maps room
//! codes and player ids to those actors.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: create/join/leave/reconnect, score routing
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Room`]: the synchronous state machine inside each actor
//! - [`RateLimiter`]: sliding-window admission for score events
//! - [`CodeGenerator`]: pluggable room-code strategy
//! - [`CoordinatorConfig`]: durations, limits, and channel sizes

mod actor;
mod code;
mod config;
mod error;
mod event;
mod rate_limit;
mod registry;
mod room;

pub use actor::{Joined, RoomHandle};
pub use code::{CodeGenerator, RandomCodeGenerator};
pub use config::{CoordinatorConfig, DEFAULT_CODE_ALPHABET};
pub use error::RoomError;
pub use event::{EventKind, RoomEvent, ScoreEvent};
pub use rate_limit::RateLimiter;
pub use registry::{RoomRegistry, RoomRegistryBuilder};
pub use room::{Departure, DisconnectResult, JoinResult, Player, Room, RoomSnapshot};
