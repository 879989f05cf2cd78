//! Coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Alphabet without the easily confused `I`, `O`, `0` and `1`.
pub const DEFAULT_CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Settings shared by every room a registry creates.
///
/// All fields have defaults, so a partial JSON document such as
/// `{"max_players": 4}` deserializes into a complete config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Seconds between a successful start and the ACTIVE phase.
    pub countdown_secs: u64,

    /// Length of the ACTIVE phase in seconds.
    pub game_duration_secs: u64,

    /// Seconds a room stays FINISHED before resetting to LOBBY.
    pub reset_delay_secs: u64,

    /// Maximum members per room.
    pub max_players: usize,

    /// Members required before the host may start.
    pub min_players: usize,

    /// Length of generated room codes.
    pub code_length: usize,

    /// Characters room codes are drawn from.
    pub code_alphabet: String,

    /// Sliding window for score-event rate limiting, in milliseconds.
    pub rate_limit_window_ms: u64,

    /// Accepted score events per player per window.
    pub rate_limit_max_events: usize,

    /// Largest `value` a single score event may carry.
    pub max_event_value: u64,

    /// Bounded command queue in front of each room actor.
    pub room_channel_capacity: usize,

    /// Per-room broadcast buffer. Subscribers further behind than this
    /// skip ahead.
    pub broadcast_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            game_duration_secs: 60,
            reset_delay_secs: 10,
            max_players: 8,
            min_players: 2,
            code_length: 6,
            code_alphabet: DEFAULT_CODE_ALPHABET.to_string(),
            rate_limit_window_ms: 1_000,
            rate_limit_max_events: 10,
            max_event_value: 1_000,
            room_channel_capacity: 64,
            broadcast_capacity: 256,
        }
    }
}

impl CoordinatorConfig {
    /// Smallest number of distinct codes a config may describe.
    pub const MIN_CODE_SPACE: u128 = 1_000_000;

    /// Fixes out-of-range values so the config is safe to run with.
    ///
    /// Called automatically by the registry builder. Rules:
    /// - `max_players` and `min_players` are at least 1 and
    ///   `min_players <= max_players`.
    /// - `game_duration_secs` and `reset_delay_secs` are at least 1, so the
    ///   three lifecycle deadlines are strictly increasing.
    /// - An empty alphabet falls back to [`DEFAULT_CODE_ALPHABET`]; the code
    ///   length grows until at least [`Self::MIN_CODE_SPACE`] codes exist.
    /// - The rate-limit window and cap, and both channel capacities, are
    ///   at least 1.
    pub fn validated(mut self) -> Self {
        if self.max_players == 0 {
            warn!("max_players is 0, using 1");
            self.max_players = 1;
        }
        if self.min_players == 0 {
            warn!("min_players is 0, using 1");
            self.min_players = 1;
        }
        if self.min_players > self.max_players {
            warn!(
                min = self.min_players,
                max = self.max_players,
                "min_players exceeds max_players, clamping"
            );
            self.min_players = self.max_players;
        }
        if self.game_duration_secs == 0 {
            warn!("game_duration_secs is 0, using 1");
            self.game_duration_secs = 1;
        }
        if self.reset_delay_secs == 0 {
            warn!("reset_delay_secs is 0, using 1");
            self.reset_delay_secs = 1;
        }

        // Codes are matched case-insensitively, so count the alphabet the
        // way codes are compared.
        let mut alphabet: Vec<char> = Vec::new();
        for c in self.code_alphabet.chars().flat_map(char::to_uppercase) {
            if !c.is_whitespace() && !alphabet.contains(&c) {
                alphabet.push(c);
            }
        }
        if alphabet.len() < 2 {
            warn!(alphabet = %self.code_alphabet, "code alphabet too small, using default");
            alphabet = DEFAULT_CODE_ALPHABET.chars().collect();
        }
        self.code_alphabet = alphabet.iter().collect();
        let radix = alphabet.len() as u128;
        let original_length = self.code_length;
        while radix.saturating_pow(self.code_length as u32) < Self::MIN_CODE_SPACE {
            self.code_length += 1;
        }
        if self.code_length != original_length {
            warn!(
                from = original_length,
                to = self.code_length,
                "code space too small, lengthening codes"
            );
        }

        if self.rate_limit_window_ms == 0 {
            warn!("rate_limit_window_ms is 0, using 1");
            self.rate_limit_window_ms = 1;
        }
        if self.rate_limit_max_events == 0 {
            warn!("rate_limit_max_events is 0, using 1");
            self.rate_limit_max_events = 1;
        }
        self.room_channel_capacity = self.room_channel_capacity.max(1);
        self.broadcast_capacity = self.broadcast_capacity.max(1);
        self
    }

    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    pub fn game_duration(&self) -> Duration {
        Duration::from_secs(self.game_duration_secs)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_secs(self.reset_delay_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }
}
