//! Sliding-window admission control for score events.

use std::collections::{HashMap, VecDeque};

use rallypoint_protocol::PlayerId;

/// Admits at most `max_events` per player within any `window_ms` span.
///
/// Only admitted events are recorded, so a client hammering the server
/// while throttled does not extend its own penalty.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window_ms: u64,
    max_events: usize,
    history: HashMap<PlayerId, VecDeque<u64>>,
}

impl RateLimiter {
    pub fn new(window_ms: u64, max_events: usize) -> Self {
        Self {
            window_ms,
            max_events,
            history: HashMap::new(),
        }
    }

    /// Returns `true` and records `now_ms` if the player is under the cap.
    ///
    /// Timestamps at least `window_ms` old are discarded first.
    pub fn check(&mut self, player_id: &PlayerId, now_ms: u64) -> bool {
        let window_ms = self.window_ms;
        let recent = self.history.entry(player_id.clone()).or_default();
        while recent
            .front()
            .is_some_and(|&at| now_ms.saturating_sub(at) >= window_ms)
        {
            recent.pop_front();
        }

        if recent.len() >= self.max_events {
            return false;
        }
        recent.push_back(now_ms);
        true
    }

    /// Drops all history for a player.
    pub fn forget(&mut self, player_id: &PlayerId) {
        self.history.remove(player_id);
    }

    /// Number of players with recorded history.
    pub fn tracked(&self) -> usize {
        self.history.len()
    }
}
