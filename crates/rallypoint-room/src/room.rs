//! The membership ledger and lifecycle state machine for one room.
//!
//! [`Room`] is plain synchronous data. It never touches the clock or the
//! network: callers pass "now" in, and every change worth telling the
//! members about is queued as a [`RoomEvent`] until the owner drains it.
//! The actor in [`crate::actor`] is the only owner in production.

use std::collections::HashMap;
use std::sync::Arc;

use rallypoint_protocol::{PlayerId, PlayerSnapshot, RoomCode, RoomId, RoomState};
use tracing::{debug, info};

use crate::{CoordinatorConfig, RateLimiter, RoomError, RoomEvent, ScoreEvent};

/// A room member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u64,
    pub is_host: bool,
    pub connected: bool,
    /// Server time of the last accepted score event.
    pub last_score_event_time: Option<u64>,
    /// Arrival sequence within the room. Breaks leaderboard ties and picks
    /// the next host.
    pub join_order: u64,
}

impl Player {
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            score: self.score,
            is_host: self.is_host,
            connected: self.connected,
        }
    }
}

/// Point-in-time view of a room, handed to joiners and reconnecting players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub room_code: RoomCode,
    pub state: RoomState,
    pub host_id: PlayerId,
    /// Members in arrival order.
    pub players: Vec<PlayerSnapshot>,
    pub game_start_time: Option<u64>,
}

/// Result of a successful [`Room::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinResult {
    Joined,
    /// The player was already a member; nothing changed but the name.
    AlreadyMember,
}

/// What a departure did to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub new_host: Option<PlayerId>,
    /// The room has no members left and must be torn down.
    pub empty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectResult {
    /// The host dropped out of a lobby and was removed outright.
    Left(Departure),
    /// Membership kept; the player can reconnect.
    MarkedDisconnected,
}

pub struct Room {
    id: RoomId,
    code: RoomCode,
    host_id: PlayerId,
    players: HashMap<PlayerId, Player>,
    state: RoomState,
    game_start_time: Option<u64>,
    round: u64,
    next_join_order: u64,
    limiter: RateLimiter,
    config: Arc<CoordinatorConfig>,
    events: Vec<RoomEvent>,
}

impl Room {
    /// Creates a LOBBY room with `host_id` as its only member.
    pub fn new(
        id: RoomId,
        code: RoomCode,
        host_id: PlayerId,
        host_name: impl Into<String>,
        config: Arc<CoordinatorConfig>,
    ) -> Self {
        let host = Player {
            id: host_id.clone(),
            name: host_name.into(),
            score: 0,
            is_host: true,
            connected: true,
            last_score_event_time: None,
            join_order: 0,
        };
        let limiter = RateLimiter::new(config.rate_limit_window_ms, config.rate_limit_max_events);
        Self {
            id,
            code,
            host_id: host_id.clone(),
            players: HashMap::from([(host_id, host)]),
            state: RoomState::Lobby,
            game_start_time: None,
            round: 0,
            next_join_order: 1,
            limiter,
            config,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn host_id(&self) -> &PlayerId {
        &self.host_id
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn game_start_time(&self) -> Option<u64> {
        self.game_start_time
    }

    /// Number of successful starts so far.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Takes the events queued since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }

    // -- Membership ---------------------------------------------------------

    pub fn join(&mut self, player_id: PlayerId, name: String) -> Result<JoinResult, RoomError> {
        if let Some(existing) = self.players.get_mut(&player_id) {
            existing.name = name;
            if !existing.connected {
                existing.connected = true;
                let event = self.reconnected_event(player_id);
                self.events.push(event);
            }
            return Ok(JoinResult::AlreadyMember);
        }
        if !self.state.is_joinable() {
            return Err(RoomError::GameInProgress);
        }
        if self.players.len() >= self.config.max_players {
            return Err(RoomError::RoomFull {
                max: self.config.max_players,
            });
        }

        let player = Player {
            id: player_id.clone(),
            name,
            score: 0,
            is_host: false,
            connected: true,
            last_score_event_time: None,
            join_order: self.next_join_order,
        };
        self.next_join_order += 1;
        self.events.push(RoomEvent::PlayerJoined(player.snapshot()));
        self.players.insert(player_id.clone(), player);

        info!(
            room_id = %self.id,
            %player_id,
            players = self.players.len(),
            "player joined"
        );
        Ok(JoinResult::Joined)
    }

    pub fn leave(&mut self, player_id: &PlayerId) -> Result<Departure, RoomError> {
        let removed = self
            .players
            .remove(player_id)
            .ok_or(RoomError::PlayerNotFound)?;
        self.limiter.forget(player_id);
        self.events.push(RoomEvent::PlayerLeft(player_id.clone()));

        info!(
            room_id = %self.id,
            %player_id,
            players = self.players.len(),
            "player left"
        );

        let new_host = if removed.is_host {
            self.reassign_host()
        } else {
            None
        };
        Ok(Departure {
            new_host,
            empty: self.players.is_empty(),
        })
    }

    /// Handles a dropped connection.
    ///
    /// A host dropping out of a LOBBY room is removed so the room is not
    /// held hostage before a game starts. Every other disconnect keeps the
    /// membership, including a host mid-game.
    pub fn disconnect(&mut self, player_id: &PlayerId) -> Result<DisconnectResult, RoomError> {
        let player = self
            .players
            .get_mut(player_id)
            .ok_or(RoomError::PlayerNotFound)?;

        if player.is_host && self.state == RoomState::Lobby {
            return self.leave(player_id).map(DisconnectResult::Left);
        }
        if player.connected {
            player.connected = false;
            self.events
                .push(RoomEvent::PlayerDisconnected(player_id.clone()));
            info!(room_id = %self.id, %player_id, state = %self.state, "player disconnected");
        }
        Ok(DisconnectResult::MarkedDisconnected)
    }

    pub fn reconnect(&mut self, player_id: &PlayerId) -> Result<(), RoomError> {
        let player = self
            .players
            .get_mut(player_id)
            .ok_or(RoomError::PlayerNotFound)?;
        if player.connected {
            return Err(RoomError::AlreadyConnected);
        }
        player.connected = true;

        let event = self.reconnected_event(player_id.clone());
        self.events.push(event);
        info!(room_id = %self.id, %player_id, state = %self.state, "player reconnected");
        Ok(())
    }

    /// Earliest remaining arrival becomes host.
    fn reassign_host(&mut self) -> Option<PlayerId> {
        let next = self
            .players
            .values_mut()
            .min_by_key(|p| p.join_order)?;
        next.is_host = true;
        self.host_id = next.id.clone();

        info!(room_id = %self.id, host = %self.host_id, "host reassigned");
        self.events.push(RoomEvent::HostChanged(self.host_id.clone()));
        Some(self.host_id.clone())
    }

    fn reconnected_event(&self, player_id: PlayerId) -> RoomEvent {
        RoomEvent::PlayerReconnected {
            player_id,
            room_id: self.id.clone(),
            players: self.player_snapshots(),
            state: self.state,
        }
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Moves a LOBBY room into COUNTDOWN and returns the new round number.
    ///
    /// The caller is responsible for arming the three deferred transitions
    /// for that round.
    pub fn start(&mut self, player_id: &PlayerId, now_ms: u64) -> Result<u64, RoomError> {
        let player = self
            .players
            .get(player_id)
            .ok_or(RoomError::PlayerNotFound)?;
        if !player.is_host {
            return Err(RoomError::NotHost);
        }
        if self.state != RoomState::Lobby {
            return Err(RoomError::AlreadyStarted);
        }
        if self.players.len() < self.config.min_players {
            return Err(RoomError::NotEnoughPlayers {
                have: self.players.len(),
                need: self.config.min_players,
            });
        }

        for player in self.players.values_mut() {
            player.score = 0;
            player.last_score_event_time = None;
        }
        let start_at = now_ms.saturating_add(self.config.countdown_secs.saturating_mul(1_000));
        self.game_start_time = Some(start_at);
        self.round += 1;
        self.set_state(RoomState::Countdown);
        self.events.push(RoomEvent::GameStarting {
            start_at,
            duration_secs: self.config.game_duration_secs,
        });

        info!(
            room_id = %self.id,
            round = self.round,
            players = self.players.len(),
            start_at,
            "game starting"
        );
        Ok(self.round)
    }

    /// Applies a deferred transition armed for `round` out of state `from`.
    ///
    /// Returns `false` without touching anything if the room has since
    /// moved on (another round started, or the state already changed).
    pub fn advance(&mut self, round: u64, from: RoomState) -> bool {
        if round != self.round || from != self.state {
            debug!(
                room_id = %self.id,
                round,
                current_round = self.round,
                %from,
                state = %self.state,
                "stale transition ignored"
            );
            return false;
        }

        let to = from.next();
        self.set_state(to);
        match to {
            RoomState::Active => {
                self.events.push(RoomEvent::GameStarted);
            }
            RoomState::Finished => {
                let leaderboard = self.leaderboard().iter().map(Player::snapshot).collect();
                self.events.push(RoomEvent::GameFinished { leaderboard });
            }
            RoomState::Lobby => {
                self.game_start_time = None;
                for player in self.players.values_mut() {
                    player.score = 0;
                }
            }
            RoomState::Countdown => {}
        }
        true
    }

    fn set_state(&mut self, to: RoomState) {
        debug_assert!(self.state.can_transition_to(to));
        info!(room_id = %self.id, from = %self.state, %to, "room state changed");
        self.state = to;
        self.events.push(RoomEvent::StateChanged(to));
    }

    // -- Scoring ------------------------------------------------------------

    /// Admits a score event and returns the player's new total.
    ///
    /// Checks run in order: membership, ACTIVE state, rate limit, event
    /// validity. An event that passes the rate limit but fails validation
    /// still counts against the player's window.
    pub fn score(
        &mut self,
        player_id: &PlayerId,
        event: &ScoreEvent,
        now_ms: u64,
    ) -> Result<u64, RoomError> {
        if !self.players.contains_key(player_id) {
            return Err(RoomError::PlayerNotFound);
        }
        if !self.state.accepts_score_events() {
            return Err(RoomError::GameNotActive);
        }
        if !self.limiter.check(player_id, now_ms) {
            debug!(room_id = %self.id, %player_id, "score event rate limited");
            return Err(RoomError::RateLimitExceeded);
        }
        let (kind, value) = event.validate(self.config.max_event_value)?;

        let player = self
            .players
            .get_mut(player_id)
            .ok_or(RoomError::PlayerNotFound)?;
        player.score = player.score.saturating_add(value);
        player.last_score_event_time = Some(now_ms);
        let score = player.score;

        debug!(
            room_id = %self.id,
            %player_id,
            %kind,
            value,
            score,
            client_time = ?event.timestamp,
            "score event accepted"
        );
        self.events.push(RoomEvent::ScoreUpdate {
            player_id: player_id.clone(),
            score,
        });
        Ok(score)
    }

    // -- Views --------------------------------------------------------------

    /// Members by score, highest first; ties go to the earlier arrival.
    pub fn leaderboard(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score).then(a.join_order.cmp(&b.join_order)));
        players
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            room_code: self.code.clone(),
            state: self.state,
            host_id: self.host_id.clone(),
            players: self.player_snapshots(),
            game_start_time: self.game_start_time,
        }
    }

    fn player_snapshots(&self) -> Vec<PlayerSnapshot> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.join_order);
        players.into_iter().map(Player::snapshot).collect()
    }

    #[cfg(test)]
    pub(crate) fn tracked_rate_limits(&self) -> usize {
        self.limiter.tracked()
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("code", &self.code)
            .field("state", &self.state)
            .field("round", &self.round)
            .field("players", &self.players.len())
            .finish()
    }
}
