//! Room registry: creates, tracks, and routes players to rooms.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rallypoint_protocol::{PlayerId, RoomCode, RoomId};
use rallypoint_timer::{Clock, Scheduler, SystemClock, TokioScheduler};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actor::{RoomContext, spawn_room};
use crate::room::{DisconnectResult, Player, Room, RoomSnapshot};
use crate::{
    CodeGenerator, CoordinatorConfig, Joined, RandomCodeGenerator, RoomError, RoomHandle,
    ScoreEvent,
};

/// Draws before giving up on finding an unused code.
const MAX_CODE_ATTEMPTS: usize = 64;

#[derive(Default)]
struct Index {
    rooms: HashMap<RoomId, RoomHandle>,
    codes: HashMap<RoomCode, RoomId>,
    /// Each connected player is bound to at most one room. Disconnected
    /// members have no entry until they reconnect.
    players: HashMap<PlayerId, RoomId>,
}

/// Owns every live room and the code → room and player → room indices.
///
/// Room state itself lives in each room's actor; the registry only holds
/// handles. The index mutex is held for map lookups and updates only,
/// never across an `.await`.
pub struct RoomRegistry {
    ctx: RoomContext,
    codes: Arc<dyn CodeGenerator>,
    index: Mutex<Index>,
}

/// Builds a [`RoomRegistry`] with optional custom clock, scheduler, and
/// code generator. Unset parts use the production implementations.
pub struct RoomRegistryBuilder {
    config: CoordinatorConfig,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    codes: Option<Arc<dyn CodeGenerator>>,
}

impl RoomRegistryBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn code_generator(mut self, codes: Arc<dyn CodeGenerator>) -> Self {
        self.codes = Some(codes);
        self
    }

    pub fn build(self) -> RoomRegistry {
        let config = self.config.validated();
        let codes = self
            .codes
            .unwrap_or_else(|| Arc::new(RandomCodeGenerator::from_config(&config)));
        RoomRegistry {
            ctx: RoomContext {
                config: Arc::new(config),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
                scheduler: self.scheduler.unwrap_or_else(|| Arc::new(TokioScheduler)),
            },
            codes,
            index: Mutex::new(Index::default()),
        }
    }
}

impl RoomRegistry {
    /// A registry on wall-clock time with random codes.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: CoordinatorConfig) -> RoomRegistryBuilder {
        RoomRegistryBuilder {
            config,
            clock: None,
            scheduler: None,
            codes: None,
        }
    }

    /// The validated config every room runs with.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.ctx.config
    }

    /// Epoch milliseconds from the registry's clock.
    pub fn now_millis(&self) -> u64 {
        self.ctx.clock.now_millis()
    }

    /// Creates a LOBBY room with the caller as its sole member and host.
    ///
    /// A caller already bound to a room leaves it first. Fails only with
    /// [`RoomError::CodesExhausted`] if no unused code turns up.
    pub async fn create_room(
        &self,
        player_id: PlayerId,
        player_name: impl Into<String>,
    ) -> Result<Joined, RoomError> {
        if self.player_room(&player_id).is_some() {
            self.leave_room(&player_id).await;
        }

        let joined = {
            let mut index = self.lock();
            let code = self.unused_code(&index)?;
            let room_id = RoomId::new(Uuid::new_v4().to_string());
            let room = Room::new(
                room_id.clone(),
                code.clone(),
                player_id.clone(),
                player_name,
                Arc::clone(&self.ctx.config),
            );
            let snapshot = room.snapshot();
            let (handle, events) = spawn_room(room, self.ctx.clone());

            index.codes.insert(code, room_id.clone());
            index.rooms.insert(room_id.clone(), handle);
            index.players.insert(player_id.clone(), room_id);
            Joined { snapshot, events }
        };

        info!(
            room_id = %joined.room_id(),
            code = %joined.room_code(),
            host = %player_id,
            "room created"
        );
        Ok(joined)
    }

    /// Adds a player to the room holding `code` (case-insensitive).
    ///
    /// Joining the room the player is already in succeeds without change.
    /// If the player was bound to a different room it leaves that room
    /// only after the new join succeeded.
    pub async fn join_room(
        &self,
        code: &str,
        player_id: PlayerId,
        player_name: impl Into<String>,
    ) -> Result<Joined, RoomError> {
        let code = RoomCode::normalize(code);
        let handle = self.handle_for_code(&code).ok_or_else(|| {
            debug!(%code, %player_id, "join with unknown code");
            RoomError::RoomNotFound
        })?;
        let previous = self.player_room(&player_id);

        let joined = handle
            .join(player_id.clone(), player_name.into())
            .await
            .map_err(|err| {
                debug!(room_id = %handle.room_id(), %player_id, %err, "join rejected");
                err.gone_as_not_found()
            })?;

        if let Some(previous) = previous.filter(|room_id| room_id != handle.room_id()) {
            self.remove_from_room(&previous, &player_id).await;
        }
        self.bind(player_id, handle.room_id().clone());
        Ok(joined)
    }

    /// Removes the player from its room. Returns `false` if it was not in
    /// one.
    pub async fn leave_room(&self, player_id: &PlayerId) -> bool {
        let Some(room_id) = self.unbind(player_id) else {
            return false;
        };
        self.remove_from_room(&room_id, player_id).await
    }

    /// Handles a dropped connection and returns the room it was in.
    ///
    /// The player keeps its membership (and can reconnect) unless it was the
    /// host of a room still in LOBBY, which counts as leaving.
    pub async fn handle_disconnect(&self, player_id: &PlayerId) -> Option<RoomId> {
        let room_id = self.unbind(player_id)?;
        let handle = self.handle(&room_id)?;

        match handle.disconnect(player_id.clone()).await {
            Ok(DisconnectResult::Left(departure)) => {
                if departure.empty {
                    self.destroy(&room_id);
                }
            }
            Ok(DisconnectResult::MarkedDisconnected) => {}
            Err(err) => {
                debug!(%room_id, %player_id, %err, "disconnect for departed player");
                return None;
            }
        }
        Some(room_id)
    }

    /// Restores a disconnected member's binding to `room_id`.
    pub async fn handle_reconnect(
        &self,
        player_id: &PlayerId,
        room_id: &RoomId,
    ) -> Result<Joined, RoomError> {
        let handle = self.handle(room_id).ok_or(RoomError::RoomNotFound)?;
        let joined = handle
            .reconnect(player_id.clone())
            .await
            .map_err(RoomError::gone_as_not_found)?;
        self.bind(player_id.clone(), room_id.clone());
        Ok(joined)
    }

    /// Host only: moves the player's room from LOBBY into COUNTDOWN.
    pub async fn start_game(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        let room_id = self.player_room(player_id).ok_or(RoomError::NotInRoom)?;
        let handle = self.handle(&room_id).ok_or(RoomError::RoomNotFound)?;
        handle
            .start_game(player_id.clone())
            .await
            .map_err(RoomError::gone_as_not_found)?;
        Ok(())
    }

    /// Applies a score event and returns the player's new total.
    pub async fn process_score_event(
        &self,
        player_id: &PlayerId,
        event: ScoreEvent,
    ) -> Result<u64, RoomError> {
        let room_id = self.player_room(player_id).ok_or(RoomError::NotInRoom)?;
        let handle = self.handle(&room_id).ok_or(RoomError::RoomNotFound)?;
        handle
            .score(player_id.clone(), event)
            .await
            .map_err(RoomError::gone_as_not_found)
    }

    /// Members by score, highest first; ties go to the earlier arrival.
    pub async fn get_leaderboard(&self, room_id: &RoomId) -> Result<Vec<Player>, RoomError> {
        let handle = self.handle(room_id).ok_or(RoomError::RoomNotFound)?;
        handle
            .leaderboard()
            .await
            .map_err(RoomError::gone_as_not_found)
    }

    pub async fn room_snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, RoomError> {
        let handle = self.handle(room_id).ok_or(RoomError::RoomNotFound)?;
        handle.snapshot().await.map_err(RoomError::gone_as_not_found)
    }

    /// The room the player is currently bound to, if any.
    pub fn player_room(&self, player_id: &PlayerId) -> Option<RoomId> {
        self.lock().players.get(player_id).cloned()
    }

    /// The live room holding `code`, if any.
    pub fn room_for_code(&self, code: &str) -> Option<RoomId> {
        self.lock().codes.get(&RoomCode::normalize(code)).cloned()
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    // -- Internals ----------------------------------------------------------

    async fn remove_from_room(&self, room_id: &RoomId, player_id: &PlayerId) -> bool {
        let Some(handle) = self.handle(room_id) else {
            return false;
        };
        match handle.leave(player_id.clone()).await {
            Ok(departure) => {
                if departure.empty {
                    self.destroy(room_id);
                }
                true
            }
            Err(err) => {
                debug!(%room_id, %player_id, %err, "leave failed");
                false
            }
        }
    }

    /// Drops every index entry for the room and frees its code.
    fn destroy(&self, room_id: &RoomId) {
        let mut index = self.lock();
        let Some(handle) = index.rooms.remove(room_id) else {
            return;
        };
        index.codes.remove(handle.code());
        index.players.retain(|_, bound| bound != room_id);
        info!(%room_id, code = %handle.code(), rooms = index.rooms.len(), "room destroyed");
    }

    fn unused_code(&self, index: &Index) -> Result<RoomCode, RoomError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = RoomCode::normalize(self.codes.generate().as_str());
            if !index.codes.contains_key(&code) {
                return Ok(code);
            }
            debug!(%code, "room code collision");
        }
        warn!(
            attempts = MAX_CODE_ATTEMPTS,
            rooms = index.rooms.len(),
            "no unused room code found"
        );
        Err(RoomError::CodesExhausted)
    }

    fn handle(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.lock().rooms.get(room_id).cloned()
    }

    fn handle_for_code(&self, code: &RoomCode) -> Option<RoomHandle> {
        let index = self.lock();
        index
            .codes
            .get(code)
            .and_then(|room_id| index.rooms.get(room_id))
            .cloned()
    }

    fn bind(&self, player_id: PlayerId, room_id: RoomId) {
        self.lock().players.insert(player_id, room_id);
    }

    fn unbind(&self, player_id: &PlayerId) -> Option<RoomId> {
        self.lock().players.remove(player_id)
    }

    fn lock(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.lock();
        f.debug_struct("RoomRegistry")
            .field("rooms", &index.rooms.len())
            .field("players", &index.players.len())
            .finish()
    }
}
