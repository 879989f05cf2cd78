//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Everything that touches a room (joins, leaves, score events, and the
//! deferred lifecycle transitions) arrives as a [`RoomCommand`] on one
//! bounded channel and is applied in arrival order. Events the room queues
//! are fanned out on a `broadcast` channel before the command's reply is
//! sent, so a caller that sees the reply can already read the events.

use std::sync::Arc;

use rallypoint_protocol::{PlayerId, RoomCode, RoomId, RoomState};
use rallypoint_timer::{Clock, Scheduler};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::room::{Departure, DisconnectResult, Player, Room, RoomSnapshot};
use crate::{CoordinatorConfig, RoomError, RoomEvent, ScoreEvent};

/// A membership grant: the room as it looked right after the player was
/// admitted, and a subscription to everything that happens from then on.
#[derive(Debug)]
pub struct Joined {
    pub snapshot: RoomSnapshot,
    pub events: broadcast::Receiver<RoomEvent>,
}

impl Joined {
    pub fn room_id(&self) -> &RoomId {
        &self.snapshot.room_id
    }

    pub fn room_code(&self) -> &RoomCode {
        &self.snapshot.room_code
    }
}

pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        name: String,
        reply: oneshot::Sender<Result<Joined, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<Departure, RoomError>>,
    },
    Disconnect {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<DisconnectResult, RoomError>>,
    },
    Reconnect {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<Joined, RoomError>>,
    },
    StartGame {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<u64, RoomError>>,
    },
    Score {
        player_id: PlayerId,
        event: ScoreEvent,
        reply: oneshot::Sender<Result<u64, RoomError>>,
    },
    /// Fired by the scheduler. Ignored unless the room is still in `from`
    /// during `round`.
    Advance { round: u64, from: RoomState },
    Leaderboard {
        reply: oneshot::Sender<Vec<Player>>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn join(&self, player_id: PlayerId, name: String) -> Result<Joined, RoomError> {
        self.request(|reply| RoomCommand::Join {
            player_id,
            name,
            reply,
        })
        .await?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<Departure, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    pub async fn disconnect(&self, player_id: PlayerId) -> Result<DisconnectResult, RoomError> {
        self.request(|reply| RoomCommand::Disconnect { player_id, reply })
            .await?
    }

    pub async fn reconnect(&self, player_id: PlayerId) -> Result<Joined, RoomError> {
        self.request(|reply| RoomCommand::Reconnect { player_id, reply })
            .await?
    }

    /// Returns the round number of the game that was started.
    pub async fn start_game(&self, player_id: PlayerId) -> Result<u64, RoomError> {
        self.request(|reply| RoomCommand::StartGame { player_id, reply })
            .await?
    }

    pub async fn score(&self, player_id: PlayerId, event: ScoreEvent) -> Result<u64, RoomError> {
        self.request(|reply| RoomCommand::Score {
            player_id,
            event,
            reply,
        })
        .await?
    }

    pub async fn leaderboard(&self) -> Result<Vec<Player>, RoomError> {
        self.request(|reply| RoomCommand::Leaderboard { reply }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("room_id", &self.room_id)
            .field("code", &self.code)
            .finish()
    }
}

/// Shared services every room actor needs.
#[derive(Clone)]
pub(crate) struct RoomContext {
    pub config: Arc<CoordinatorConfig>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn Scheduler>,
}

struct RoomActor {
    room: Room,
    ctx: RoomContext,
    events: broadcast::Sender<RoomEvent>,
    /// Lets scheduled transitions reach this actor without keeping it alive.
    commands: mpsc::WeakSender<RoomCommand>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        info!(room_id = %self.room.id(), code = %self.room.code(), "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle(cmd);
            self.publish();

            if self.room.is_empty() {
                break;
            }
        }

        info!(room_id = %self.room.id(), "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                player_id,
                name,
                reply,
            } => {
                let result = self.room.join(player_id, name).map(|_| self.admit());
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.room.leave(&player_id);
                self.publish();
                let _ = reply.send(result);
            }
            RoomCommand::Disconnect { player_id, reply } => {
                let result = self.room.disconnect(&player_id);
                self.publish();
                let _ = reply.send(result);
            }
            RoomCommand::Reconnect { player_id, reply } => {
                let result = self.room.reconnect(&player_id).map(|()| self.admit());
                let _ = reply.send(result);
            }
            RoomCommand::StartGame { player_id, reply } => {
                let now = self.ctx.clock.now_millis();
                let result = self.room.start(&player_id, now);
                if let Ok(round) = result {
                    self.arm_transitions(round);
                }
                self.publish();
                let _ = reply.send(result);
            }
            RoomCommand::Score {
                player_id,
                event,
                reply,
            } => {
                let now = self.ctx.clock.now_millis();
                let result = self.room.score(&player_id, &event, now);
                if let Err(err) = &result {
                    debug!(room_id = %self.room.id(), %player_id, %err, "score event rejected");
                }
                self.publish();
                let _ = reply.send(result);
            }
            RoomCommand::Advance { round, from } => {
                self.room.advance(round, from);
            }
            RoomCommand::Leaderboard { reply } => {
                let _ = reply.send(self.room.leaderboard());
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.snapshot());
            }
        }
    }

    /// Publishes pending events, then subscribes the newcomer so it does not
    /// hear about its own arrival.
    fn admit(&mut self) -> Joined {
        self.publish();
        Joined {
            snapshot: self.room.snapshot(),
            events: self.events.subscribe(),
        }
    }

    fn publish(&mut self) {
        for event in self.room.drain_events() {
            // No receivers is fine: everyone may be disconnected.
            let _ = self.events.send(event);
        }
    }

    /// Arms COUNTDOWN → ACTIVE → FINISHED → LOBBY for `round`, all relative
    /// to now.
    fn arm_transitions(&self, round: u64) {
        let countdown = self.ctx.config.countdown();
        let finish = countdown + self.ctx.config.game_duration();
        let reset = finish + self.ctx.config.reset_delay();

        for (delay, from) in [
            (countdown, RoomState::Countdown),
            (finish, RoomState::Active),
            (reset, RoomState::Finished),
        ] {
            let commands = self.commands.clone();
            self.ctx.scheduler.after(
                delay,
                Box::pin(async move {
                    if let Some(commands) = commands.upgrade() {
                        let _ = commands.send(RoomCommand::Advance { round, from }).await;
                    }
                }),
            );
        }
    }
}

/// Spawns a room actor and returns its handle plus the first subscription
/// to its events (for the creating host).
pub(crate) fn spawn_room(room: Room, ctx: RoomContext) -> (RoomHandle, broadcast::Receiver<RoomEvent>) {
    let (tx, rx) = mpsc::channel(ctx.config.room_channel_capacity);
    let (events, host_events) = broadcast::channel(ctx.config.broadcast_capacity);

    let handle = RoomHandle {
        room_id: room.id().clone(),
        code: room.code().clone(),
        sender: tx.clone(),
    };
    let actor = RoomActor {
        room,
        ctx,
        events,
        commands: tx.downgrade(),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    (handle, host_events)
}
