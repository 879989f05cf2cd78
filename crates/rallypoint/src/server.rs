//! `RallypointServer` builder and accept loop.
//!
//! This is the entry point for running a Rallypoint coordinator. It ties
//! the layers together: transport → protocol → room registry.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use rallypoint_protocol::{Codec, JsonCodec};
use rallypoint_room::{CoordinatorConfig, RoomRegistry};
use rallypoint_timer::{Clock, Scheduler};
use rallypoint_transport::{Connection, Transport, WebSocketTransport};
use tracing::{debug, error, info};

use crate::handler::handle_connection;
use crate::{RallypointError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: RoomRegistry,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Rallypoint server.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), rallypoint::RallypointError> {
/// use rallypoint::RallypointServer;
///
/// let server = RallypointServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RallypointServerBuilder {
    config: ServerConfig,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl RallypointServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            clock: None,
            scheduler: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.config.coordinator = coordinator;
        self
    }

    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.idle_timeout_secs = secs;
        self
    }

    pub fn report_score_rejections(mut self, report: bool) -> Self {
        self.config.report_score_rejections = report;
        self
    }

    /// Overrides the wall clock rooms read "now" from.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides how lifecycle transitions are scheduled.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<RallypointServer<JsonCodec>, RallypointError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let mut registry = RoomRegistry::builder(self.config.coordinator.clone());
        if let Some(clock) = self.clock {
            registry = registry.clock(clock);
        }
        if let Some(scheduler) = self.scheduler {
            registry = registry.scheduler(scheduler);
        }

        let state = Arc::new(ServerState {
            registry: registry.build(),
            codec: JsonCodec,
            config: self.config,
        });
        Ok(RallypointServer { transport, state })
    }
}

impl Default for RallypointServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Rallypoint server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RallypointServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl RallypointServer<JsonCodec> {
    pub fn builder() -> RallypointServerBuilder {
        RallypointServerBuilder::new()
    }
}

impl<C: Codec> RallypointServer<C> {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry every connection routes through.
    pub fn registry(&self) -> &RoomRegistry {
        &self.state.registry
    }

    /// Accepts connections forever, one handler task each.
    pub async fn run(self) -> Result<(), RallypointError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Handler tasks already running are left to finish on their own.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RallypointError> {
        info!(addr = ?self.transport.local_addr().ok(), "rallypoint server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested, no longer accepting");
                    return Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let conn_id = conn.id();
                            if let Err(e) = handle_connection(conn, state).await {
                                debug!(%conn_id, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
