//! `DuelServer` builder and server loop.
//!
//! This is the entry point for running a duelhall server. It ties the
//! layers together: transport → protocol → session → battle.

use std::sync::Arc;
use std::time::Duration;

use duelhall_protocol::{Codec, JsonCodec};
use duelhall_roster::{AnimationProvider, CombatantProvider, Roster, RosterConfig, StaticCatalog};
use duelhall_session::{SessionConfig, SessionRegistry};
use duelhall_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{DuelError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// The registry guards its own table; session actors are reached through
/// cloned handles, never under that lock.
pub(crate) struct ServerState<R: CombatantProvider, A: AnimationProvider, C: Codec> {
    pub(crate) registry: SessionRegistry<A>,
    pub(crate) roster: Roster<R>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a duelhall server.
///
/// # Example
///
/// ```rust,no_run
/// use duelhall::prelude::*;
///
/// # async fn run() -> Result<(), DuelError> {
/// let server = DuelServerBuilder::new()
///     .bind("0.0.0.0:3000")
///     .build(JikanCatalog::default(), WaifuAnimations::default())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct DuelServerBuilder {
    config: ServerConfig,
}

impl DuelServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn roster_config(mut self, config: RosterConfig) -> Self {
        self.config.roster = config;
        self
    }

    /// Binds the listener and wires up the providers.
    ///
    /// `remote` backs `provider: "remote"` searches; the static hero
    /// catalog is built in. Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<R, A>(
        self,
        remote: R,
        animations: A,
    ) -> Result<DuelServer<R, A, JsonCodec>, DuelError>
    where
        R: CombatantProvider,
        A: AnimationProvider,
    {
        let ServerConfig {
            bind_addr,
            idle_timeout,
            session,
            roster,
            ..
        } = self.config;

        let transport = WebSocketTransport::bind(&bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: SessionRegistry::new(session, animations),
            roster: Roster::new(StaticCatalog::heroes(), remote, roster),
            codec: JsonCodec,
            idle_timeout,
        });

        Ok(DuelServer { transport, state })
    }
}

impl Default for DuelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound duelhall server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DuelServer<R: CombatantProvider, A: AnimationProvider, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<R, A, C>>,
}

impl<R, A, C> DuelServer<R, A, C>
where
    R: CombatantProvider,
    A: AnimationProvider,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop, spawning a handler task per connection.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), DuelError> {
        tracing::info!(addr = ?self.local_addr().ok(), "duelhall server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
