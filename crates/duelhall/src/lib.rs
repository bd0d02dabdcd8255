//! # duelhall
//!
//! A two-player, turn-based battle server over WebSockets.
//!
//! Clients join a session by name, search for a combatant (from the
//! built-in hero catalog or a remote character lookup), pick one, and
//! trade attacks until one side drops to zero health. Every state change
//! is broadcast to everyone in the session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duelhall::prelude::*;
//!
//! # async fn run() -> Result<(), DuelError> {
//! let config = ServerConfig::from_env()?;
//! let remote = JikanCatalog::new(config.jikan_url.clone());
//! let animations = WaifuAnimations::new(config.waifu_url.clone());
//! let server = DuelServerBuilder::new()
//!     .config(config)
//!     .build(remote, animations)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{DEFAULT_PORT, ServerConfig};
pub use error::DuelError;
pub use server::{DuelServer, DuelServerBuilder};

/// Everything needed to run a server or write a client against it.
pub mod prelude {
    pub use crate::{DuelError, DuelServer, DuelServerBuilder, ServerConfig};

    pub use duelhall_battle::BattleRules;
    pub use duelhall_protocol::{
        AnimationCategory, AttackKind, BattleSnapshot, ClientMessage, Codec, Combatant,
        CombatantStats, ConnectionId, Envelope, JsonCodec, LogEntry, Participant, ProviderKind,
        ServerMessage, SessionId,
    };
    pub use duelhall_roster::{
        AnimationProvider, CombatantProvider, JikanCatalog, ProviderError, RosterConfig,
        StaticCatalog, WaifuAnimations,
    };
    pub use duelhall_session::SessionConfig;
}
