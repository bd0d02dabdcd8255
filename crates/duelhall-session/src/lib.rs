//! Session lifecycle management for duelhall.
//!
//! Each session runs as an isolated Tokio task (actor model) that owns the
//! participant list and the battle. The registry maps session ids to
//! running actors and cleans up after departing connections.
//!
//! # Key types
//!
//! - [`SessionRegistry`]: creates and destroys sessions, routes joins and leaves
//! - [`SessionHandle`]: sends commands to a running session actor
//! - [`Session`]: the synchronous state machine inside an actor
//! - [`SessionConfig`]: combat rules, provider timeout, seeding

mod actor;
mod config;
mod error;
mod registry;
mod session;

pub use actor::{ParticipantSender, SessionHandle};
pub use config::SessionConfig;
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{Session, SessionInfo};
