//! Wire protocol for duelhall.
//!
//! - **Domain records** ([`Combatant`], [`Participant`], [`LogEntry`],
//!   [`BattleSnapshot`]) shared by every layer above.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`Envelope`]).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session (battle state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use duelhall_transport::ConnectionId;
pub use error::ProtocolError;
pub use types::{
    AnimationCategory, AttackKind, BattleSnapshot, ClientMessage, Combatant, CombatantStats,
    Envelope, LogEntry, Participant, ProviderKind, ServerMessage, SessionId,
};
