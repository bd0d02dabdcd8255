//! Where combatants and animations come from.
//!
//! Both are external collaborators hidden behind traits:
//!
//! - [`CombatantProvider`]: query string in, combatant records out.
//!   [`StaticCatalog`] is the built-in hero list, [`JikanCatalog`] the
//!   remote character lookup.
//! - [`AnimationProvider`]: animation category in, reference (URL) out.
//!   [`WaifuAnimations`] is the HTTP implementation.
//!
//! [`Roster`] is the adapter the server calls: it bounds results, applies
//! a timeout and turns every provider failure into an empty result.

mod catalog;
mod error;
mod jikan;
mod provider;
mod roster;
mod waifu;

pub use catalog::StaticCatalog;
pub use error::ProviderError;
pub use jikan::{DEFAULT_JIKAN_URL, JikanCatalog};
pub use provider::{AnimationProvider, CombatantProvider};
pub use roster::{Roster, RosterConfig};
pub use waifu::{DEFAULT_WAIFU_URL, WaifuAnimations};
