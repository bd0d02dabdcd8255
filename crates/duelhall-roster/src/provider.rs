//! Provider traits.

use duelhall_protocol::{AnimationCategory, Combatant};

use crate::ProviderError;

/// Looks up combatants by free text.
///
/// Implementations may return more results than the caller wants;
/// [`Roster`](crate::Roster) trims them.
///
/// # Example
///
/// ```rust
/// use duelhall_protocol::Combatant;
/// use duelhall_roster::{CombatantProvider, ProviderError};
///
/// /// Never finds anyone.
/// struct Nobody;
///
/// impl CombatantProvider for Nobody {
///     async fn search(&self, _query: &str) -> Result<Vec<Combatant>, ProviderError> {
///         Ok(Vec::new())
///     }
/// }
/// ```
pub trait CombatantProvider: Send + Sync + 'static {
    /// Returns every combatant matching `query`.
    fn search(
        &self,
        query: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Combatant>, ProviderError>> + Send;
}

/// Resolves an animation category to something a client can play.
pub trait AnimationProvider: Send + Sync + 'static {
    /// Returns a reference (usually a GIF URL) for `category`.
    fn fetch(
        &self,
        category: AnimationCategory,
    ) -> impl std::future::Future<Output = Result<String, ProviderError>> + Send;
}
