//! The search adapter the server talks to.

use std::time::Duration;

use duelhall_protocol::{Combatant, ProviderKind};

use crate::{CombatantProvider, ProviderError, StaticCatalog};

/// Bounds applied to every search.
#[derive(Debug, Clone)]
pub struct RosterConfig {
    /// Maximum combatants returned per search.
    pub limit: usize,

    /// How long the remote provider gets before the search gives up.
    pub timeout: Duration,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            timeout: Duration::from_secs(3),
        }
    }
}

/// Routes searches to the static catalog or the remote provider.
///
/// Search failures are never fatal: whatever goes wrong remotely, the
/// caller gets an empty list and a `warn!` lands in the log.
pub struct Roster<R: CombatantProvider> {
    catalog: StaticCatalog,
    remote: R,
    config: RosterConfig,
}

impl<R: CombatantProvider> Roster<R> {
    pub fn new(catalog: StaticCatalog, remote: R, config: RosterConfig) -> Self {
        Self {
            catalog,
            remote,
            config,
        }
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    /// Runs `query` against the provider named by `kind`.
    ///
    /// Returns at most `config.limit` combatants. Remote failures,
    /// including timeouts, yield an empty list.
    pub async fn search(&self, kind: ProviderKind, query: &str) -> Vec<Combatant> {
        match kind {
            ProviderKind::Static => self.catalog.find(query, self.config.limit),
            ProviderKind::Remote => match self.search_remote(query).await {
                Ok(mut found) => {
                    found.truncate(self.config.limit);
                    found
                }
                Err(e) => {
                    tracing::warn!(query, error = %e, "remote combatant search failed");
                    Vec::new()
                }
            },
        }
    }

    async fn search_remote(&self, query: &str) -> Result<Vec<Combatant>, ProviderError> {
        tokio::time::timeout(self.config.timeout, self.remote.search(query))
            .await
            .map_err(|_| ProviderError::Timeout(self.config.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use duelhall_protocol::CombatantStats;

    use super::*;

    fn npc(id: u64) -> Combatant {
        Combatant {
            id,
            name: format!("npc-{id}"),
            image_url: String::new(),
            stats: CombatantStats {
                strength: 60,
                speed: 60,
                durability: 60,
                power: 60,
            },
        }
    }

    /// Returns `count` fixed combatants.
    struct Crowd(usize);

    impl CombatantProvider for Crowd {
        async fn search(&self, _query: &str) -> Result<Vec<Combatant>, ProviderError> {
            Ok((0..self.0 as u64).map(npc).collect())
        }
    }

    /// Always fails.
    struct Broken;

    impl CombatantProvider for Broken {
        async fn search(&self, _query: &str) -> Result<Vec<Combatant>, ProviderError> {
            Err(ProviderError::Malformed("not json".into()))
        }
    }

    /// Never answers.
    struct Stalled;

    impl CombatantProvider for Stalled {
        async fn search(&self, _query: &str) -> Result<Vec<Combatant>, ProviderError> {
            std::future::pending().await
        }
    }

    fn roster<R: CombatantProvider>(remote: R) -> Roster<R> {
        Roster::new(StaticCatalog::heroes(), remote, RosterConfig::default())
    }

    #[tokio::test]
    async fn test_static_search_filters_catalog() {
        let found = roster(Broken).search(ProviderKind::Static, "bat").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Batman");
    }

    #[tokio::test]
    async fn test_remote_search_is_bounded_to_limit() {
        let found = roster(Crowd(12)).search(ProviderKind::Remote, "x").await;
        assert_eq!(found.len(), 5);
    }

    #[tokio::test]
    async fn test_remote_failure_degrades_to_empty() {
        let found = roster(Broken).search(ProviderKind::Remote, "x").await;
        assert!(found.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_stall_times_out_to_empty() {
        let found = roster(Stalled).search(ProviderKind::Remote, "x").await;
        assert!(found.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_timeout_error_names_the_bound() {
        let roster = roster(Stalled);
        let err = roster.search_remote("x").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(d) if d == Duration::from_secs(3)));
    }
}
