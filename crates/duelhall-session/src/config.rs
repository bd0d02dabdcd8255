//! Session configuration.

use std::time::Duration;

use duelhall_battle::BattleRules;
use serde::{Deserialize, Serialize};

/// Settings shared by every session a registry spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Combat numbers.
    pub rules: BattleRules,

    /// Upper bound on one animation fetch. A slower provider means the
    /// attack goes through without an animation entry.
    pub provider_timeout: Duration,

    /// Seeds every session's random source when set. Session `n`
    /// (creation order, from zero) uses `seed + n`. `None` seeds from
    /// the OS.
    pub rng_seed: Option<u64>,

    /// Capacity of each session's command queue.
    pub channel_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rules: BattleRules::default().validated(),
            provider_timeout: Duration::from_secs(3),
            rng_seed: None,
            channel_size: 64,
        }
    }
}

impl SessionConfig {
    /// Sets the combat numbers, repairing any that `rand` cannot sample.
    pub fn rules(mut self, rules: BattleRules) -> Self {
        self.rules = rules.validated();
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn channel_size(mut self, size: usize) -> Self {
        self.channel_size = size.max(1);
        self
    }
}
