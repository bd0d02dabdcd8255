//! Server configuration.

use std::time::Duration;

use duelhall_roster::{DEFAULT_JIKAN_URL, DEFAULT_WAIFU_URL, RosterConfig};
use duelhall_session::SessionConfig;

use crate::DuelError;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// A connection that sends nothing for this long is closed.
    /// Clients keep it alive with `Heartbeat`.
    pub idle_timeout: Duration,

    /// Base URL of the remote character lookup.
    pub jikan_url: String,

    /// Base URL of the animation provider.
    pub waifu_url: String,

    pub session: SessionConfig,
    pub roster: RosterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            idle_timeout: Duration::from_secs(15),
            jikan_url: DEFAULT_JIKAN_URL.to_string(),
            waifu_url: DEFAULT_WAIFU_URL.to_string(),
            session: SessionConfig::default(),
            roster: RosterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads overrides from the process environment.
    ///
    /// | Variable            | Effect                         |
    /// |---------------------|--------------------------------|
    /// | `PORT`              | listen on `0.0.0.0:$PORT`      |
    /// | `DUELHALL_JIKAN_URL`| remote character lookup base   |
    /// | `DUELHALL_WAIFU_URL`| animation provider base        |
    /// | `DUELHALL_SEED`     | seed every session's RNG       |
    ///
    /// # Errors
    /// [`DuelError::Config`] if `PORT` or `DUELHALL_SEED` is not a number.
    pub fn from_env() -> Result<Self, DuelError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, DuelError> {
        let mut config = Self::default();

        if let Some(port) = get("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| DuelError::Config(format!("PORT must be a port number, got {port:?}")))?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }
        if let Some(url) = get("DUELHALL_JIKAN_URL") {
            config.jikan_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = get("DUELHALL_WAIFU_URL") {
            config.waifu_url = url.trim_end_matches('/').to_string();
        }
        if let Some(seed) = get("DUELHALL_SEED") {
            let seed: u64 = seed
                .trim()
                .parse()
                .map_err(|_| DuelError::Config(format!("DUELHALL_SEED must be a u64, got {seed:?}")))?;
            config.session = config.session.rng_seed(seed);
        }

        Ok(config)
    }
}
