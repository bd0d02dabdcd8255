//! Remote character lookup against the Jikan API.

use duelhall_protocol::{Combatant, CombatantStats};
use rand::Rng;
use serde::Deserialize;

use crate::{CombatantProvider, ProviderError};

/// Public Jikan v4 endpoint.
pub const DEFAULT_JIKAN_URL: &str = "https://api.jikan.moe/v4";

/// How many characters to ask Jikan for.
const PAGE_SIZE: &str = "5";

/// Stat range for remote characters, which carry no combat numbers.
const STAT_RANGE: std::ops::Range<u32> = 50..150;

/// [`CombatantProvider`] backed by `GET {base}/characters?q=…&limit=5`.
///
/// Jikan knows names and pictures but not combat stats, so every result
/// gets four stats rolled independently from `[50, 150)`.
#[derive(Debug, Clone)]
pub struct JikanCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl JikanCatalog {
    /// Points the catalog at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Like [`new`](Self::new) but reuses an existing client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl Default for JikanCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_JIKAN_URL)
    }
}

impl CombatantProvider for JikanCatalog {
    async fn search(&self, query: &str) -> Result<Vec<Combatant>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/characters", self.base_url))
            .query(&[("q", query), ("limit", PAGE_SIZE)])
            .send()
            .await?
            .error_for_status()?;

        let page: CharacterPage = response.json().await?;
        tracing::debug!(query, results = page.data.len(), "jikan search answered");
        Ok(into_combatants(page, &mut rand::rng()))
    }
}

#[derive(Debug, Deserialize)]
struct CharacterPage {
    data: Vec<Character>,
}

#[derive(Debug, Deserialize)]
struct Character {
    mal_id: u64,
    name: String,
    #[serde(default)]
    images: Images,
}

#[derive(Debug, Default, Deserialize)]
struct Images {
    #[serde(default)]
    jpg: Image,
}

#[derive(Debug, Default, Deserialize)]
struct Image {
    image_url: Option<String>,
}

fn into_combatants<R: Rng>(page: CharacterPage, rng: &mut R) -> Vec<Combatant> {
    page.data
        .into_iter()
        .map(|c| Combatant {
            id: c.mal_id,
            name: c.name,
            image_url: c.images.jpg.image_url.unwrap_or_default(),
            stats: roll_stats(rng),
        })
        .collect()
}

fn roll_stats<R: Rng>(rng: &mut R) -> CombatantStats {
    CombatantStats {
        strength: rng.random_range(STAT_RANGE),
        speed: rng.random_range(STAT_RANGE),
        durability: rng.random_range(STAT_RANGE),
        power: rng.random_range(STAT_RANGE),
    }
}
