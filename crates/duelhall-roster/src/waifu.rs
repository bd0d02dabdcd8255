//! Attack animations from waifu.pics.

use duelhall_protocol::AnimationCategory;
use serde::Deserialize;

use crate::{AnimationProvider, ProviderError};

/// Public waifu.pics endpoint.
pub const DEFAULT_WAIFU_URL: &str = "https://api.waifu.pics";

/// [`AnimationProvider`] backed by `GET {base}/sfw/{category}`, which
/// answers `{"url": "..."}`.
#[derive(Debug, Clone)]
pub struct WaifuAnimations {
    client: reqwest::Client,
    base_url: String,
}

impl WaifuAnimations {
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

impl Default for WaifuAnimations {
    fn default() -> Self {
        Self::new(DEFAULT_WAIFU_URL)
    }
}

#[derive(Debug, Deserialize)]
struct AnimationBody {
    url: String,
}

impl AnimationProvider for WaifuAnimations {
    async fn fetch(&self, category: AnimationCategory) -> Result<String, ProviderError> {
        let body: AnimationBody = self
            .client
            .get(format!("{}/sfw/{}", self.base_url, category.as_str()))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.url.is_empty() {
            return Err(ProviderError::Malformed("empty animation url".into()));
        }
        Ok(body.url)
    }
}
