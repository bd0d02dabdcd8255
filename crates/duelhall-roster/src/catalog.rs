//! The built-in hero catalog.

use duelhall_protocol::{Combatant, CombatantStats};

use crate::{CombatantProvider, ProviderError};

/// An in-memory list of combatants searched by name.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    entries: Vec<Combatant>,
}

impl StaticCatalog {
    /// A catalog over arbitrary entries.
    pub fn new(entries: Vec<Combatant>) -> Self {
        Self { entries }
    }

    /// The five stock comic heroes.
    pub fn heroes() -> Self {
        Self::new(vec![
            hero(1, "Superman", "https://boundingintocomics.com/wp-content/uploads/144.png", [100, 100, 100, 100]),
            hero(2, "Batman", "https://static0.srcdn.com/wordpress/wp-content/uploads/2024/02/detective-comics-1000-batman-joker-featured.jpg", [80, 70, 90, 60]),
            hero(3, "Spider-Man", "https://cdn.marvel.com/content/1x/rek-rap_card.jpg", [70, 90, 70, 80]),
            hero(4, "Wonder Woman", "https://media.wired.com/photos/59375829bef1fc4e58f94a0e/master/pass/GalleryComics_1920x1080_20170531_WW-Annual-1_5903bbd4d223b6.50778583.jpg", [95, 85, 95, 90]),
            hero(5, "Hulk", "https://cdn.marvel.com/content/1x/hulkard_0.jpg", [100, 60, 100, 95]),
        ])
    }

    /// Case-insensitive substring match on the name, at most `limit`
    /// entries, in catalog order. An empty query matches everyone.
    pub fn find(&self, query: &str, limit: usize) -> Vec<Combatant> {
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::heroes()
    }
}

impl CombatantProvider for StaticCatalog {
    async fn search(&self, query: &str) -> Result<Vec<Combatant>, ProviderError> {
        Ok(self.find(query, usize::MAX))
    }
}

fn hero(id: u64, name: &str, image_url: &str, stats: [u32; 4]) -> Combatant {
    let [strength, speed, durability, power] = stats;
    Combatant {
        id,
        name: name.to_owned(),
        image_url: image_url.to_owned(),
        stats: CombatantStats {
            strength,
            speed,
            durability,
            power,
        },
    }
}
