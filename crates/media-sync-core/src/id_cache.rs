use std::collections::HashMap;
use media_sync_models::TmdbId;

/// In-memory view of the identity mapping store: Letterboxd URL -> TMDB ID
///
/// Entries are never replaced. The first mapping recorded for a URL is the
/// one that sticks for the lifetime of the store.
#[derive(Debug, Default)]
pub struct IdCache {
    by_url: HashMap<String, TmdbId>,
}

impl IdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_url: &str) -> Option<TmdbId> {
        self.by_url.get(source_url).copied()
    }

    pub fn contains(&self, source_url: &str) -> bool {
        self.by_url.contains_key(source_url)
    }

    /// Insert if the URL is unknown; returns whether the mapping was new
    pub fn record(&mut self, source_url: &str, tmdb_id: TmdbId) -> bool {
        if self.by_url.contains_key(source_url) {
            return false;
        }
        self.by_url.insert(source_url.to_string(), tmdb_id);
        true
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }
}
