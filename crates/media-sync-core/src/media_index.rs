use anyhow::Result;
use media_sync_models::{LibrarySelector, MediaItem, TmdbId};
use media_sync_sources::MediaServer;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Identifier -> library item lookup, built once per run
///
/// Every identifier an item carries (its native `plex://` GUID and each
/// external GUID such as `tmdb://603`) points at the same shared item.
#[derive(Debug, Default)]
pub struct MediaIndex {
    by_identifier: HashMap<String, Arc<MediaItem>>,
    items: usize,
}

impl MediaIndex {
    pub fn from_items(items: Vec<MediaItem>) -> Self {
        let mut index = Self::default();
        for item in items {
            index.insert(Arc::new(item));
        }
        index
    }

    pub async fn build(server: &dyn MediaServer, selector: &LibrarySelector) -> Result<Self> {
        let start = std::time::Instant::now();
        let items = server.library_items(selector).await?;
        let index = Self::from_items(items);
        info!(
            "Indexed {} {} items under {} identifiers in {:?}",
            index.len(),
            server.server_name(),
            index.identifier_count(),
            start.elapsed()
        );
        Ok(index)
    }

    fn insert(&mut self, item: Arc<MediaItem>) {
        for identifier in item.identifiers() {
            if identifier.is_empty() {
                continue;
            }
            let previous = self.by_identifier.insert(identifier.to_string(), Arc::clone(&item));
            if let Some(previous) = previous {
                if identifier.starts_with(TmdbId::GUID_SCHEME) && previous.rating_key != item.rating_key {
                    warn!(
                        "{} is claimed by both '{}' ({}) and '{}' ({}), using the latter",
                        identifier, previous.title, previous.rating_key, item.title, item.rating_key
                    );
                }
            }
        }
        self.items += 1;
    }

    pub fn find(&self, identifier: &str) -> Option<Arc<MediaItem>> {
        self.by_identifier.get(identifier).cloned()
    }

    pub fn find_by_tmdb(&self, tmdb_id: TmdbId) -> Option<Arc<MediaItem>> {
        self.find(&tmdb_id.guid())
    }

    pub fn contains_tmdb(&self, tmdb_id: TmdbId) -> bool {
        self.by_identifier.contains_key(&tmdb_id.guid())
    }

    /// Number of library items indexed
    pub fn len(&self) -> usize {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    pub fn identifier_count(&self) -> usize {
        self.by_identifier.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::movie;

    #[test]
    fn test_every_identifier_points_at_the_same_item() {
        let index = MediaIndex::from_items(vec![movie("1", "The Matrix", 603)]);

        let by_native = index.find("plex://movie/1").unwrap();
        let by_tmdb = index.find_by_tmdb(TmdbId(603)).unwrap();
        let by_imdb = index.find("imdb://tt603").unwrap();
        assert!(Arc::ptr_eq(&by_native, &by_tmdb));
        assert!(Arc::ptr_eq(&by_tmdb, &by_imdb));
        assert_eq!(index.len(), 1);
        assert_eq!(index.identifier_count(), 3);
    }

    #[test]
    fn test_missing_identifier() {
        let index = MediaIndex::from_items(vec![movie("1", "The Matrix", 603)]);
        assert!(index.find_by_tmdb(TmdbId(604)).is_none());
        assert!(!index.contains_tmdb(TmdbId(604)));
    }

    #[test]
    fn test_collision_last_write_wins() {
        let index = MediaIndex::from_items(vec![
            movie("1", "The Matrix", 603),
            movie("2", "The Matrix (4K)", 603),
        ]);
        assert_eq!(index.find_by_tmdb(TmdbId(603)).unwrap().rating_key, "2");
        assert_eq!(index.find("plex://movie/1").unwrap().rating_key, "1");
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_empty_library() {
        let index = MediaIndex::from_items(Vec::new());
        assert!(index.is_empty());
    }
}
