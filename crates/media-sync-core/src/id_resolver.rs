use anyhow::Result;
use futures::stream::{self, StreamExt};
use media_sync_models::{ExportRow, IdentityMapping, TmdbId};
use media_sync_sources::CanonicalIdLookup;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use crate::id_cache::IdCache;
use crate::id_cache_storage::IdCacheStorage;

/// Configuration for ID resolver behavior
#[derive(Debug, Clone)]
pub struct IdResolverConfig {
    /// Ask Letterboxd for URLs missing from the store
    pub lookup_enabled: bool,

    /// Lookups in flight at once (results are still consumed in file order)
    pub concurrency: usize,
}

impl Default for IdResolverConfig {
    fn default() -> Self {
        Self {
            lookup_enabled: true,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ResolveStats {
    /// URLs already present in the mapping store
    pub cached: usize,
    /// New mappings learned this run
    pub resolved: usize,
    /// Lookups that failed or found no movie ID
    pub failed: usize,
    /// Resolved this run but not written to the store; looked up again next run
    pub unpersisted: usize,
}

/// Bridges Letterboxd URLs to TMDB IDs
///
/// Combines the in-memory cache, the append-only store and the Letterboxd
/// lookup. Each distinct URL is looked up at most once per run; failures are
/// not remembered, so they are retried on the next run.
pub struct IdResolver {
    cache: IdCache,
    storage: IdCacheStorage,
    lookup: Option<Arc<dyn CanonicalIdLookup>>,
    config: IdResolverConfig,
    attempted: HashSet<String>,
    stats: ResolveStats,
}

impl IdResolver {
    pub fn new(
        storage: IdCacheStorage,
        lookup: Option<Arc<dyn CanonicalIdLookup>>,
        config: IdResolverConfig,
    ) -> Result<Self> {
        let cache = storage.load()?;
        Ok(Self {
            cache,
            storage,
            lookup,
            config,
            attempted: HashSet::new(),
            stats: ResolveStats::default(),
        })
    }

    pub fn tmdb_id_for(&self, source_url: &str) -> Option<TmdbId> {
        self.cache.get(source_url)
    }

    pub fn cache(&self) -> &IdCache {
        &self.cache
    }

    pub fn stats(&self) -> &ResolveStats {
        &self.stats
    }

    /// Make sure every row's URL has been given its chance to resolve
    pub async fn resolve_rows(&mut self, rows: &[ExportRow]) -> Result<()> {
        let mut pending = Vec::new();
        for row in rows {
            let url = row.source_url.as_str();
            if !self.attempted.insert(url.to_string()) {
                continue;
            }
            if self.cache.contains(url) {
                self.stats.cached += 1;
            } else {
                pending.push(url.to_string());
            }
        }

        if pending.is_empty() {
            return Ok(());
        }
        let lookup = match self.lookup.as_ref().filter(|_| self.config.lookup_enabled) {
            Some(lookup) => Arc::clone(lookup),
            None => {
                debug!("Letterboxd lookups disabled, {} URLs stay unresolved", pending.len());
                self.stats.failed += pending.len();
                return Ok(());
            }
        };

        info!("Resolving {} Letterboxd URLs to TMDB IDs", pending.len());
        let mut results = stream::iter(pending.into_iter().map(|url| {
            let lookup = Arc::clone(&lookup);
            async move {
                let result = lookup.lookup_tmdb_id(&url).await;
                (url, result)
            }
        }))
        .buffered(self.config.concurrency.max(1));

        let mut store_error = None;
        while let Some((url, result)) = results.next().await {
            match result {
                Ok(Some(tmdb_id)) => {
                    self.cache.record(&url, tmdb_id);
                    self.stats.resolved += 1;
                    debug!("Resolved {} -> {}", url, tmdb_id);
                    if let Err(e) = self.storage.append(&IdentityMapping::new(url.as_str(), tmdb_id)) {
                        error!("Failed to persist mapping {} -> {}: {:#}", url, tmdb_id, e);
                        self.stats.unpersisted += 1;
                        store_error.get_or_insert(e);
                    }
                }
                Ok(None) => {
                    warn!("No TMDB movie ID found on {}", url);
                    self.stats.failed += 1;
                }
                Err(e) => {
                    warn!("Failed to resolve {}: {}", url, e);
                    self.stats.failed += 1;
                }
            }
        }

        match store_error {
            Some(e) => Err(e.context(format!(
                "{} resolved mappings could not be saved to {}",
                self.stats.unpersisted,
                self.storage.path().display()
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockLookup;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> IdCacheStorage {
        IdCacheStorage::open(&dir.path().join("lb_URL_to_tmdb_id.csv")).unwrap()
    }

    fn rows(urls: &[&str]) -> Vec<ExportRow> {
        urls.iter().map(|url| ExportRow::new("Film", *url)).collect()
    }

    #[tokio::test]
    async fn test_cached_urls_make_no_lookups() {
        let dir = TempDir::new().unwrap();
        let store = storage(&dir);
        store.append(&IdentityMapping::new("https://boxd.it/29Q8", TmdbId(603))).unwrap();

        let lookup = Arc::new(MockLookup::new());
        let mut resolver = IdResolver::new(store, Some(lookup.clone()), IdResolverConfig::default()).unwrap();
        resolver.resolve_rows(&rows(&["https://boxd.it/29Q8"])).await.unwrap();

        assert!(lookup.calls().is_empty());
        assert_eq!(resolver.tmdb_id_for("https://boxd.it/29Q8"), Some(TmdbId(603)));
        assert_eq!(resolver.stats().cached, 1);
    }

    #[tokio::test]
    async fn test_new_mapping_is_persisted() {
        let dir = TempDir::new().unwrap();
        let lookup = Arc::new(MockLookup::new().with("https://boxd.it/nZ6e", TmdbId(438631)));
        let mut resolver = IdResolver::new(storage(&dir), Some(lookup.clone()), IdResolverConfig::default()).unwrap();

        resolver.resolve_rows(&rows(&["https://boxd.it/nZ6e"])).await.unwrap();
        assert_eq!(resolver.tmdb_id_for("https://boxd.it/nZ6e"), Some(TmdbId(438631)));

        let reloaded = storage(&dir).load().unwrap();
        assert_eq!(reloaded.get("https://boxd.it/nZ6e"), Some(TmdbId(438631)));
    }

    #[tokio::test]
    async fn test_failures_are_not_recorded_and_retried_next_run() {
        let dir = TempDir::new().unwrap();
        let lookup = Arc::new(
            MockLookup::new()
                .failing("https://boxd.it/down")
                .with("https://boxd.it/29Q8", TmdbId(603)),
        );
        let urls = rows(&["https://boxd.it/down", "https://boxd.it/tvshow", "https://boxd.it/29Q8"]);

        let mut resolver = IdResolver::new(storage(&dir), Some(lookup.clone()), IdResolverConfig::default()).unwrap();
        resolver.resolve_rows(&urls).await.unwrap();
        assert_eq!(resolver.stats().failed, 2);
        assert_eq!(resolver.stats().resolved, 1);
        assert_eq!(resolver.cache().len(), 1);

        let mut next_run = IdResolver::new(storage(&dir), Some(lookup.clone()), IdResolverConfig::default()).unwrap();
        next_run.resolve_rows(&urls).await.unwrap();
        let calls = lookup.calls();
        assert_eq!(calls.iter().filter(|u| u.as_str() == "https://boxd.it/down").count(), 2);
        assert_eq!(calls.iter().filter(|u| u.as_str() == "https://boxd.it/29Q8").count(), 1);
    }

    #[tokio::test]
    async fn test_each_url_looked_up_once_per_run() {
        let dir = TempDir::new().unwrap();
        let lookup = Arc::new(MockLookup::new());
        let mut resolver = IdResolver::new(storage(&dir), Some(lookup.clone()), IdResolverConfig::default()).unwrap();

        let urls = rows(&["https://boxd.it/x", "https://boxd.it/x"]);
        resolver.resolve_rows(&urls).await.unwrap();
        resolver.resolve_rows(&urls).await.unwrap();

        assert_eq!(lookup.calls(), vec!["https://boxd.it/x".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_keep_file_order() {
        let dir = TempDir::new().unwrap();
        let lookup = Arc::new(
            MockLookup::new()
                .with("https://boxd.it/a", TmdbId(1))
                .with("https://boxd.it/b", TmdbId(2))
                .with("https://boxd.it/c", TmdbId(3)),
        );
        let config = IdResolverConfig {
            lookup_enabled: true,
            concurrency: 3,
        };
        let mut resolver = IdResolver::new(storage(&dir), Some(lookup), config).unwrap();
        resolver
            .resolve_rows(&rows(&["https://boxd.it/a", "https://boxd.it/b", "https://boxd.it/c"]))
            .await
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("lb_URL_to_tmdb_id.csv")).unwrap();
        assert_eq!(content, "https://boxd.it/a,1\nhttps://boxd.it/b,2\nhttps://boxd.it/c,3\n");
    }

    #[tokio::test]
    async fn test_unwritable_store_keeps_resolving() {
        let dir = TempDir::new().unwrap();
        let lookup = Arc::new(
            MockLookup::new()
                .with("https://boxd.it/a", TmdbId(1))
                .with("https://boxd.it/b", TmdbId(2)),
        );
        let mut resolver = IdResolver::new(storage(&dir), Some(lookup.clone()), IdResolverConfig::default()).unwrap();

        let store_path = dir.path().join("lb_URL_to_tmdb_id.csv");
        std::fs::remove_file(&store_path).unwrap();
        std::fs::create_dir(&store_path).unwrap();

        let result = resolver.resolve_rows(&rows(&["https://boxd.it/a", "https://boxd.it/b"])).await;

        assert!(result.is_err());
        assert_eq!(lookup.calls(), vec!["https://boxd.it/a".to_string(), "https://boxd.it/b".to_string()]);
        assert_eq!(resolver.tmdb_id_for("https://boxd.it/a"), Some(TmdbId(1)));
        assert_eq!(resolver.tmdb_id_for("https://boxd.it/b"), Some(TmdbId(2)));
        assert_eq!(resolver.stats().resolved, 2);
        assert_eq!(resolver.stats().unpersisted, 2);
    }

    #[tokio::test]
    async fn test_lookup_disabled_uses_store_only() {
        let dir = TempDir::new().unwrap();
        let mut resolver = IdResolver::new(storage(&dir), None, IdResolverConfig::default()).unwrap();
        resolver.resolve_rows(&rows(&["https://boxd.it/29Q8"])).await.unwrap();

        assert_eq!(resolver.tmdb_id_for("https://boxd.it/29Q8"), None);
        assert_eq!(resolver.stats().failed, 1);
    }
}
