use anyhow::{anyhow, Result};
use media_sync_config::{Config, ExportPaths};
use media_sync_models::{ExportKind, ExportRow, LetterboxdRating, LibrarySelector, MediaItem, TmdbId};
use media_sync_sources::{parse_export_csv, AcquisitionService, CanonicalIdLookup, MediaServer};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use crate::acquisition::{AcquisitionForwarder, AcquisitionSettings};
use crate::id_cache_storage::IdCacheStorage;
use crate::id_resolver::{IdResolver, IdResolverConfig, ResolveStats};
use crate::media_index::MediaIndex;
use crate::progress::{PassReport, PassTracker};

/// One of the three reconciliation passes against the media server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Watched,
    Ratings,
    Watchlist,
}

impl SyncKind {
    pub fn name(&self) -> &'static str {
        self.export_kind().as_str()
    }

    pub fn export_kind(&self) -> ExportKind {
        match self {
            SyncKind::Watched => ExportKind::Watched,
            SyncKind::Ratings => ExportKind::Ratings,
            SyncKind::Watchlist => ExportKind::Watchlist,
        }
    }
}

/// Applies the deltas between an export and the server state
///
/// Only rows whose TMDB ID is known and present in the media index are
/// considered. Writes made during a pass are remembered so duplicate rows
/// never cause a second write.
pub struct Reconciler<'a> {
    server: &'a dyn MediaServer,
    index: &'a MediaIndex,
    resolver: &'a IdResolver,
    dry_run: bool,
    discover_fallback: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(server: &'a dyn MediaServer, index: &'a MediaIndex, resolver: &'a IdResolver) -> Self {
        Self {
            server,
            index,
            resolver,
            dry_run: false,
            discover_fallback: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Watchlist rows missing from the library are looked up in Plex's global catalog
    pub fn with_discover_fallback(mut self, enabled: bool) -> Self {
        self.discover_fallback = enabled;
        self
    }

    pub async fn run(&self, kind: SyncKind, rows: &[ExportRow]) -> Result<PassReport> {
        match kind {
            SyncKind::Watched => Ok(self.sync_watched(rows).await),
            SyncKind::Ratings => Ok(self.sync_ratings(rows).await),
            SyncKind::Watchlist => self.sync_watchlist(rows).await,
        }
    }

    fn tmdb_id(&self, row: &ExportRow, tracker: &mut PassTracker) -> Option<TmdbId> {
        let id = self.resolver.tmdb_id_for(&row.source_url);
        if id.is_none() {
            info!("Skipping '{}': no TMDB ID for {}", row.title, row.source_url);
            tracker.record_unresolved();
        }
        id
    }

    fn owned_item(&self, row: &ExportRow, tmdb_id: TmdbId, tracker: &mut PassTracker) -> Option<Arc<MediaItem>> {
        let item = self.index.find_by_tmdb(tmdb_id);
        if item.is_none() {
            debug!("'{}' ({}) is not in the library yet", row.title, tmdb_id);
            tracker.record_not_owned();
        }
        item
    }

    async fn sync_ratings(&self, rows: &[ExportRow]) -> PassReport {
        let mut tracker = PassTracker::new("ratings", rows.len(), 50);
        let mut written: HashMap<String, f64> = HashMap::new();

        for (idx, row) in rows.iter().enumerate() {
            tracker.log_progress(idx + 1);
            let Some(tmdb_id) = self.tmdb_id(row, &mut tracker) else { continue };

            let Some(rating) = row.score.as_deref().and_then(LetterboxdRating::parse) else {
                warn!("Skipping '{}': invalid rating {:?}", row.title, row.score);
                tracker.record_invalid();
                continue;
            };
            let Some(item) = self.owned_item(row, tmdb_id, &mut tracker) else { continue };

            let desired = rating.to_plex_scale();
            let current = written
                .get(&item.rating_key)
                .copied()
                .unwrap_or_else(|| item.current_rating());
            if (desired - current).abs() < f64::EPSILON {
                tracker.record_unchanged();
                continue;
            }

            if self.dry_run {
                info!("Would rate '{}' {} (currently {})", item.title, desired, current);
            } else if let Err(e) = self.server.set_rating(&item, desired).await {
                error!("Failed to rate '{}': {}", item.title, e);
                tracker.record_failed_with_error("rate");
                continue;
            } else {
                info!("Rated '{}' {}", item.title, desired);
            }
            written.insert(item.rating_key.clone(), desired);
            tracker.record_applied();
        }

        tracker.finish()
    }

    async fn sync_watched(&self, rows: &[ExportRow]) -> PassReport {
        let mut tracker = PassTracker::new("watched", rows.len(), 50);
        let mut played: HashSet<String> = HashSet::new();

        for (idx, row) in rows.iter().enumerate() {
            tracker.log_progress(idx + 1);
            let Some(tmdb_id) = self.tmdb_id(row, &mut tracker) else { continue };
            let Some(item) = self.owned_item(row, tmdb_id, &mut tracker) else { continue };

            if item.is_played() || played.contains(&item.rating_key) {
                tracker.record_unchanged();
                continue;
            }

            if self.dry_run {
                info!("Would mark '{}' as watched", item.title);
            } else if let Err(e) = self.server.mark_played(&item).await {
                error!("Failed to mark '{}' as watched: {}", item.title, e);
                tracker.record_failed_with_error("scrobble");
                continue;
            } else {
                info!("Marked '{}' as watched", item.title);
            }
            played.insert(item.rating_key.clone());
            tracker.record_applied();
        }

        tracker.finish()
    }

    async fn sync_watchlist(&self, rows: &[ExportRow]) -> Result<PassReport> {
        let mut on_watchlist: HashSet<String> = self
            .server
            .watchlist()
            .await?
            .into_iter()
            .map(|entry| entry.guid)
            .collect();
        debug!("{} items on the watchlist", on_watchlist.len());

        let mut tracker = PassTracker::new("watchlist", rows.len(), 50);
        let mut discovered: HashMap<TmdbId, Option<Arc<MediaItem>>> = HashMap::new();

        for (idx, row) in rows.iter().enumerate() {
            tracker.log_progress(idx + 1);
            let Some(tmdb_id) = self.tmdb_id(row, &mut tracker) else { continue };

            let item = match self.index.find_by_tmdb(tmdb_id) {
                Some(item) => Some(item),
                None if self.discover_fallback => match self.discover(tmdb_id, &mut discovered).await {
                    Ok(item) => item,
                    Err(e) => {
                        error!("Failed to look up '{}' ({}) in Plex: {}", row.title, tmdb_id, e);
                        tracker.record_failed_with_error("lookup");
                        continue;
                    }
                },
                None => None,
            };
            let Some(item) = item else {
                debug!("'{}' ({}) is not in the library yet", row.title, tmdb_id);
                tracker.record_not_owned();
                continue;
            };

            if on_watchlist.contains(&item.guid) {
                tracker.record_unchanged();
                continue;
            }

            if self.dry_run {
                info!("Would add '{}' to the watchlist", item.title);
            } else {
                match self.server.add_to_watchlist(&item).await {
                    Ok(()) => info!("Added '{}' to the watchlist", item.title),
                    Err(e) if e.is_bad_request() => {
                        error!("Plex refused to watchlist '{}' ({}): {}", item.title, item.guid, e);
                        tracker.record_failed_with_error("rejected");
                        continue;
                    }
                    Err(e) => {
                        error!("Failed to add '{}' to the watchlist: {}", item.title, e);
                        tracker.record_failed_with_error("http");
                        continue;
                    }
                }
            }
            on_watchlist.insert(item.guid.clone());
            tracker.record_applied();
        }

        Ok(tracker.finish())
    }

    async fn discover(
        &self,
        tmdb_id: TmdbId,
        discovered: &mut HashMap<TmdbId, Option<Arc<MediaItem>>>,
    ) -> Result<Option<Arc<MediaItem>>> {
        if let Some(item) = discovered.get(&tmdb_id) {
            return Ok(item.clone());
        }
        let item = self.server.find_by_tmdb_id(tmdb_id).await?.map(Arc::new);
        discovered.insert(tmdb_id, item.clone());
        Ok(item)
    }
}

/// What a run does; derived from the loaded configuration
#[derive(Debug, Clone, Serialize)]
pub struct SyncOptions {
    pub sync_watched: bool,
    pub sync_ratings: bool,
    pub sync_watchlist: bool,
    pub sync_acquisition: bool,
    pub dry_run: bool,
    pub watchlist_discover_fallback: bool,
    #[serde(skip)]
    pub library: LibrarySelector,
    #[serde(skip)]
    pub resolver: IdResolverConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            sync_watched: true,
            sync_ratings: true,
            sync_watchlist: true,
            sync_acquisition: false,
            dry_run: false,
            watchlist_discover_fallback: false,
            library: LibrarySelector::FirstMovieLibrary,
            resolver: IdResolverConfig::default(),
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sync_watched: config.sync.sync_watched,
            sync_ratings: config.sync.sync_ratings,
            sync_watchlist: config.sync.sync_watchlist,
            sync_acquisition: config.sync.sync_watchlist_to_radarr,
            dry_run: false,
            watchlist_discover_fallback: config.sync.watchlist_discover_fallback,
            library: config.library_selector(),
            resolver: IdResolverConfig {
                lookup_enabled: config.sync.map_letterboxd_to_tmdb,
                concurrency: config.sync.resolve_concurrency,
            },
        }
    }

    fn needs(&self, kind: ExportKind) -> bool {
        match kind {
            ExportKind::Watched => self.sync_watched,
            ExportKind::Ratings => self.sync_ratings,
            ExportKind::Watchlist => self.sync_watchlist || self.sync_acquisition,
        }
    }
}

/// Where the run currently is, reported to the phase callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    LoadingMappings,
    IndexingLibrary,
    Resolving(ExportKind),
    Pass(&'static str),
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::LoadingMappings => write!(f, "Loading Letterboxd mappings"),
            SyncPhase::IndexingLibrary => write!(f, "Indexing Plex library"),
            SyncPhase::Resolving(kind) => write!(f, "Resolving {} export", kind),
            SyncPhase::Pass(name) => write!(f, "Syncing {}", name),
        }
    }
}

pub type PhaseCallback = Box<dyn Fn(SyncPhase) + Send + Sync>;

#[derive(Debug, Serialize)]
pub struct SyncResult {
    pub passes: Vec<PassReport>,
    pub resolve: ResolveStats,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub errors: Vec<String>,
    pub dry_run: bool,
}

fn serialize_secs<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn applied(&self) -> usize {
        self.passes.iter().map(|p| p.applied).sum()
    }
}

pub struct SyncOrchestrator {
    server: Arc<dyn MediaServer>,
    lookup: Option<Arc<dyn CanonicalIdLookup>>,
    acquisition: Option<Arc<dyn AcquisitionService>>,
    acquisition_settings: AcquisitionSettings,
    exports: ExportPaths,
    mapping_path: PathBuf,
    options: SyncOptions,
    phase_callback: Option<PhaseCallback>,
}

impl SyncOrchestrator {
    pub fn new(server: Arc<dyn MediaServer>, mapping_path: PathBuf, exports: ExportPaths) -> Self {
        Self {
            server,
            lookup: None,
            acquisition: None,
            acquisition_settings: AcquisitionSettings::default(),
            exports,
            mapping_path,
            options: SyncOptions::default(),
            phase_callback: None,
        }
    }

    pub fn with_lookup(mut self, lookup: Option<Arc<dyn CanonicalIdLookup>>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn with_acquisition(
        mut self,
        service: Option<Arc<dyn AcquisitionService>>,
        settings: AcquisitionSettings,
    ) -> Self {
        self.acquisition = service;
        self.acquisition_settings = settings;
        self
    }

    pub fn with_sync_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_phase_callback(mut self, callback: PhaseCallback) -> Self {
        self.phase_callback = Some(callback);
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    fn phase(&self, phase: SyncPhase) {
        debug!("Phase: {}", phase);
        if let Some(callback) = &self.phase_callback {
            callback(phase);
        }
    }

    fn export_path(&self, kind: ExportKind) -> &PathBuf {
        match kind {
            ExportKind::Ratings => &self.exports.ratings_csv,
            ExportKind::Watched => &self.exports.watched_csv,
            ExportKind::Watchlist => &self.exports.watchlist_csv,
        }
    }

    /// Run every enabled pass
    ///
    /// Loading the mapping store and indexing the library are fatal; a
    /// failing export or pass is recorded in `errors` and the run goes on.
    pub async fn sync(&self) -> Result<SyncResult> {
        let start = Instant::now();
        let options = &self.options;
        let mut errors = Vec::new();
        if options.dry_run {
            info!("Dry run: no changes will be written to Plex or Radarr");
        }

        self.phase(SyncPhase::LoadingMappings);
        let storage = IdCacheStorage::open(&self.mapping_path)?;
        let mut resolver = IdResolver::new(storage, self.lookup.clone(), options.resolver.clone())?;

        self.phase(SyncPhase::IndexingLibrary);
        let index = MediaIndex::build(self.server.as_ref(), &options.library)
            .await
            .map_err(|e| anyhow!("Failed to index {} library: {}", self.server.server_name(), e))?;

        let mut exports: HashMap<ExportKind, Vec<ExportRow>> = HashMap::new();
        for kind in [ExportKind::Watched, ExportKind::Ratings, ExportKind::Watchlist] {
            if !options.needs(kind) {
                continue;
            }
            self.phase(SyncPhase::Resolving(kind));
            let rows = match parse_export_csv(self.export_path(kind), kind) {
                Ok(rows) => rows,
                Err(e) => {
                    error!("Failed to read {} export: {:#}", kind, e);
                    errors.push(format!("{} export: {:#}", kind, e));
                    continue;
                }
            };
            if let Err(e) = resolver.resolve_rows(&rows).await {
                error!("Failed to resolve {} export: {:#}", kind, e);
                errors.push(format!("{} mappings: {:#}", kind, e));
            }
            exports.insert(kind, rows);
        }

        let reconciler = Reconciler::new(self.server.as_ref(), &index, &resolver)
            .with_dry_run(options.dry_run)
            .with_discover_fallback(options.watchlist_discover_fallback);

        let mut passes = Vec::new();
        for kind in [SyncKind::Watched, SyncKind::Ratings, SyncKind::Watchlist] {
            let enabled = match kind {
                SyncKind::Watched => options.sync_watched,
                SyncKind::Ratings => options.sync_ratings,
                SyncKind::Watchlist => options.sync_watchlist,
            };
            let Some(rows) = exports.get(&kind.export_kind()).filter(|_| enabled) else { continue };

            self.phase(SyncPhase::Pass(kind.name()));
            match reconciler.run(kind, rows).await {
                Ok(report) => passes.push(report),
                Err(e) => {
                    error!("{} pass failed: {:#}", kind.name(), e);
                    errors.push(format!("{} pass: {:#}", kind.name(), e));
                }
            }
        }

        if options.sync_acquisition {
            match (&self.acquisition, exports.get(&ExportKind::Watchlist)) {
                (None, _) => errors.push("acquisition pass: Radarr is not configured".to_string()),
                (Some(_), None) => {}
                (Some(service), Some(rows)) => {
                    self.phase(SyncPhase::Pass("acquisition"));
                    let forwarder =
                        AcquisitionForwarder::new(service.as_ref(), &index, &resolver, &self.acquisition_settings)
                            .with_dry_run(options.dry_run);
                    match forwarder.run(rows).await {
                        Ok(report) => passes.push(report),
                        Err(e) => {
                            error!("acquisition pass failed: {:#}", e);
                            errors.push(format!("acquisition pass: {:#}", e));
                        }
                    }
                }
            }
        }

        let result = SyncResult {
            passes,
            resolve: resolver.stats().clone(),
            duration: start.elapsed(),
            errors,
            dry_run: options.dry_run,
        };
        info!(
            "Sync finished in {:.1}s: {} changes, {} errors",
            result.duration.as_secs_f64(),
            result.applied(),
            result.errors.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests;
