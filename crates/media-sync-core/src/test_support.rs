//! In-memory collaborators for engine tests

use async_trait::async_trait;
use media_sync_models::{
    AddMovieRequest, LibrarySelector, MediaItem, QualityProfile, Tag, TmdbId, ValidationFailure, WatchlistEntry,
};
use media_sync_sources::{AcquisitionService, AddMovieError, CanonicalIdLookup, MediaServer, SourceError};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A library movie with native GUID `plex://movie/<key>` and tmdb/imdb external GUIDs
pub fn movie(rating_key: &str, title: &str, tmdb_id: u32) -> MediaItem {
    MediaItem {
        rating_key: rating_key.to_string(),
        guid: format!("plex://movie/{}", rating_key),
        title: title.to_string(),
        year: None,
        external_guids: vec![format!("tmdb://{}", tmdb_id), format!("imdb://tt{}", tmdb_id)],
        user_rating: None,
        view_count: 0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerCall {
    Rate(String, f64),
    Played(String),
    AddToWatchlist(String),
    RemoveFromWatchlist(String),
    FindByTmdb(TmdbId),
}

#[derive(Default)]
pub struct MockServer {
    items: Vec<MediaItem>,
    watchlist: Vec<WatchlistEntry>,
    discover: HashMap<TmdbId, MediaItem>,
    rejected: HashSet<String>,
    failing: HashSet<String>,
    fail_library: bool,
    fail_watchlist: bool,
    calls: Mutex<Vec<ServerCall>>,
}

impl MockServer {
    pub fn new(items: Vec<MediaItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn with_watchlist(mut self, guids: &[&str]) -> Self {
        self.watchlist = guids
            .iter()
            .map(|guid| WatchlistEntry {
                guid: guid.to_string(),
                rating_key: String::new(),
                title: String::new(),
            })
            .collect();
        self
    }

    /// An item only known to the global metadata catalog
    pub fn with_discoverable(mut self, item: MediaItem) -> Self {
        if let Some(id) = item.tmdb_id() {
            self.discover.insert(id, item);
        }
        self
    }

    /// `add_to_watchlist` answers 400 for this GUID
    pub fn rejecting(mut self, guid: &str) -> Self {
        self.rejected.insert(guid.to_string());
        self
    }

    /// Every write for this rating key fails with HTTP 500
    pub fn failing(mut self, rating_key: &str) -> Self {
        self.failing.insert(rating_key.to_string());
        self
    }

    pub fn failing_library(mut self) -> Self {
        self.fail_library = true;
        self
    }

    pub fn failing_watchlist(mut self) -> Self {
        self.fail_watchlist = true;
        self
    }

    pub fn calls(&self) -> Vec<ServerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change server state
    pub fn writes(&self) -> Vec<ServerCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, ServerCall::FindByTmdb(_)))
            .collect()
    }

    fn log(&self, call: ServerCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failing(&self, item: &MediaItem) -> Result<(), SourceError> {
        if self.failing.contains(&item.rating_key) {
            return Err(SourceError::Status {
                service: "Plex",
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaServer for MockServer {
    fn server_name(&self) -> &str {
        "Mock"
    }

    async fn library_items(&self, _selector: &LibrarySelector) -> Result<Vec<MediaItem>, SourceError> {
        if self.fail_library {
            return Err(SourceError::new("library unavailable"));
        }
        Ok(self.items.clone())
    }

    async fn set_rating(&self, item: &MediaItem, rating: f64) -> Result<(), SourceError> {
        self.log(ServerCall::Rate(item.rating_key.clone(), rating));
        self.check_failing(item)
    }

    async fn mark_played(&self, item: &MediaItem) -> Result<(), SourceError> {
        self.log(ServerCall::Played(item.rating_key.clone()));
        self.check_failing(item)
    }

    async fn watchlist(&self) -> Result<Vec<WatchlistEntry>, SourceError> {
        if self.fail_watchlist {
            return Err(SourceError::new("watchlist unavailable"));
        }
        Ok(self.watchlist.clone())
    }

    async fn add_to_watchlist(&self, item: &MediaItem) -> Result<(), SourceError> {
        self.log(ServerCall::AddToWatchlist(item.guid.clone()));
        if self.rejected.contains(&item.guid) {
            return Err(SourceError::BadRequest {
                service: "Plex",
                message: "invalid item".to_string(),
            });
        }
        self.check_failing(item)
    }

    async fn remove_from_watchlist(&self, item: &MediaItem) -> Result<(), SourceError> {
        self.log(ServerCall::RemoveFromWatchlist(item.guid.clone()));
        self.check_failing(item)
    }

    async fn find_by_tmdb_id(&self, tmdb_id: TmdbId) -> Result<Option<MediaItem>, SourceError> {
        self.log(ServerCall::FindByTmdb(tmdb_id));
        Ok(self.discover.get(&tmdb_id).cloned())
    }
}

/// URLs not configured resolve to `Ok(None)` (a page without a movie ID)
#[derive(Default)]
pub struct MockLookup {
    ids: HashMap<String, TmdbId>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, tmdb_id: TmdbId) -> Self {
        self.ids.insert(url.to_string(), tmdb_id);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CanonicalIdLookup for MockLookup {
    async fn lookup_tmdb_id(&self, source_url: &str) -> Result<Option<TmdbId>, SourceError> {
        self.calls.lock().unwrap().push(source_url.to_string());
        if self.failing.contains(source_url) {
            return Err(SourceError::new("connection reset"));
        }
        Ok(self.ids.get(source_url).copied())
    }
}

/// How the mock Radarr answers `add_movie` for a TMDB ID
#[derive(Debug, Clone, Copy)]
pub enum AddResponse {
    Exists,
    NotFound,
    PathConflict,
    OtherValidation,
    Unparseable,
    ServerError,
}

#[derive(Default)]
pub struct MockRadarr {
    catalog: HashSet<TmdbId>,
    tags: Mutex<Vec<Tag>>,
    profiles: Vec<QualityProfile>,
    responses: HashMap<TmdbId, AddResponse>,
    fail_catalog: bool,
    fail_profiles: bool,
    added: Mutex<Vec<AddMovieRequest>>,
    created_tags: Mutex<Vec<String>>,
}

impl MockRadarr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(mut self, ids: &[u32]) -> Self {
        self.catalog = ids.iter().map(|id| TmdbId(*id)).collect();
        self
    }

    pub fn with_tags(self, tags: &[(u32, &str)]) -> Self {
        *self.tags.lock().unwrap() = tags
            .iter()
            .map(|(id, label)| Tag {
                id: *id,
                label: label.to_string(),
            })
            .collect();
        self
    }

    pub fn with_profiles(mut self, profiles: &[(u32, &str)]) -> Self {
        self.profiles = profiles
            .iter()
            .map(|(id, name)| QualityProfile {
                id: *id,
                name: name.to_string(),
            })
            .collect();
        self
    }

    pub fn responding(mut self, tmdb_id: u32, response: AddResponse) -> Self {
        self.responses.insert(TmdbId(tmdb_id), response);
        self
    }

    pub fn failing_catalog(mut self) -> Self {
        self.fail_catalog = true;
        self
    }

    pub fn failing_profiles(mut self) -> Self {
        self.fail_profiles = true;
        self
    }

    pub fn added(&self) -> Vec<AddMovieRequest> {
        self.added.lock().unwrap().clone()
    }

    pub fn added_ids(&self) -> Vec<u32> {
        self.added().iter().map(|r| r.tmdb_id.value()).collect()
    }

    pub fn created_tags(&self) -> Vec<String> {
        self.created_tags.lock().unwrap().clone()
    }
}

fn validation(code: Option<&str>, message: &str) -> AddMovieError {
    AddMovieError::Rejected(vec![ValidationFailure {
        property_name: Some("TmdbId".to_string()),
        error_message: message.to_string(),
        error_code: code.map(str::to_string),
    }])
}

#[async_trait]
impl AcquisitionService for MockRadarr {
    fn service_name(&self) -> &str {
        "Radarr"
    }

    async fn catalog_tmdb_ids(&self) -> Result<HashSet<TmdbId>, SourceError> {
        if self.fail_catalog {
            return Err(SourceError::new("radarr unreachable"));
        }
        Ok(self.catalog.clone())
    }

    async fn tags(&self) -> Result<Vec<Tag>, SourceError> {
        Ok(self.tags.lock().unwrap().clone())
    }

    async fn create_tag(&self, label: &str) -> Result<Tag, SourceError> {
        self.created_tags.lock().unwrap().push(label.to_string());
        let mut tags = self.tags.lock().unwrap();
        let tag = Tag {
            id: 100 + tags.len() as u32,
            label: label.to_string(),
        };
        tags.push(tag.clone());
        Ok(tag)
    }

    async fn quality_profiles(&self) -> Result<Vec<QualityProfile>, SourceError> {
        if self.fail_profiles {
            return Err(SourceError::new("profiles unavailable"));
        }
        Ok(self.profiles.clone())
    }

    async fn add_movie(&self, request: &AddMovieRequest) -> Result<(), AddMovieError> {
        self.added.lock().unwrap().push(request.clone());
        match self.responses.get(&request.tmdb_id) {
            None => Ok(()),
            Some(AddResponse::Exists) => Err(validation(Some("MovieExistsValidator"), "This movie has already been added")),
            Some(AddResponse::NotFound) => Err(validation(None, "A movie with this ID was not found.")),
            Some(AddResponse::PathConflict) => Err(validation(Some("MoviePathValidator"), "Path is already configured")),
            Some(AddResponse::OtherValidation) => Err(validation(Some("SomethingElse"), "Root folder missing")),
            Some(AddResponse::Unparseable) => Err(AddMovieError::UnparseableRejection {
                body: "<html/>".to_string(),
            }),
            Some(AddResponse::ServerError) => Err(AddMovieError::Status {
                status: 500,
                body: "oops".to_string(),
            }),
        }
    }
}
