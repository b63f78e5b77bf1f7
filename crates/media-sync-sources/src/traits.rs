use async_trait::async_trait;
use media_sync_models::{AddMovieRequest, LibrarySelector, MediaItem, QualityProfile, Tag, TmdbId, WatchlistEntry};
use std::collections::HashSet;
use crate::error::{AddMovieError, SourceError};

/// The personal media server whose state is brought in line with the exports
#[async_trait]
pub trait MediaServer: Send + Sync {
    fn server_name(&self) -> &str;

    /// Every movie in the selected library section(s)
    async fn library_items(&self, selector: &LibrarySelector) -> Result<Vec<MediaItem>, SourceError>;

    /// Set the user rating, 0-10 scale
    async fn set_rating(&self, item: &MediaItem, rating: f64) -> Result<(), SourceError>;
    async fn mark_played(&self, item: &MediaItem) -> Result<(), SourceError>;

    async fn watchlist(&self) -> Result<Vec<WatchlistEntry>, SourceError>;
    /// Returns `SourceError::BadRequest` when the server refuses the item
    async fn add_to_watchlist(&self, item: &MediaItem) -> Result<(), SourceError>;
    async fn remove_from_watchlist(&self, item: &MediaItem) -> Result<(), SourceError>;

    /// Look a movie up in the server's global metadata catalog (not the local library)
    async fn find_by_tmdb_id(&self, tmdb_id: TmdbId) -> Result<Option<MediaItem>, SourceError>;
}

/// Resolves a Letterboxd film URL to its TMDB ID
#[async_trait]
pub trait CanonicalIdLookup: Send + Sync {
    /// `Ok(None)` means the page was read but carries no TMDB movie ID
    async fn lookup_tmdb_id(&self, source_url: &str) -> Result<Option<TmdbId>, SourceError>;
}

/// The service that can be asked to obtain movies that are not on the server yet
#[async_trait]
pub trait AcquisitionService: Send + Sync {
    fn service_name(&self) -> &str;

    async fn catalog_tmdb_ids(&self) -> Result<HashSet<TmdbId>, SourceError>;
    async fn tags(&self) -> Result<Vec<Tag>, SourceError>;
    async fn create_tag(&self, label: &str) -> Result<Tag, SourceError>;
    async fn quality_profiles(&self) -> Result<Vec<QualityProfile>, SourceError>;
    async fn add_movie(&self, request: &AddMovieRequest) -> Result<(), AddMovieError>;
}
