use crate::error::SourceError;
use crate::plex::api::{LibraryInfo, PlexHttpClient};
use crate::traits::MediaServer;
use async_trait::async_trait;
use media_sync_models::{LibrarySelector, MediaItem, TmdbId, WatchlistEntry};
use tracing::{debug, info};

/// The Plex server as a `MediaServer`
pub struct PlexMediaServer {
    api: PlexHttpClient,
}

impl PlexMediaServer {
    pub fn new(api: PlexHttpClient) -> Self {
        Self { api }
    }
}

/// Pick the sections a selector refers to out of everything the server reports
pub fn select_libraries(
    libraries: &[LibraryInfo],
    selector: &LibrarySelector,
) -> Result<Vec<LibraryInfo>, SourceError> {
    let movie_libraries = libraries.iter().filter(|lib| lib.type_ == "movie");

    let selected: Vec<LibraryInfo> = match selector {
        LibrarySelector::Named(name) => libraries
            .iter()
            .filter(|lib| lib.title == *name)
            .take(1)
            .cloned()
            .collect(),
        LibrarySelector::FirstMovieLibrary => movie_libraries.take(1).cloned().collect(),
        LibrarySelector::AllMovieLibraries => movie_libraries.cloned().collect(),
    };

    if selected.is_empty() {
        let message = match selector {
            LibrarySelector::Named(name) => format!("Plex library '{}' not found", name),
            _ => "Plex server has no movie library".to_string(),
        };
        return Err(SourceError::NotFound(message));
    }
    Ok(selected)
}

/// Watchlist actions address items by the last segment of their plex:// guid
fn discover_key(item: &MediaItem) -> Result<&str, SourceError> {
    item.discover_key().ok_or_else(|| SourceError::BadRequest {
        service: "Plex",
        message: format!("'{}' has no plex:// guid", item.title),
    })
}

#[async_trait]
impl MediaServer for PlexMediaServer {
    fn server_name(&self) -> &str {
        "Plex"
    }

    async fn library_items(&self, selector: &LibrarySelector) -> Result<Vec<MediaItem>, SourceError> {
        let libraries = self.api.get_libraries().await?;
        let selected = select_libraries(&libraries, selector)?;

        let mut items = Vec::new();
        for library in selected {
            let movies = self.api.get_movies(&library.key).await?;
            info!("Plex: Loaded {} movies from library '{}'", movies.len(), library.title);
            items.extend(movies);
        }
        Ok(items)
    }

    async fn set_rating(&self, item: &MediaItem, rating: f64) -> Result<(), SourceError> {
        debug!("Plex: rating '{}' ({}) {}", item.title, item.rating_key, rating);
        self.api.set_rating(&item.rating_key, rating).await
    }

    async fn mark_played(&self, item: &MediaItem) -> Result<(), SourceError> {
        debug!("Plex: marking '{}' ({}) played", item.title, item.rating_key);
        self.api.mark_watched(&item.rating_key).await
    }

    async fn watchlist(&self) -> Result<Vec<WatchlistEntry>, SourceError> {
        self.api.get_watchlist().await
    }

    async fn add_to_watchlist(&self, item: &MediaItem) -> Result<(), SourceError> {
        let key = discover_key(item)?;
        self.api.add_to_watchlist(key).await
    }

    async fn remove_from_watchlist(&self, item: &MediaItem) -> Result<(), SourceError> {
        let key = discover_key(item)?;
        self.api.remove_from_watchlist(key).await
    }

    async fn find_by_tmdb_id(&self, tmdb_id: TmdbId) -> Result<Option<MediaItem>, SourceError> {
        self.api.match_tmdb_id(tmdb_id).await
    }
}
