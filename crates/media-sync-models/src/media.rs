use serde::{Deserialize, Serialize};
use crate::media_ids::TmdbId;

/// A movie in a Plex library
///
/// `guid` is the native identifier (`plex://movie/<hex>`), shared by every server
/// that has the same movie and used for watchlist membership. `rating_key` is the
/// server-local key used for rating and scrobbling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    pub rating_key: String,
    pub guid: String,
    pub title: String,
    pub year: Option<u32>,
    /// External GUIDs reported by Plex (`tmdb://603`, `imdb://tt0133093`, ...)
    #[serde(default)]
    pub external_guids: Vec<String>,
    /// 0-10 scale; None or 0.0 means unrated
    pub user_rating: Option<f64>,
    #[serde(default)]
    pub view_count: u32,
}

impl MediaItem {
    /// Current rating on the 0-10 scale, 0.0 when unset
    pub fn current_rating(&self) -> f64 {
        self.user_rating.unwrap_or(0.0)
    }

    pub fn is_played(&self) -> bool {
        self.view_count > 0
    }

    /// TMDB ID from the external GUIDs, if Plex matched one
    pub fn tmdb_id(&self) -> Option<TmdbId> {
        self.external_guids.iter().find_map(|guid| TmdbId::from_guid(guid))
    }

    /// Every identifier this item can be found by: native GUID first, then external GUIDs
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.guid.as_str())
            .filter(|guid| !guid.is_empty())
            .chain(self.external_guids.iter().map(String::as_str))
    }

    /// The key Plex's discover provider uses for this item (last segment of the native GUID)
    pub fn discover_key(&self) -> Option<&str> {
        self.guid
            .strip_prefix("plex://")
            .and_then(|rest| rest.rsplit('/').next())
            .filter(|key| !key.is_empty())
    }
}

/// Which library sections to scan when building the media index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySelector {
    /// A section with this exact title
    Named(String),
    /// The first movie-typed section the server reports
    FirstMovieLibrary,
    /// Every movie-typed section
    AllMovieLibraries,
}
