use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TMDB movie identifier
///
/// This is the canonical ID bridging Letterboxd URLs and Plex library items.
/// Plex exposes it as an external GUID of the form `tmdb://603`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TmdbId(pub u32);

impl TmdbId {
    pub const GUID_SCHEME: &'static str = "tmdb://";

    /// Plex GUID form of this ID (e.g. `tmdb://603`)
    pub fn guid(&self) -> String {
        format!("{}{}", Self::GUID_SCHEME, self.0)
    }

    /// Parse a Plex external GUID, returning None for any other scheme
    pub fn from_guid(guid: &str) -> Option<Self> {
        guid.strip_prefix(Self::GUID_SCHEME)
            .and_then(|id| id.trim().parse().ok())
            .map(TmdbId)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TmdbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TmdbId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TmdbId)
    }
}

impl From<u32> for TmdbId {
    fn from(id: u32) -> Self {
        TmdbId(id)
    }
}

/// One line of the mapping store: a Letterboxd URL and the TMDB ID it resolved to
///
/// Field order matches the on-disk column order (`sourceUrl,tmdbId`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMapping {
    pub source_url: String,
    pub tmdb_id: TmdbId,
}

impl IdentityMapping {
    pub fn new(source_url: impl Into<String>, tmdb_id: TmdbId) -> Self {
        Self {
            source_url: source_url.into(),
            tmdb_id,
        }
    }
}
