use serde::{Deserialize, Serialize};

/// An item on the user's Plex watchlist (discover provider)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistEntry {
    pub guid: String,
    pub rating_key: String,
    pub title: String,
}
