use serde::{Deserialize, Serialize};
use std::fmt;

/// Which Letterboxd export a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportKind {
    Ratings,
    Watched,
    Watchlist,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Ratings => "ratings",
            ExportKind::Watched => "watched",
            ExportKind::Watchlist => "watchlist",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One data row of a Letterboxd CSV export
///
/// The title is for humans only; `source_url` is the identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub title: String,
    pub year: Option<u32>,
    pub source_url: String,
    /// Raw star score, ratings export only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
}

impl ExportRow {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
            source_url: source_url.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: impl Into<String>) -> Self {
        self.score = Some(score.into());
        self
    }
}
