use crate::error::SourceError;
use crate::traits::CanonicalIdLookup;
use async_trait::async_trait;
use media_sync_models::TmdbId;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "Letterboxd";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

static TMDB_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-tmdb-id="(\d+)""#).expect("valid tmdb id regex"));
static TMDB_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-tmdb-type="([a-z]+)""#).expect("valid tmdb type regex"));

/// Pull the TMDB movie ID out of a Letterboxd film page
///
/// Pages for TV entries carry `data-tmdb-type="tv"`; those yield `None`.
pub fn extract_tmdb_id(html: &str) -> Option<TmdbId> {
    if let Some(kind) = TMDB_TYPE_RE.captures(html).and_then(|c| c.get(1)) {
        if kind.as_str() != "movie" {
            return None;
        }
    }
    TMDB_ID_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .and_then(|id| id.as_str().parse().ok())
        .map(TmdbId)
}

/// Resolves film URLs (including `boxd.it` short links) by reading the film page
pub struct LetterboxdClient {
    client: Client,
}

impl LetterboxdClient {
    pub fn new() -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CanonicalIdLookup for LetterboxdClient {
    async fn lookup_tmdb_id(&self, source_url: &str) -> Result<Option<TmdbId>, SourceError> {
        let response = self.client.get(source_url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::from_response(SERVICE, response).await);
        }

        let final_url = response.url().to_string();
        let html = response.text().await?;
        let id = extract_tmdb_id(&html);
        debug!("Letterboxd: {} ({}) -> {:?}", source_url, final_url, id);
        Ok(id)
    }
}
