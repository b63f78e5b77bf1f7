use media_sync_models::{MediaItem, TmdbId, WatchlistEntry};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use crate::error::SourceError;

const DISCOVER_BASE_URL: &str = "https://discover.provider.plex.tv";
const METADATA_BASE_URL: &str = "https://metadata.provider.plex.tv";
const PLEX_TV_BASE_URL: &str = "https://plex.tv";
const CLIENT_IDENTIFIER: &str = "letterplex";
const WATCHLIST_PAGE_SIZE: usize = 100;
const SERVICE: &str = "Plex";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryInfo {
    pub key: String,
    pub type_: String,
    pub title: String,
}

/// Thin HTTP client over the Plex server, discover provider and plex.tv APIs
///
/// `account_token` authenticates against plex.tv and the discover/metadata
/// providers; `server_token` against the media server itself. They differ
/// when acting as a Plex Home user.
pub struct PlexHttpClient {
    client: Client,
    server_url: String,
    account_token: String,
    server_token: String,
    discover_base_url: String,
    metadata_base_url: String,
}

impl PlexHttpClient {
    pub fn new(server_url: &str, token: String) -> Result<Self, SourceError> {
        let client = Client::builder()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                headers.insert(
                    reqwest::header::HeaderName::from_static("x-plex-client-identifier"),
                    reqwest::header::HeaderValue::from_static(CLIENT_IDENTIFIER),
                );
                headers.insert(
                    reqwest::header::HeaderName::from_static("x-plex-product"),
                    reqwest::header::HeaderValue::from_static(CLIENT_IDENTIFIER),
                );
                headers
            })
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            account_token: token.clone(),
            server_token: token,
            discover_base_url: DISCOVER_BASE_URL.to_string(),
            metadata_base_url: METADATA_BASE_URL.to_string(),
        })
    }

    /// Act as another user: plex.tv calls use `account_token`, server calls `server_token`
    pub fn with_user_tokens(mut self, account_token: String, server_token: String) -> Self {
        self.account_token = account_token;
        self.server_token = server_token;
        self
    }

    async fn get_json(&self, url: &str, token: &str) -> Result<Value, SourceError> {
        let response = self
            .client
            .get(url)
            .header("X-Plex-Token", token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::from_response(SERVICE, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::parse(SERVICE, e.to_string()))
    }

    async fn send_empty(&self, request: reqwest::RequestBuilder, token: &str) -> Result<(), SourceError> {
        let response = request.header("X-Plex-Token", token).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SourceError::from_response(SERVICE, response).await)
        }
    }

    pub async fn server_identity(&self) -> Result<String, SourceError> {
        let url = format!("{}/identity", self.server_url);
        let json = self.get_json(&url, &self.server_token).await?;
        json.get("MediaContainer")
            .and_then(|mc| mc.get("machineIdentifier"))
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| SourceError::parse(SERVICE, "identity response has no machineIdentifier"))
    }

    pub async fn get_libraries(&self) -> Result<Vec<LibraryInfo>, SourceError> {
        let url = format!("{}/library/sections", self.server_url);
        let json = self.get_json(&url, &self.server_token).await?;
        Ok(parse_libraries(&json))
    }

    pub async fn get_movies(&self, library_key: &str) -> Result<Vec<MediaItem>, SourceError> {
        let url = format!(
            "{}/library/sections/{}/all?type=1&includeGuids=1",
            self.server_url, library_key
        );
        let json = self.get_json(&url, &self.server_token).await?;

        let items = metadata_array(&json);
        let mut movies = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for item in items {
            match parse_media_item(item) {
                Some(movie) => movies.push(movie),
                None => {
                    skipped += 1;
                    let title = item.get("title").and_then(|t| t.as_str()).unwrap_or("unknown");
                    debug!("Plex get_movies: Skipped '{}' - missing ratingKey or title", title);
                }
            }
        }
        if skipped > 0 {
            debug!("Plex get_movies: Skipped {} items that couldn't be parsed", skipped);
        }

        Ok(movies)
    }

    pub async fn set_rating(&self, rating_key: &str, rating: f64) -> Result<(), SourceError> {
        let url = format!(
            "{}/:/rate?identifier=com.plexapp.plugins.library&key={}&rating={}",
            self.server_url, rating_key, rating
        );
        self.send_empty(self.client.put(&url), &self.server_token).await
    }

    pub async fn mark_watched(&self, rating_key: &str) -> Result<(), SourceError> {
        let url = format!(
            "{}/:/scrobble?identifier=com.plexapp.plugins.library&key={}",
            self.server_url, rating_key
        );
        self.send_empty(self.client.get(&url), &self.server_token).await
    }

    /// Full watchlist, following `X-Plex-Container-Start` paging
    pub async fn get_watchlist(&self) -> Result<Vec<WatchlistEntry>, SourceError> {
        let mut watchlist = Vec::new();
        let mut start = 0;

        loop {
            let url = format!(
                "{}/library/sections/watchlist/all?X-Plex-Container-Start={}&X-Plex-Container-Size={}",
                self.discover_base_url, start, WATCHLIST_PAGE_SIZE
            );
            let json = self.get_json(&url, &self.account_token).await?;
            watchlist.extend(parse_watchlist(&json));

            let (fetched, total) = page_extent(&json);
            start += fetched;
            if watchlist_done(start, fetched, total) {
                break;
            }
        }

        debug!("Plex watchlist: Returning {} items", watchlist.len());
        Ok(watchlist)
    }

    pub async fn add_to_watchlist(&self, discover_key: &str) -> Result<(), SourceError> {
        let url = format!(
            "{}/actions/addToWatchlist?ratingKey={}",
            self.discover_base_url, discover_key
        );
        self.send_empty(self.client.put(&url), &self.account_token).await
    }

    pub async fn remove_from_watchlist(&self, discover_key: &str) -> Result<(), SourceError> {
        let url = format!(
            "{}/actions/removeFromWatchlist?ratingKey={}",
            self.discover_base_url, discover_key
        );
        self.send_empty(self.client.put(&url), &self.account_token).await
    }

    /// Ask the metadata provider for the universal item matching a TMDB ID
    pub async fn match_tmdb_id(&self, tmdb_id: TmdbId) -> Result<Option<MediaItem>, SourceError> {
        let guid = tmdb_id.guid();
        let url = format!(
            "{}/library/metadata/matches?type=1&guid={}",
            self.metadata_base_url,
            urlencoding::encode(&guid)
        );
        debug!("Querying Plex for GUID {}", guid);

        match self.get_json(&url, &self.account_token).await {
            Ok(json) => Ok(metadata_array(&json).first().and_then(parse_media_item)),
            Err(SourceError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Home users of the account, as (id, title) pairs
    pub async fn home_users(&self) -> Result<Vec<(String, String)>, SourceError> {
        let url = format!("{}/api/home/users", PLEX_TV_BASE_URL);
        let json = self.get_json(&url, &self.account_token).await?;
        Ok(parse_home_users(&json))
    }

    /// Switch to a Plex Home user, returning that user's account token
    pub async fn switch_home_user(&self, user_id: &str, pin: Option<&str>) -> Result<String, SourceError> {
        let mut url = format!("{}/api/home/users/{}/switch", PLEX_TV_BASE_URL, user_id);
        if let Some(pin) = pin {
            url.push_str(&format!("?pin={}", urlencoding::encode(pin)));
        }
        let response = self
            .client
            .post(&url)
            .header("X-Plex-Token", &self.account_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SourceError::from_response(SERVICE, response).await);
        }
        let json: Value = response
            .json()
            .await
            .map_err(|e| SourceError::parse(SERVICE, e.to_string()))?;

        json.get("authToken")
            .or_else(|| json.get("authenticationToken"))
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| SourceError::parse(SERVICE, "switch response has no auth token"))
    }

    /// Access token for the server with `machine_id`, as seen by `user_token`
    pub async fn server_access_token(&self, user_token: &str, machine_id: &str) -> Result<String, SourceError> {
        let url = format!("{}/api/v2/resources?includeHttps=1", PLEX_TV_BASE_URL);
        let json = self.get_json(&url, user_token).await?;

        let token = json.as_array().and_then(|resources| {
            resources.iter().find_map(|resource| {
                let id = resource.get("clientIdentifier").and_then(|i| i.as_str())?;
                if id != machine_id {
                    return None;
                }
                resource.get("accessToken").and_then(|t| t.as_str()).map(str::to_string)
            })
        });

        match token {
            Some(token) => {
                info!("Plex: obtained server access token for switched user");
                Ok(token)
            }
            None => Err(SourceError::NotFound(format!(
                "server {} is not shared with this Plex user",
                machine_id
            ))),
        }
    }
}

fn metadata_array(json: &Value) -> &[Value] {
    json.get("MediaContainer")
        .and_then(|mc| mc.get("Metadata"))
        .and_then(|m| m.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Entries returned on a page (parseable or not) and the reported total
fn page_extent(json: &Value) -> (usize, Option<usize>) {
    let total = json
        .get("MediaContainer")
        .and_then(|mc| mc.get("totalSize"))
        .and_then(|t| t.as_u64())
        .map(|t| t as usize);
    (metadata_array(json).len(), total)
}

fn watchlist_done(next_start: usize, fetched: usize, total: Option<usize>) -> bool {
    if fetched == 0 {
        return true;
    }
    match total {
        Some(total) => next_start >= total,
        None => fetched < WATCHLIST_PAGE_SIZE,
    }
}

pub(crate) fn parse_libraries(json: &Value) -> Vec<LibraryInfo> {
    let directories = json
        .get("MediaContainer")
        .and_then(|mc| mc.get("Directory"))
        .and_then(|d| d.as_array());

    directories
        .map(|dirs| {
            dirs.iter()
                .map(|dir| {
                    let field = |name: &str| {
                        dir.get(name)
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string()
                    };
                    LibraryInfo {
                        key: field("key"),
                        type_: field("type"),
                        title: field("title"),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_guid_array(guid_value: Option<&Value>) -> Vec<String> {
    match guid_value {
        Some(Value::Array(guids)) => guids
            .iter()
            .filter_map(|g| {
                g.get("id")
                    .and_then(|id| id.as_str())
                    .or_else(|| g.as_str())
                    .map(str::to_string)
            })
            .collect(),
        Some(Value::Object(obj)) => obj
            .get("id")
            .and_then(|id| id.as_str())
            .map(|id| vec![id.to_string()])
            .unwrap_or_default(),
        Some(Value::String(id)) => vec![id.clone()],
        _ => Vec::new(),
    }
}

/// Plex sends some numeric fields as strings depending on the endpoint
fn as_u64_lenient(value: Option<&Value>) -> Option<u64> {
    value.and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
}

pub(crate) fn parse_media_item(item: &Value) -> Option<MediaItem> {
    let rating_key = item
        .get("ratingKey")
        .and_then(|k| k.as_str().map(str::to_string).or_else(|| k.as_u64().map(|n| n.to_string())))?;
    let title = item.get("title")?.as_str()?.to_string();
    let guid = item
        .get("guid")
        .and_then(|g| g.as_str())
        .unwrap_or("")
        .to_string();
    let user_rating = item.get("userRating").and_then(|r| r.as_f64());

    Some(MediaItem {
        rating_key,
        guid,
        title,
        year: as_u64_lenient(item.get("year")).map(|y| y as u32),
        external_guids: parse_guid_array(item.get("Guid")),
        user_rating,
        view_count: as_u64_lenient(item.get("viewCount")).unwrap_or(0) as u32,
    })
}

pub(crate) fn parse_watchlist(json: &Value) -> Vec<WatchlistEntry> {
    metadata_array(json)
        .iter()
        .filter_map(|item| {
            let guid = item.get("guid").and_then(|g| g.as_str())?.to_string();
            Some(WatchlistEntry {
                guid,
                rating_key: item
                    .get("ratingKey")
                    .and_then(|k| k.as_str())
                    .unwrap_or("")
                    .to_string(),
                title: item
                    .get("title")
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string(),
            })
        })
        .collect()
}

pub(crate) fn parse_home_users(json: &Value) -> Vec<(String, String)> {
    let users = json
        .get("users")
        .or_else(|| json.get("MediaContainer").and_then(|mc| mc.get("User")))
        .and_then(|u| u.as_array());

    users
        .map(|users| {
            users
                .iter()
                .filter_map(|user| {
                    let id = user
                        .get("id")
                        .and_then(|id| id.as_u64().map(|n| n.to_string()).or_else(|| id.as_str().map(str::to_string)))?;
                    let title = user
                        .get("title")
                        .or_else(|| user.get("username"))
                        .and_then(|t| t.as_str())
                        .unwrap_or("")
                        .to_string();
                    Some((id, title))
                })
                .collect()
        })
        .unwrap_or_default()
}
