use media_sync_models::LibrarySelector;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use crate::credentials::CredentialStore;
use crate::paths::PathManager;

/// Hard configuration failures. Any of these stops the run before a pass starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PLEX_BASEURL and PLEX_TOKEN are required: {0} is not set")]
    MissingPlex(&'static str),
    #[error("Radarr URL and token are required for syncing the watchlist to Radarr: {0} is not set")]
    MissingRadarr(&'static str),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("resolve_concurrency must be at least 1")]
    InvalidConcurrency,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub plex: PlexConfig,
    #[serde(default)]
    pub radarr: RadarrConfig,
    #[serde(default)]
    pub sync: SyncOptions,
    #[serde(default)]
    pub paths: ExportPaths,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct PlexConfig {
    #[serde(default)]
    pub server_url: String,
    /// Library section title; None means the first movie library
    #[serde(default)]
    pub library: Option<String>,
    /// Scan every movie library instead of only the first one
    #[serde(default)]
    pub all_movie_libraries: bool,
    /// Plex Home user to act as (PIN comes from the credential store)
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RadarrConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_root_folder")]
    pub root_folder: String,
    #[serde(default)]
    pub quality_profile: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub monitored: bool,
    #[serde(default = "default_true")]
    pub search_on_add: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncOptions {
    #[serde(default = "default_true")]
    pub sync_ratings: bool,
    #[serde(default = "default_true")]
    pub sync_watched: bool,
    #[serde(default = "default_true")]
    pub sync_watchlist: bool,
    #[serde(default)]
    pub sync_watchlist_to_radarr: bool,
    /// Resolve unknown Letterboxd URLs over the network; false uses the mapping store only
    #[serde(default = "default_true")]
    pub map_letterboxd_to_tmdb: bool,
    /// Watchlist titles missing from the library are looked up on Plex's metadata provider
    #[serde(default)]
    pub watchlist_discover_fallback: bool,
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExportPaths {
    #[serde(default = "default_ratings_csv")]
    pub ratings_csv: PathBuf,
    #[serde(default = "default_watchlist_csv")]
    pub watchlist_csv: PathBuf,
    #[serde(default = "default_watched_csv")]
    pub watched_csv: PathBuf,
    /// Mapping store override; None uses the data directory
    #[serde(default)]
    pub mapping_csv: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_root_folder() -> String {
    "/movies".to_string()
}

fn default_resolve_concurrency() -> usize {
    1
}

fn default_ratings_csv() -> PathBuf {
    PathBuf::from("/tmp/static/ratings.csv")
}

fn default_watchlist_csv() -> PathBuf {
    PathBuf::from("/tmp/static/watchlist.csv")
}

fn default_watched_csv() -> PathBuf {
    PathBuf::from("/tmp/static/watched.csv")
}

impl Default for RadarrConfig {
    fn default() -> Self {
        Self {
            url: None,
            root_folder: default_root_folder(),
            quality_profile: None,
            tags: Vec::new(),
            monitored: true,
            search_on_add: true,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            sync_ratings: true,
            sync_watched: true,
            sync_watchlist: true,
            sync_watchlist_to_radarr: false,
            map_letterboxd_to_tmdb: true,
            watchlist_discover_fallback: false,
            resolve_concurrency: default_resolve_concurrency(),
        }
    }
}

impl Default for ExportPaths {
    fn default() -> Self {
        Self {
            ratings_csv: default_ratings_csv(),
            watchlist_csv: default_watchlist_csv(),
            watched_csv: default_watched_csv(),
            mapping_csv: None,
        }
    }
}

/// `true`, `1`, `yes` and `on` are true; everything else is false
pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Split a comma-separated tag list, dropping blanks
pub fn parse_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config.toml if it exists, defaults otherwise
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides on top of the file values
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("PLEX_BASEURL") {
            self.plex.server_url = url;
        }
        if let Some(library) = get("PLEX_LIBRARY_NAME") {
            self.plex.library = Some(library);
        }
        if let Some(all) = get("PLEX_ALL_MOVIE_LIBRARIES") {
            self.plex.all_movie_libraries = parse_bool(&all);
        }
        if let Some(user) = get("PLEX_USER") {
            self.plex.user = Some(user);
        }

        for (key, flag) in [
            ("SYNC_RATINGS", &mut self.sync.sync_ratings),
            ("SYNC_WATCHED", &mut self.sync.sync_watched),
            ("SYNC_WATCHLIST", &mut self.sync.sync_watchlist),
            ("SYNC_WATCHLIST_TO_RADARR", &mut self.sync.sync_watchlist_to_radarr),
            ("MAP_LETTERBOXD_TO_TMDB", &mut self.sync.map_letterboxd_to_tmdb),
            ("WATCHLIST_DISCOVER_FALLBACK", &mut self.sync.watchlist_discover_fallback),
        ] {
            if let Some(value) = get(key) {
                *flag = parse_bool(&value);
            }
        }
        if let Some(value) = get("RESOLVE_CONCURRENCY") {
            self.sync.resolve_concurrency = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "RESOLVE_CONCURRENCY".to_string(),
                value: value.clone(),
            })?;
        }

        if let Some(url) = get("RADARR_URL") {
            self.radarr.url = Some(url);
        }
        if let Some(root) = get("RADARR_ROOT_FOLDER") {
            self.radarr.root_folder = root;
        }
        if let Some(profile) = get("RADARR_QUALITY_PROFILE") {
            self.radarr.quality_profile = Some(profile);
        }
        if let Some(tags) = get("RADARR_TAGS") {
            self.radarr.tags = parse_tags(&tags);
        }
        if let Some(monitored) = get("RADARR_MONITORED") {
            self.radarr.monitored = parse_bool(&monitored);
        }
        if let Some(search) = get("RADARR_SEARCH") {
            self.radarr.search_on_add = parse_bool(&search);
        }

        if let Some(path) = get("LETTERBOXD_RATINGS_CSV") {
            self.paths.ratings_csv = PathBuf::from(path);
        }
        if let Some(path) = get("LETTERBOXD_WATCHLIST_CSV") {
            self.paths.watchlist_csv = PathBuf::from(path);
        }
        if let Some(path) = get("LETTERBOXD_WATCHED_CSV") {
            self.paths.watched_csv = PathBuf::from(path);
        }
        if let Some(path) = get("LB_TMDB_MAP_CSV_PATH_OVERRIDE") {
            self.paths.mapping_csv = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Check everything a run needs. Called before any sync pass.
    pub fn validate(&self, credentials: &CredentialStore) -> Result<(), ConfigError> {
        if self.plex.server_url.trim().is_empty() {
            return Err(ConfigError::MissingPlex("PLEX_BASEURL"));
        }
        if credentials.get_plex_token().map_or(true, |t| t.is_empty()) {
            return Err(ConfigError::MissingPlex("PLEX_TOKEN"));
        }

        if self.sync.sync_watchlist_to_radarr {
            if self.radarr.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                return Err(ConfigError::MissingRadarr("RADARR_URL"));
            }
            if credentials.get_radarr_token().map_or(true, |t| t.is_empty()) {
                return Err(ConfigError::MissingRadarr("RADARR_TOKEN"));
            }
        }

        if self.sync.resolve_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        Ok(())
    }

    pub fn library_selector(&self) -> LibrarySelector {
        match &self.plex.library {
            Some(name) => LibrarySelector::Named(name.clone()),
            None if self.plex.all_movie_libraries => LibrarySelector::AllMovieLibraries,
            None => LibrarySelector::FirstMovieLibrary,
        }
    }

    pub fn mapping_path(&self, paths: &PathManager) -> PathBuf {
        self.paths
            .mapping_csv
            .clone()
            .unwrap_or_else(|| paths.mapping_file())
    }
}
