//! Builds the external collaborators a sync run talks to from configuration

use crate::letterboxd::LetterboxdClient;
use crate::plex::{auth, PlexHttpClient, PlexMediaServer};
use crate::radarr::RadarrHttpClient;
use crate::traits::{AcquisitionService, CanonicalIdLookup, MediaServer};
use anyhow::{anyhow, Result};
use media_sync_config::{Config, CredentialStore};
use std::sync::Arc;
use tracing::info;

pub struct Collaborators {
    pub media_server: Arc<dyn MediaServer>,
    /// Absent when Letterboxd lookups are disabled
    pub id_lookup: Option<Arc<dyn CanonicalIdLookup>>,
    /// Absent unless watchlist forwarding to Radarr is enabled
    pub acquisition: Option<Arc<dyn AcquisitionService>>,
}

pub async fn create_media_server(config: &Config, credentials: &CredentialStore) -> Result<Arc<dyn MediaServer>> {
    let token = credentials
        .get_plex_token()
        .ok_or_else(|| anyhow!("Plex token not found. Set PLEX_TOKEN or run 'letterplex config plex' first"))?
        .clone();
    if config.plex.server_url.is_empty() {
        return Err(anyhow!("Plex server URL not configured. Set PLEX_BASEURL or run 'letterplex config plex'"));
    }

    let mut client = PlexHttpClient::new(&config.plex.server_url, token)?;
    if let Some(user) = config.plex.user.as_deref().filter(|u| !u.is_empty()) {
        let pin = credentials.get_plex_pin().map(String::as_str);
        client = auth::switch_to_home_user(client, user, pin).await?;
    }

    info!("Plex server: {}", config.plex.server_url);
    Ok(Arc::new(PlexMediaServer::new(client)))
}

pub fn create_acquisition_service(
    config: &Config,
    credentials: &CredentialStore,
) -> Result<Option<Arc<dyn AcquisitionService>>> {
    if !config.sync.sync_watchlist_to_radarr {
        return Ok(None);
    }
    let url = config
        .radarr
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| anyhow!("Radarr URL not configured. Set RADARR_URL or run 'letterplex config radarr'"))?;
    let api_key = credentials
        .get_radarr_token()
        .ok_or_else(|| anyhow!("Radarr API key not found. Set RADARR_TOKEN or run 'letterplex config radarr'"))?
        .clone();

    Ok(Some(Arc::new(RadarrHttpClient::new(url, api_key)?)))
}

pub async fn create_collaborators(config: &Config, credentials: &CredentialStore) -> Result<Collaborators> {
    let media_server = create_media_server(config, credentials).await?;
    let id_lookup: Option<Arc<dyn CanonicalIdLookup>> = if config.sync.map_letterboxd_to_tmdb {
        Some(Arc::new(LetterboxdClient::new()?))
    } else {
        None
    };
    let acquisition = create_acquisition_service(config, credentials)?;

    Ok(Collaborators {
        media_server,
        id_lookup,
        acquisition,
    })
}
