use crate::error::{AddMovieError, SourceError};
use crate::traits::AcquisitionService;
use async_trait::async_trait;
use media_sync_models::{AddMovieRequest, CatalogMovie, QualityProfile, Tag, TmdbId, ValidationFailure};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "Radarr";

/// Radarr v3 REST client authenticated with `X-Api-Key`
pub struct RadarrHttpClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RadarrHttpClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v3/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let response = self
            .client
            .get(self.url(path))
            .header("X-Api-Key", &self.api_key)
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
}

/// Map a 400 body onto `AddMovieError`
pub(crate) fn rejection_from_body(body: String) -> AddMovieError {
    match serde_json::from_str::<Vec<ValidationFailure>>(&body) {
        Ok(failures) if !failures.is_empty() => AddMovieError::Rejected(failures),
        _ => AddMovieError::UnparseableRejection { body },
    }
}

#[async_trait]
impl AcquisitionService for RadarrHttpClient {
    fn service_name(&self) -> &str {
        SERVICE
    }

    async fn catalog_tmdb_ids(&self) -> Result<HashSet<TmdbId>, SourceError> {
        let movies: Vec<CatalogMovie> = self.get_json("movie").await?;
        let ids: HashSet<TmdbId> = movies
            .into_iter()
            .filter_map(|m| m.tmdb_id.filter(|id| id.value() > 0))
            .collect();
        debug!("Radarr: {} movies in catalog", ids.len());
        Ok(ids)
    }

    async fn tags(&self) -> Result<Vec<Tag>, SourceError> {
        self.get_json("tag").await
    }

    async fn create_tag(&self, label: &str) -> Result<Tag, SourceError> {
        let response = self
            .client
            .post(self.url("tag"))
            .header("X-Api-Key", &self.api_key)
            .json(&serde_json::json!({ "label": label }))
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

    async fn quality_profiles(&self) -> Result<Vec<QualityProfile>, SourceError> {
        self.get_json("qualityprofile").await
    }

    async fn add_movie(&self, request: &AddMovieRequest) -> Result<(), AddMovieError> {
        let response = self
            .client
            .post(self.url("movie"))
            .header("X-Api-Key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::BAD_REQUEST {
            Err(rejection_from_body(body))
        } else {
            Err(AddMovieError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
