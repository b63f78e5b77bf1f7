use anyhow::Result;
use media_sync_config::RadarrConfig;
use media_sync_models::{AddMovieRequest, AddOptions, ExportRow, RejectionReason, TmdbId};
use media_sync_sources::{AcquisitionService, AddMovieError};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};
use crate::id_resolver::IdResolver;
use crate::media_index::MediaIndex;
use crate::progress::{PassReport, PassTracker};

const FALLBACK_QUALITY_PROFILE_ID: u32 = 1;

/// How new movies are created in Radarr
#[derive(Debug, Clone)]
pub struct AcquisitionSettings {
    pub root_folder: String,
    pub quality_profile: Option<String>,
    pub tags: Vec<String>,
    pub monitored: bool,
    pub search_on_add: bool,
}

impl From<&RadarrConfig> for AcquisitionSettings {
    fn from(config: &RadarrConfig) -> Self {
        Self {
            root_folder: config.root_folder.clone(),
            quality_profile: config.quality_profile.clone(),
            tags: config.tags.clone(),
            monitored: config.monitored,
            search_on_add: config.search_on_add,
        }
    }
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self::from(&RadarrConfig::default())
    }
}

/// Forwards watchlist movies that are neither on the server nor in Radarr
pub struct AcquisitionForwarder<'a> {
    service: &'a dyn AcquisitionService,
    index: &'a MediaIndex,
    resolver: &'a IdResolver,
    settings: &'a AcquisitionSettings,
    dry_run: bool,
}

/// Profile and tag IDs, looked up on the first submission of a pass
struct Submission {
    quality_profile_id: u32,
    tag_ids: Vec<u32>,
}

impl<'a> AcquisitionForwarder<'a> {
    pub fn new(
        service: &'a dyn AcquisitionService,
        index: &'a MediaIndex,
        resolver: &'a IdResolver,
        settings: &'a AcquisitionSettings,
    ) -> Self {
        Self {
            service,
            index,
            resolver,
            settings,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self, rows: &[ExportRow]) -> Result<PassReport> {
        let mut catalog = self.service.catalog_tmdb_ids().await?;
        info!("{}: {} movies already in catalog", self.service.service_name(), catalog.len());

        let mut tracker = PassTracker::new("acquisition", rows.len(), 25);
        let mut submission: Option<Submission> = None;

        for (idx, row) in rows.iter().enumerate() {
            let Some(tmdb_id) = self.resolver.tmdb_id_for(&row.source_url) else {
                info!("Skipping '{}': no TMDB ID for {}", row.title, row.source_url);
                tracker.record_unresolved();
                continue;
            };

            if self.index.contains_tmdb(tmdb_id) {
                debug!("'{}' ({}) is already on the server", row.title, tmdb_id);
                tracker.record_unchanged();
                continue;
            }
            if catalog.contains(&tmdb_id) {
                debug!("'{}' ({}) is already in {}", row.title, tmdb_id, self.service.service_name());
                tracker.record_unchanged();
                continue;
            }

            if self.dry_run {
                info!("Would add '{}' ({}) to {}", row.title, tmdb_id, self.service.service_name());
                catalog.insert(tmdb_id);
                tracker.record_applied();
                continue;
            }

            if submission.is_none() {
                submission = Some(self.prepare_submission().await?);
            }
            if let Some(submission) = &submission {
                let request = self.request_for(tmdb_id, submission);
                self.submit(row, &request, &mut catalog, &mut tracker).await;
            }
            tracker.log_progress(idx + 1);
        }

        Ok(tracker.finish())
    }

    fn request_for(&self, tmdb_id: TmdbId, submission: &Submission) -> AddMovieRequest {
        AddMovieRequest {
            tmdb_id,
            quality_profile_id: submission.quality_profile_id,
            root_folder_path: self.settings.root_folder.clone(),
            monitored: self.settings.monitored,
            add_options: AddOptions {
                search_for_movie: self.settings.search_on_add,
            },
            tags: submission.tag_ids.clone(),
        }
    }

    async fn submit(
        &self,
        row: &ExportRow,
        request: &AddMovieRequest,
        catalog: &mut HashSet<TmdbId>,
        tracker: &mut PassTracker,
    ) {
        let service = self.service.service_name();
        match self.service.add_movie(request).await {
            Ok(()) => {
                info!("Added '{}' ({}) to {}", row.title, request.tmdb_id, service);
                catalog.insert(request.tmdb_id);
                tracker.record_applied();
            }
            Err(AddMovieError::Rejected(failures)) => {
                let reasons: Vec<RejectionReason> = failures.iter().map(RejectionReason::classify).collect();
                if reasons.contains(&RejectionReason::AlreadyPresent) {
                    warn!("'{}' ({}) already present in {}", row.title, request.tmdb_id, service);
                    catalog.insert(request.tmdb_id);
                    tracker.record_unchanged();
                    return;
                }
                for reason in &reasons {
                    match reason {
                        RejectionReason::NotFound => {
                            warn!("{} could not find TMDB ID {} ('{}')", service, request.tmdb_id, row.title)
                        }
                        RejectionReason::PathConflict(message) => {
                            warn!("Path conflict adding '{}' ({}): {}", row.title, request.tmdb_id, message)
                        }
                        RejectionReason::Other(message) => {
                            error!("{} rejected '{}' ({}): {}", service, row.title, request.tmdb_id, message)
                        }
                        RejectionReason::AlreadyPresent => {}
                    }
                }
                let category = match reasons.first() {
                    Some(RejectionReason::NotFound) => "not found",
                    Some(RejectionReason::PathConflict(_)) => "path conflict",
                    _ => "rejected",
                };
                tracker.record_failed_with_error(category);
            }
            Err(AddMovieError::UnparseableRejection { body }) => {
                error!(
                    "{} rejected '{}' with HTTP 400: {} | payload: {}",
                    service,
                    row.title,
                    body,
                    serde_json::to_string(request).unwrap_or_default()
                );
                tracker.record_failed_with_error("rejected");
            }
            Err(AddMovieError::Status { status, body }) => {
                error!(
                    "Failed to add '{}' to {}: HTTP {}: {} | payload: {}",
                    row.title,
                    service,
                    status,
                    body,
                    serde_json::to_string(request).unwrap_or_default()
                );
                tracker.record_failed_with_error("http");
            }
            Err(AddMovieError::Source(e)) => {
                error!("Failed to add '{}' to {}: {}", row.title, service, e);
                tracker.record_failed_with_error("http");
            }
        }
    }

    async fn prepare_submission(&self) -> Result<Submission> {
        let quality_profile_id = self.resolve_quality_profile().await;
        let tag_ids = self.resolve_tags().await?;
        Ok(Submission {
            quality_profile_id,
            tag_ids,
        })
    }

    async fn resolve_quality_profile(&self) -> u32 {
        let Some(name) = self.settings.quality_profile.as_deref().filter(|n| !n.is_empty()) else {
            warn!("No quality profile configured, using profile id {}", FALLBACK_QUALITY_PROFILE_ID);
            return FALLBACK_QUALITY_PROFILE_ID;
        };

        match self.service.quality_profiles().await {
            Ok(profiles) => match profiles.iter().find(|p| p.name.eq_ignore_ascii_case(name)) {
                Some(profile) => profile.id,
                None => {
                    warn!(
                        "Quality profile '{}' not found, using profile id {}",
                        name, FALLBACK_QUALITY_PROFILE_ID
                    );
                    FALLBACK_QUALITY_PROFILE_ID
                }
            },
            Err(e) => {
                warn!(
                    "Failed to fetch quality profiles ({}), using profile id {}",
                    e, FALLBACK_QUALITY_PROFILE_ID
                );
                FALLBACK_QUALITY_PROFILE_ID
            }
        }
    }

    /// Find each configured tag by label (case-insensitive), creating missing ones
    async fn resolve_tags(&self) -> Result<Vec<u32>> {
        if self.settings.tags.is_empty() {
            return Ok(Vec::new());
        }

        let existing = self.service.tags().await?;
        let mut ids = Vec::with_capacity(self.settings.tags.len());
        for label in &self.settings.tags {
            let id = match existing.iter().find(|t| t.label.eq_ignore_ascii_case(label)) {
                Some(tag) => tag.id,
                None => {
                    let tag = self.service.create_tag(label).await?;
                    info!("Created {} tag '{}' ({})", self.service.service_name(), tag.label, tag.id);
                    tag.id
                }
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
