use super::config::load_effective_config;
use super::sync_ui::SyncUI;
use crate::output::{Output, OutputFormat};
use color_eyre::Result;
use comfy_table::{Cell, Table};
use media_sync_config::{Config, PathManager};
use media_sync_core::{AcquisitionSettings, SyncOptions, SyncOrchestrator, SyncResult};
use media_sync_sources::create_collaborators;
use std::sync::Arc;

/// Passes requested on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct PassSelection {
    pub ratings: bool,
    pub watched: bool,
    pub watchlist: bool,
    pub radarr: bool,
    pub all: bool,
}

impl PassSelection {
    fn any(&self) -> bool {
        self.ratings || self.watched || self.watchlist || self.radarr
    }

    /// Individual flags replace the configured passes; no flags or --all keep them
    fn apply(&self, config: &mut Config) {
        if self.all || !self.any() {
            return;
        }
        config.sync.sync_ratings = self.ratings;
        config.sync.sync_watched = self.watched;
        config.sync.sync_watchlist = self.watchlist;
        config.sync.sync_watchlist_to_radarr = self.radarr;
    }
}

pub async fn run_sync(selection: PassSelection, dry_run: bool, output: &Output) -> Result<()> {
    tracing::debug!("Sync command started");

    let path_manager = PathManager::default();
    path_manager
        .ensure_directories()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create data directories: {}", e))?;
    let (mut config, credentials) = load_effective_config(&path_manager)?;
    selection.apply(&mut config);
    config
        .validate(&credentials)
        .map_err(|e| color_eyre::eyre::eyre!("Configuration validation failed: {}", e))?;

    let collaborators = create_collaborators(&config, &credentials)
        .await
        .map_err(|e| color_eyre::eyre::eyre!("Failed to connect: {}", e))?;

    let mut sync_options = SyncOptions::from_config(&config);
    sync_options.dry_run = dry_run;
    if dry_run {
        output.info("Dry run: nothing will be written to Plex or Radarr");
    }

    let ui = Arc::new(SyncUI::new());
    let callback_ui = Arc::clone(&ui);
    let orchestrator = SyncOrchestrator::new(
        collaborators.media_server,
        config.mapping_path(&path_manager),
        config.paths.clone(),
    )
    .with_lookup(collaborators.id_lookup)
    .with_acquisition(collaborators.acquisition, AcquisitionSettings::from(&config.radarr))
    .with_sync_options(sync_options)
    .with_phase_callback(Box::new(move |phase| callback_ui.set_spinner_message(phase.to_string())));

    let result = orchestrator.sync().await;
    ui.finish_spinner();
    let result = result.map_err(|e| color_eyre::eyre::eyre!("Sync failed: {}", e))?;

    report(&result, output);

    if result.is_success() {
        Ok(())
    } else {
        Err(color_eyre::eyre::eyre!(
            "Sync finished with {} error(s): {}",
            result.errors.len(),
            result.errors.join("; ")
        ))
    }
}

fn report(result: &SyncResult, output: &Output) {
    match output.format() {
        OutputFormat::Human => {
            if output.is_quiet() {
                return;
            }
            if !result.passes.is_empty() {
                println!("{}", pass_table(result));
            }
            output.info(format!(
                "Letterboxd mappings: {} cached, {} looked up, {} unresolved",
                result.resolve.cached, result.resolve.resolved, result.resolve.failed
            ));
            if result.resolve.unpersisted > 0 {
                output.warn(format!(
                    "{} new mappings could not be saved and will be looked up again next run",
                    result.resolve.unpersisted
                ));
            }
            for error in &result.errors {
                output.warn(error);
            }
            let verb = if result.dry_run { "would be applied" } else { "applied" };
            output.success(format!(
                "Sync completed: {} changes {} in {:.1}s",
                result.applied(),
                verb,
                result.duration.as_secs_f64()
            ));
        }
        OutputFormat::Json | OutputFormat::JsonPretty => match serde_json::to_value(result) {
            Ok(value) => output.json(&value),
            Err(e) => output.error(format!("Failed to serialize sync result: {}", e)),
        },
    }
}

fn pass_table(result: &SyncResult) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(
        ["Pass", "Rows", "Applied", "Unchanged", "Unresolved", "Not In Plex", "Invalid", "Failed"]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(comfy_table::Attribute::Bold)),
    );
    for pass in &result.passes {
        table.add_row(vec![
            pass.pass.clone(),
            pass.total.to_string(),
            pass.applied.to_string(),
            pass.unchanged.to_string(),
            pass.unresolved.to_string(),
            pass.not_owned.to_string(),
            pass.invalid.to_string(),
            pass.failed.to_string(),
        ]);
    }
    table
}
