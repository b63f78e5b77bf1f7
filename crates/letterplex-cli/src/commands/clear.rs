use super::config::load_effective_config;
use super::prompts;
use crate::output::Output;
use color_eyre::Result;
use media_sync_config::PathManager;
use std::fs;

pub async fn run_clear(mappings: bool, yes: bool, output: &Output) -> Result<()> {
    if !mappings {
        output.warn("No clear option specified. Use --mappings");
        output.println("\nExample: letterplex clear --mappings");
        return Ok(());
    }

    let path_manager = PathManager::default();
    let (config, _) = load_effective_config(&path_manager)?;
    clear_mappings(&config.mapping_path(&path_manager), yes, output)
}

fn clear_mappings(mapping_file: &std::path::Path, yes: bool, output: &Output) -> Result<()> {
    if !mapping_file.exists() {
        output.info("No mapping store found to clear");
        return Ok(());
    }

    let count = fs::read_to_string(mapping_file)
        .map(|content| content.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0);
    if !yes {
        let prompt = format!(
            "Delete {} Letterboxd mappings at {}? Every film will be looked up again.",
            count,
            mapping_file.display()
        );
        if !prompts::prompt_yes_no(&prompt, Some(false))? {
            output.info("Nothing cleared");
            return Ok(());
        }
    }

    fs::remove_file(mapping_file).map_err(|e| {
        color_eyre::eyre::eyre!("Failed to remove mapping store at {}: {}", mapping_file.display(), e)
    })?;
    output.success(&format!("Cleared {} mappings: {}", count, mapping_file.display()));
    Ok(())
}
