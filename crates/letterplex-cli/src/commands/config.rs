use super::prompts;
use crate::output::Output;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use media_sync_config::{Config, CredentialStore, PathManager};
use owo_colors::OwoColorize;
use serde_json::json;

pub async fn run_config(cmd: crate::ConfigCommands, output: &Output) -> Result<()> {
    match cmd {
        crate::ConfigCommands::Show { full } => show_config(full, output).await,
        crate::ConfigCommands::Plex {
            token,
            server_url,
            library,
            user,
        } => configure_plex(token, server_url, library, user, output).await,
        crate::ConfigCommands::Radarr { url, token } => configure_radarr(url, token, output).await,
    }
}

/// Config file plus environment overrides, and credentials plus environment overrides
pub fn load_effective_config(path_manager: &PathManager) -> Result<(Config, CredentialStore)> {
    let config_file = path_manager.config_file();
    let mut config = Config::load_or_default(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .map_err(|e| color_eyre::eyre::eyre!("Invalid environment: {}", e))?;

    let credentials_file = path_manager.credentials_file();
    let mut cred_store = CredentialStore::new(credentials_file.clone());
    cred_store
        .load()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;
    cred_store.apply_env_overrides(|key| std::env::var(key).ok());

    Ok((config, cred_store))
}

/// The config file alone, for commands that write it back
fn load_file_config(path_manager: &PathManager) -> Result<Config> {
    path_manager
        .ensure_directories()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create configuration directories: {}", e))?;
    let config_file = path_manager.config_file();
    Config::load_or_default(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))
}

fn styled_table(title: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(title)
            .fg(comfy_table::Color::Cyan)
            .add_attribute(comfy_table::Attribute::Bold),
        Cell::new(""),
    ]);
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

fn or_unset(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "<not set>".to_string(),
    }
}

async fn show_config(full: bool, output: &Output) -> Result<()> {
    let path_manager = PathManager::default();
    let (config, credentials) = load_effective_config(&path_manager)?;
    let secret = |value: Option<&String>| -> String {
        match value {
            Some(v) if full => v.clone(),
            Some(v) => mask_string(v),
            None => "<not set>".to_string(),
        }
    };
    let mapping_file = config.mapping_path(&path_manager);

    match output.format() {
        crate::output::OutputFormat::Human => {
            if output.is_quiet() {
                return Ok(());
            }

            println!("\n{}", "Configuration".bright_cyan().bold());
            println!();

            let mut files_table = styled_table("Files");
            files_table.add_row(vec!["Config File".to_string(), path_manager.config_file().display().to_string()]);
            files_table.add_row(vec!["Credentials".to_string(), path_manager.credentials_file().display().to_string()]);
            files_table.add_row(vec!["Mapping Store".to_string(), mapping_file.display().to_string()]);
            files_table.add_row(vec!["Sync Log".to_string(), path_manager.sync_log_file().display().to_string()]);
            println!("{}", files_table);
            println!();

            let mut plex_table = styled_table("Plex");
            plex_table.add_row(vec!["Server URL".to_string(), or_unset(Some(config.plex.server_url.as_str()))]);
            plex_table.add_row(vec!["Token".to_string(), secret(credentials.get_plex_token())]);
            plex_table.add_row(vec![
                "Library".to_string(),
                match (&config.plex.library, config.plex.all_movie_libraries) {
                    (Some(name), _) => name.clone(),
                    (None, true) => "<all movie libraries>".to_string(),
                    (None, false) => "<first movie library>".to_string(),
                },
            ]);
            plex_table.add_row(vec!["Home User".to_string(), or_unset(config.plex.user.as_deref())]);
            println!("{}", plex_table);
            println!();

            let mut radarr_table = styled_table("Radarr");
            radarr_table.add_row(vec!["URL".to_string(), or_unset(config.radarr.url.as_deref())]);
            radarr_table.add_row(vec!["API Key".to_string(), secret(credentials.get_radarr_token())]);
            radarr_table.add_row(vec!["Root Folder".to_string(), config.radarr.root_folder.clone()]);
            radarr_table.add_row(vec![
                "Quality Profile".to_string(),
                config.radarr.quality_profile.clone().unwrap_or_else(|| "<id 1>".to_string()),
            ]);
            radarr_table.add_row(vec!["Tags".to_string(), config.radarr.tags.join(", ")]);
            radarr_table.add_row(vec!["Monitored".to_string(), config.radarr.monitored.to_string()]);
            radarr_table.add_row(vec!["Search On Add".to_string(), config.radarr.search_on_add.to_string()]);
            println!("{}", radarr_table);
            println!();

            let mut sync_table = styled_table("Sync Options");
            let sync = &config.sync;
            for (name, value) in [
                ("Ratings", sync.sync_ratings.to_string()),
                ("Watched", sync.sync_watched.to_string()),
                ("Watchlist", sync.sync_watchlist.to_string()),
                ("Watchlist To Radarr", sync.sync_watchlist_to_radarr.to_string()),
                ("Letterboxd Lookups", sync.map_letterboxd_to_tmdb.to_string()),
                ("Watchlist Discover Fallback", sync.watchlist_discover_fallback.to_string()),
                ("Resolve Concurrency", sync.resolve_concurrency.to_string()),
                ("Ratings Export", config.paths.ratings_csv.display().to_string()),
                ("Watched Export", config.paths.watched_csv.display().to_string()),
                ("Watchlist Export", config.paths.watchlist_csv.display().to_string()),
            ] {
                sync_table.add_row(vec![name.to_string(), value]);
            }
            println!("{}", sync_table);
        }
        crate::output::OutputFormat::Json | crate::output::OutputFormat::JsonPretty => {
            output.json(&json!({
                "config_file": path_manager.config_file().display().to_string(),
                "mapping_file": mapping_file.display().to_string(),
                "plex": {
                    "server_url": config.plex.server_url,
                    "token": secret(credentials.get_plex_token()),
                    "library": config.plex.library,
                    "all_movie_libraries": config.plex.all_movie_libraries,
                    "user": config.plex.user,
                },
                "radarr": {
                    "url": config.radarr.url,
                    "token": secret(credentials.get_radarr_token()),
                    "root_folder": config.radarr.root_folder,
                    "quality_profile": config.radarr.quality_profile,
                    "tags": config.radarr.tags,
                    "monitored": config.radarr.monitored,
                    "search_on_add": config.radarr.search_on_add,
                },
                "sync": config.sync,
                "paths": config.paths,
            }));
        }
    }

    Ok(())
}

async fn configure_plex(
    token_arg: Option<String>,
    server_url_arg: Option<String>,
    library_arg: Option<String>,
    user_arg: Option<String>,
    output: &Output,
) -> Result<()> {
    let path_manager = PathManager::default();
    let mut config = load_file_config(&path_manager)?;
    let credentials_file = path_manager.credentials_file();
    let mut cred_store = CredentialStore::new(credentials_file.clone());
    cred_store
        .load()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;

    print_section_header("Plex Setup", output);
    print_instruction_list(&[
        "The server URL is the address Plex listens on, e.g. http://192.168.1.10:32400",
        "Your token can be found by inspecting network requests in Plex Web (X-Plex-Token)",
        "Leave the library empty to use the first movie library",
    ], output);
    output.println("");

    let server_url = match server_url_arg {
        Some(url) => url,
        None => {
            let existing = Some(config.plex.server_url.as_str()).filter(|u| !u.is_empty());
            prompts::prompt_string("Plex Server URL", existing)?
        }
    };
    let server_url = server_url.trim().trim_end_matches('/').to_string();
    if server_url.is_empty() {
        return Err(color_eyre::eyre::eyre!("Plex server URL is required"));
    }

    let token = match token_arg {
        Some(token) => token,
        None => prompts::prompt_secret("Plex API Token", cred_store.get_plex_token().is_some())?,
    };
    if token.is_empty() {
        return Err(color_eyre::eyre::eyre!("Plex token is required"));
    }

    let library = match library_arg {
        Some(library) => library,
        None => prompts::prompt_string(
            "Movie library (optional, press Enter for the first movie library)",
            config.plex.library.as_deref(),
        )?,
    };

    output.info("Verifying Plex token...");
    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_message("Verifying token...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    match media_sync_sources::plex::auth::verify_token(&token).await {
        Ok(true) => {
            spinner.finish_and_clear();
            output.success("Token verified successfully!");
        }
        Ok(false) => {
            spinner.finish_and_clear();
            output.warn("Token verification failed. The token may be invalid.");
            if !prompts::prompt_yes_no("Continue anyway?", Some(false))? {
                return Err(color_eyre::eyre::eyre!("Token verification failed"));
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            output.warn(&format!("Could not verify token: {}. Continuing anyway...", e));
        }
    }

    config.plex.server_url = server_url.clone();
    config.plex.library = Some(library.trim().to_string()).filter(|l| !l.is_empty());
    if let Some(user) = user_arg {
        config.plex.user = Some(user).filter(|u| !u.is_empty());
    }
    let config_file = path_manager.config_file();
    config
        .save_to_file(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save config to {}: {}", config_file.display(), e))?;

    cred_store.set_plex_token(token);
    cred_store
        .save()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save credentials to {}: {}", credentials_file.display(), e))?;

    output.println("");
    output.success("Plex configuration saved!");
    output.println(&format!("  Server URL: {}", server_url));
    if let Some(library) = &config.plex.library {
        output.println(&format!("  Library: {}", library));
    }
    Ok(())
}

async fn configure_radarr(url_arg: Option<String>, token_arg: Option<String>, output: &Output) -> Result<()> {
    let path_manager = PathManager::default();
    let mut config = load_file_config(&path_manager)?;
    let credentials_file = path_manager.credentials_file();
    let mut cred_store = CredentialStore::new(credentials_file.clone());
    cred_store
        .load()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;

    print_section_header("Radarr Setup", output);
    print_instruction_list(&[
        "Watchlist films that are not in Plex are added to Radarr",
        "The API key is under Settings > General in Radarr",
    ], output);
    output.println("");

    let url = match url_arg {
        Some(url) => url,
        None => prompts::prompt_string("Radarr URL", config.radarr.url.as_deref())?,
    };
    let url = url.trim().trim_end_matches('/').to_string();
    if url.is_empty() {
        return Err(color_eyre::eyre::eyre!("Radarr URL is required"));
    }

    let token = match token_arg {
        Some(token) => token,
        None => prompts::prompt_secret("Radarr API Key", cred_store.get_radarr_token().is_some())?,
    };
    if token.is_empty() {
        return Err(color_eyre::eyre::eyre!("Radarr API key is required"));
    }

    let enable = prompts::prompt_yes_no("Forward watchlist films to Radarr on every sync?", Some(true))?;

    config.radarr.url = Some(url.clone());
    config.sync.sync_watchlist_to_radarr = enable;
    let config_file = path_manager.config_file();
    config
        .save_to_file(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save config to {}: {}", config_file.display(), e))?;

    cred_store.set_radarr_token(token);
    cred_store
        .save()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save credentials to {}: {}", credentials_file.display(), e))?;

    output.println("");
    output.success("Radarr configuration saved!");
    output.println(&format!("  URL: {}", url));
    output.println(&format!("  Enabled: {}", enable));
    Ok(())
}

fn mask_string(s: &str) -> String {
    if s.is_empty() {
        return "<not set>".to_string();
    }
    if s.len() <= 4 {
        return "*".repeat(s.len());
    }
    format!("{}***{}", &s[..2], &s[s.len() - 2..])
}

fn print_section_header(title: &str, output: &Output) {
    output.println("");
    output.println(&format!("{}", title.bold().bright_cyan()));
    output.println(&format!("{}", "─".repeat(title.len()).bright_cyan()));
}

fn print_instruction_list(items: &[&str], output: &Output) {
    for (idx, item) in items.iter().enumerate() {
        output.println(&format!("  {}. {}", idx + 1, item));
    }
}
