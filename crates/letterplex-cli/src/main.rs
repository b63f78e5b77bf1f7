use clap::{ArgAction, Parser, Subcommand};
use commands::{clear, config, sync};
use media_sync_config::PathManager;
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "letterplex")]
#[command(about = "Letterplex - Bring your Letterboxd ratings, diary and watchlist into Plex")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync Letterboxd exports into Plex (and optionally Radarr)
    #[command(long_about = "Reconcile the Letterboxd ratings, watched and watchlist exports with Plex. Only changes are written. If no pass flags are given, the passes enabled in configuration run.")]
    Sync {
        /// Sync ratings
        #[arg(long, action = ArgAction::SetTrue)]
        ratings: bool,

        /// Mark watched films as played
        #[arg(long, action = ArgAction::SetTrue)]
        watched: bool,

        /// Sync the Plex watchlist
        #[arg(long, action = ArgAction::SetTrue)]
        watchlist: bool,

        /// Send watchlist films missing from Plex to Radarr
        #[arg(long, action = ArgAction::SetTrue)]
        radarr: bool,

        /// Run every pass enabled in configuration (conflicts with individual flags)
        #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["ratings", "watched", "watchlist", "radarr"])]
        all: bool,

        /// Log every change that would be made without writing anything
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,

        /// Also write logs to this file (rotated daily). Defaults to <log dir>/sync.log
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,
    },
    /// Configure credentials and settings
    #[command(long_about = "Manage configuration and credentials for Letterplex. Environment variables still override anything stored here.")]
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommands>,
    },
    /// Clear stored data
    #[command(long_about = "Clear stored data. Use --mappings to delete the Letterboxd URL to TMDB ID mapping store; every URL will be looked up again on the next sync.")]
    Clear {
        /// Delete the mapping store
        #[arg(long, action = ArgAction::SetTrue)]
        mappings: bool,

        /// Do not ask for confirmation
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (masks sensitive data)
    #[command(long_about = "Display the effective configuration, including environment overrides. Tokens are masked unless --full is given.")]
    Show {
        /// Show secrets unmasked
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },

    /// Configure the Plex server
    #[command(long_about = "Store the Plex server URL, token and library. You can find your Plex token by inspecting network requests in Plex Web.")]
    Plex {
        /// Plex API Token (if not provided, will prompt)
        #[arg(long)]
        token: Option<String>,

        /// Plex Server URL, e.g. http://192.168.1.10:32400
        #[arg(long)]
        server_url: Option<String>,

        /// Movie library name (defaults to the first movie library)
        #[arg(long)]
        library: Option<String>,

        /// Plex Home user to act as
        #[arg(long)]
        user: Option<String>,
    },

    /// Configure Radarr
    #[command(long_about = "Store the Radarr URL and API key used to forward watchlist films that are not in Plex yet.")]
    Radarr {
        /// Radarr URL, e.g. http://radarr:7878
        #[arg(long)]
        url: Option<String>,

        /// Radarr API key (if not provided, will prompt)
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Sync runs always keep a log file, like the container's sync.log
    let log_file = match &cli.command {
        Commands::Sync { log_file, .. } => Some(
            log_file
                .clone()
                .unwrap_or_else(|| PathManager::default().sync_log_file()),
        ),
        _ => None,
    };
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Sync {
            ratings,
            watched,
            watchlist,
            radarr,
            all,
            dry_run,
            log_file: _,
        } => {
            let selection = sync::PassSelection {
                ratings,
                watched,
                watchlist,
                radarr,
                all,
            };
            tokio::select! {
                result = sync::run_sync(selection, dry_run, &output) => result,
                _ = tokio::signal::ctrl_c() => {
                    tracing::error!(operation = "sync", "Process interrupted");
                    output.warn("Process interrupted");
                    Ok(())
                }
            }
        }
        Commands::Config { cmd } => {
            let cmd = cmd.unwrap_or(ConfigCommands::Show { full: false });
            config::run_config(cmd, &output).await
        }
        Commands::Clear { mappings, yes } => clear::run_clear(mappings, yes, &output).await,
    }
}
