pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{Config, ConfigError, ExportPaths, PlexConfig, RadarrConfig, SyncOptions, parse_bool, parse_tags};
pub use credentials::CredentialStore;
pub use paths::{PathManager, container_base_path};
