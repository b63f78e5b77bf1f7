pub mod error;
pub mod factory;
pub mod letterboxd;
pub mod plex;
pub mod radarr;
pub mod traits;

pub use error::{AddMovieError, SourceError};
pub use factory::{create_collaborators, Collaborators};
pub use letterboxd::{parse_export_csv, LetterboxdClient};
pub use plex::{PlexHttpClient, PlexMediaServer};
pub use radarr::RadarrHttpClient;
pub use traits::{AcquisitionService, CanonicalIdLookup, MediaServer};
