pub mod acquisition;
pub mod export_row;
pub mod media;
pub mod media_ids;
pub mod rating;
pub mod watchlist;

pub use acquisition::{AddMovieRequest, AddOptions, CatalogMovie, QualityProfile, RejectionReason, Tag, ValidationFailure};
pub use export_row::{ExportKind, ExportRow};
pub use media::{LibrarySelector, MediaItem};
pub use media_ids::{IdentityMapping, TmdbId};
pub use rating::LetterboxdRating;
pub use watchlist::WatchlistEntry;
