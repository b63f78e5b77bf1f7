pub mod client;
pub mod parser;

pub use client::{extract_tmdb_id, LetterboxdClient};
pub use parser::{parse_export, parse_export_csv};
