use anyhow::{Context, Result};
use csv::ReaderBuilder;
use media_sync_models::{ExportKind, ExportRow};
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

const TITLE_COLUMN: usize = 1;
const YEAR_COLUMN: usize = 2;
const URL_COLUMN: usize = 3;
const SCORE_COLUMN: usize = 4;

/// Parse a Letterboxd export CSV (ratings.csv, watched.csv or watchlist.csv)
///
/// Columns are read by position: `Date,Name,Year,Letterboxd URI[,Rating]`.
/// Rows without a URL are skipped; the score is only kept for ratings.
pub fn parse_export_csv<P: AsRef<Path>>(path: P, kind: ExportKind) -> Result<Vec<ExportRow>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} export {}", kind, path.display()))?;
    parse_export(file, kind)
}

pub fn parse_export<R: std::io::Read>(reader: R, kind: ExportKind) -> Result<Vec<ExportRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable {} row {}: {}", kind, line + 2, e);
                continue;
            }
        };

        let url = record.get(URL_COLUMN).map(str::trim).unwrap_or("");
        if url.is_empty() {
            debug!("Skipping {} row {} without a Letterboxd URL", kind, line + 2);
            continue;
        }

        let title = record.get(TITLE_COLUMN).map(str::trim).unwrap_or("");
        let mut row = ExportRow::new(title, url);
        row.year = record.get(YEAR_COLUMN).and_then(|y| y.trim().parse().ok());

        if kind == ExportKind::Ratings {
            if let Some(score) = record.get(SCORE_COLUMN).map(str::trim).filter(|s| !s.is_empty()) {
                row = row.with_score(score);
            }
        }
        rows.push(row);
    }

    debug!("Parsed {} rows from {} export", rows.len(), kind);
    Ok(rows)
}
