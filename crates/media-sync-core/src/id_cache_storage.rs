use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use media_sync_models::{IdentityMapping, TmdbId};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::id_cache::IdCache;

/// Append-only mapping file: one `sourceUrl,tmdbId` line per mapping, no header
///
/// Every append is a single complete line flushed to disk before returning,
/// so an interrupted run never leaves a half-written record behind.
pub struct IdCacheStorage {
    path: PathBuf,
}

impl IdCacheStorage {
    /// Open the store, creating the directory and an empty file if needed
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create mapping directory {}", parent.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open mapping file {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every mapping in file order
    pub fn load(&self) -> Result<IdCache> {
        let start = std::time::Instant::now();
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to read mapping file {}", self.path.display()))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut cache = IdCache::new();
        let mut malformed = 0;
        let mut duplicates = 0;
        for (index, record) in reader.records().enumerate() {
            let line = index + 1;
            let mapping = match record.map_err(|e| e.to_string()).and_then(|r| parse_record(&r)) {
                Ok(mapping) => mapping,
                Err(reason) => {
                    warn!("Skipping malformed mapping on line {}: {}", line, reason);
                    malformed += 1;
                    continue;
                }
            };

            if let Some(existing) = cache.get(&mapping.source_url) {
                if existing != mapping.tmdb_id {
                    warn!(
                        "Duplicate mapping for {} on line {} ({}), keeping {}",
                        mapping.source_url, line, mapping.tmdb_id, existing
                    );
                }
                duplicates += 1;
                continue;
            }
            cache.record(&mapping.source_url, mapping.tmdb_id);
        }

        info!(
            "Loaded {} mappings from {} in {:?}",
            cache.len(),
            self.path.display(),
            start.elapsed()
        );
        if malformed > 0 || duplicates > 0 {
            debug!("Mapping store: {} malformed and {} duplicate lines ignored", malformed, duplicates);
        }
        Ok(cache)
    }

    /// Durably add one mapping to the end of the store
    pub fn append(&self, mapping: &IdentityMapping) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open mapping file {}", self.path.display()))?;

        let mut line = String::new();
        if !ends_with_newline(&mut file)? {
            line.push('\n');
        }
        line.push_str(&format_record(mapping)?);

        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        debug!("Recorded mapping {} -> {}", mapping.source_url, mapping.tmdb_id);
        Ok(())
    }
}

fn parse_record(record: &StringRecord) -> std::result::Result<IdentityMapping, String> {
    if record.len() != 2 {
        return Err(format!("expected 2 columns, found {}", record.len()));
    }
    let url = record[0].trim();
    if url.is_empty() {
        return Err("empty URL".to_string());
    }
    let id: TmdbId = record[1]
        .parse()
        .map_err(|_| format!("'{}' is not a TMDB ID", &record[1]))?;
    Ok(IdentityMapping::new(url, id))
}

/// CSV-quote the URL when needed and terminate the line
fn format_record(mapping: &IdentityMapping) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record([mapping.source_url.as_str(), &mapping.tmdb_id.to_string()])?;
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

fn ends_with_newline(file: &mut File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
