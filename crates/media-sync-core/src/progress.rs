use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome counts of one pass over an export
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PassReport {
    pub pass: String,
    pub total: usize,
    /// Writes performed (or that would be performed, in dry-run)
    pub applied: usize,
    /// Already in the desired state
    pub unchanged: usize,
    /// No TMDB ID known for the row's URL
    pub unresolved: usize,
    /// Resolved but not present in the library / catalog
    pub not_owned: usize,
    /// Row data could not be used (e.g. a bad score)
    pub invalid: usize,
    pub failed: usize,
    pub error_counts: HashMap<String, usize>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

/// Tracks a pass while it runs; logs periodic progress and a final summary
pub struct PassTracker {
    report: PassReport,
    start_time: Instant,
    progress_interval: usize,
    last_progress_log: usize,
}

impl PassTracker {
    /// `progress_interval`: log progress every N rows
    pub fn new(pass: &str, total: usize, progress_interval: usize) -> Self {
        if total > 10 {
            info!("Starting {} pass: {} rows to process", pass, total);
        }
        Self {
            report: PassReport {
                pass: pass.to_string(),
                total,
                ..PassReport::default()
            },
            start_time: Instant::now(),
            progress_interval: progress_interval.max(1),
            last_progress_log: 0,
        }
    }

    pub fn record_applied(&mut self) {
        self.report.applied += 1;
    }

    pub fn record_unchanged(&mut self) {
        self.report.unchanged += 1;
    }

    pub fn record_unresolved(&mut self) {
        self.report.unresolved += 1;
    }

    pub fn record_not_owned(&mut self) {
        self.report.not_owned += 1;
    }

    pub fn record_invalid(&mut self) {
        self.report.invalid += 1;
    }

    /// Record a failure grouped under `error_category` in the summary
    pub fn record_failed_with_error(&mut self, error_category: &str) {
        self.report.failed += 1;
        *self
            .report
            .error_counts
            .entry(error_category.to_string())
            .or_insert(0) += 1;
    }

    /// `current` is 1-based
    pub fn log_progress(&mut self, current: usize) {
        if current - self.last_progress_log < self.progress_interval || current == self.report.total {
            return;
        }
        let elapsed = self.start_time.elapsed();
        if elapsed.as_secs_f64() < 0.5 {
            return;
        }
        let report = &self.report;
        info!(
            "{}: {}/{} ({:.1} rows/sec) | Applied: {} | Unchanged: {} | Failed: {}",
            report.pass,
            current,
            report.total,
            current as f64 / elapsed.as_secs_f64(),
            report.applied,
            report.unchanged,
            report.failed
        );
        self.last_progress_log = current;
    }

    pub fn finish(mut self) -> PassReport {
        self.report.duration = self.start_time.elapsed();
        let r = &self.report;
        if r.failed > 0 {
            warn!(
                "{} pass completed: {} rows in {:.1}s | Applied: {} | Unchanged: {} | Unresolved: {} | Not owned: {} | Invalid: {} | Failed: {}",
                r.pass, r.total, r.duration.as_secs_f64(), r.applied, r.unchanged, r.unresolved, r.not_owned, r.invalid, r.failed
            );
            let mut error_entries: Vec<_> = r.error_counts.iter().collect();
            error_entries.sort_by(|a, b| b.1.cmp(a.1));
            let error_summary: Vec<String> = error_entries
                .iter()
                .map(|(category, count)| format!("{}: {}", category, count))
                .collect();
            info!("Error breakdown: {}", error_summary.join(", "));
        } else {
            info!(
                "{} pass completed: {} rows in {:.1}s | Applied: {} | Unchanged: {} | Unresolved: {} | Not owned: {} | Invalid: {}",
                r.pass, r.total, r.duration.as_secs_f64(), r.applied, r.unchanged, r.unresolved, r.not_owned, r.invalid
            );
        }
        self.report
    }
}
