//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce la progress bar e le statistiche della build.
//!
//! ## Componenti principali:
//! - `ProgressManager`: progress bar `indicatif` sul numero totale di file
//! - `BuildStats`: contatori cumulativi per il riepilogo finale
//!
//! ## Statistiche tracciate:
//! - **files_processed**: totale file elaborati (tutti i pass)
//! - **files_written / files_skipped / files_fell_back / files_failed**
//! - **artifacts_copied / artifacts_dropped**: fallback per singolo artifact raster
//! - **bytes_in / bytes_out**: dimensioni sorgente e output primario dei file scritti
//! - **setup_errors**: errori fatali di un pass
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:42] [=====================>------------------] 75/140 (53%) [OK] hero.jpg
//! ```

use crate::file_manager::FileManager;
use crate::report::{ArtifactOutcome, BuildReport, FileOutcome, TaskResult};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages the build progress bar
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A bar that never draws (JSON mode, tests)
    pub fn hidden(total_files: u64) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total_files);
        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

/// Cumulative statistics for a build
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BuildStats {
    pub files_processed: usize,
    pub files_written: usize,
    pub files_skipped: usize,
    pub files_fell_back: usize,
    pub files_failed: usize,
    pub artifacts_copied: usize,
    pub artifacts_dropped: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub setup_errors: usize,
}

impl BuildStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &FileOutcome) {
        self.files_processed += 1;
        match &outcome.result {
            TaskResult::Produced(artifacts) => {
                self.files_written += 1;
                self.artifacts_copied += artifacts
                    .iter()
                    .filter(|a| matches!(a, ArtifactOutcome::Copied { .. }))
                    .count();
                self.artifacts_dropped += outcome.result.dropped_count();
            }
            TaskResult::Skipped(_) => self.files_skipped += 1,
            TaskResult::FellBack { .. } => self.files_fell_back += 1,
            TaskResult::Failed(_) => self.files_failed += 1,
        }

        if let Some(size) = outcome.result.primary_size() {
            self.bytes_in += outcome.source_size;
            self.bytes_out += size;
        }
    }

    pub fn from_reports(reports: &[BuildReport]) -> Self {
        let mut stats = Self::new();
        for report in reports {
            report.files.iter().for_each(|outcome| stats.record(outcome));
            stats.setup_errors += report.setup_errors.len();
        }
        stats
    }

    pub fn bytes_saved(&self) -> u64 {
        self.bytes_in.saturating_sub(self.bytes_out)
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.bytes_in, self.bytes_out)
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Written: {} | Skipped: {} | Fell back: {} | Failed: {} | Saved: {} ({:.2}%)",
            self.files_processed,
            self.files_written,
            self.files_skipped,
            self.files_fell_back,
            self.files_failed,
            FileManager::format_size(self.bytes_saved()),
            self.overall_reduction_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Artifact;
    use std::path::PathBuf;

    fn outcome(source_size: u64, result: TaskResult) -> FileOutcome {
        FileOutcome {
            source: PathBuf::from("x"),
            kind: "image",
            source_size,
            result,
        }
    }

    #[test]
    fn test_stats_record() {
        let mut stats = BuildStats::new();
        stats.record(&outcome(
            1_000,
            TaskResult::Produced(vec![
                ArtifactOutcome::Written(Artifact::new("a.png", 600)),
                ArtifactOutcome::Dropped {
                    path: PathBuf::from("a.avif"),
                    reason: "exhausted".into(),
                },
            ]),
        ));
        stats.record(&outcome(500, TaskResult::Skipped("exists".into())));
        stats.record(&outcome(
            200,
            TaskResult::FellBack {
                artifact: Artifact::new("app.js", 200),
                reason: "terser".into(),
            },
        ));
        stats.record(&outcome(0, TaskResult::Failed("gone".into())));

        assert_eq!(stats.files_processed, 4);
        assert_eq!(stats.files_written, 1);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.files_fell_back, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.artifacts_dropped, 1);
        assert_eq!(stats.bytes_in, 1_200);
        assert_eq!(stats.bytes_out, 800);
        assert_eq!(stats.bytes_saved(), 400);
        assert!(stats.format_summary().contains("Failed: 1"));
    }

    #[test]
    fn test_stats_from_reports_counts_setup_errors() {
        let mut report = BuildReport::new("videos");
        report.record_setup_error("source root missing");
        let stats = BuildStats::from_reports(&[report, BuildReport::new("fonts")]);
        assert_eq!(stats.setup_errors, 1);
        assert_eq!(stats.files_processed, 0);
        assert_eq!(stats.overall_reduction_percent(), 0.0);
    }

    #[test]
    fn test_hidden_bar_counts() {
        let progress = ProgressManager::hidden(3);
        assert_eq!(progress.bar.length(), Some(3));
        progress.update("[OK] a.png");
        progress.update("[SKIP] b.png");
        assert_eq!(progress.position(), 2);
    }
}
