//! # Progress Tracking Module
//!
//! Tracker thread-safe condiviso da tutti i File Task. Per ogni file:
//! - una riga di log (written / skipped / fell back / failed)
//! - una riga `warn` per ogni artifact copiato, scartato o lasciato a un
//!   altro file, con il motivo
//! - avanzamento della progress bar
//! - evento `file_complete` + `progress` in modalità JSON

use crate::{
    json_output::JsonMessage,
    progress::ProgressManager,
    report::{FileOutcome, TaskResult},
    utils::display_name,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct ProgressTracker {
    pub total_files: usize,
    json_output: bool,
    completed: Arc<AtomicUsize>,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    pub fn new(total_files: usize, json_output: bool) -> Self {
        let progress_manager = if json_output {
            ProgressManager::hidden(total_files as u64)
        } else {
            ProgressManager::new(total_files as u64)
        };
        Self {
            total_files,
            json_output,
            completed: Arc::new(AtomicUsize::new(0)),
            progress_manager,
        }
    }

    /// Tracker without a visible bar or JSON events
    pub fn hidden(total_files: usize) -> Self {
        Self {
            total_files,
            json_output: false,
            completed: Arc::new(AtomicUsize::new(0)),
            progress_manager: ProgressManager::hidden(total_files as u64),
        }
    }

    /// Record a finished file
    pub async fn file_finished(&self, pass: &str, outcome: &FileOutcome) {
        let current = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        let name = display_name(&outcome.source);
        let message = match &outcome.result {
            TaskResult::Produced(_) => {
                let dropped = outcome.result.dropped_count();
                info!(
                    "[OK] {}: {} artifact(s) written{}",
                    outcome.source.display(),
                    outcome.result.artifacts().len(),
                    if dropped > 0 {
                        format!(", {} derived format(s) dropped", dropped)
                    } else {
                        String::new()
                    }
                );
                for note in artifact_notes(&outcome.result) {
                    warn!("[ARTIFACT] {}", note);
                }
                format!("[OK] {}", name)
            }
            TaskResult::Skipped(reason) => {
                debug!("[SKIP] {}: {}", outcome.source.display(), reason);
                format!("[SKIP] {}", name)
            }
            TaskResult::FellBack { reason, .. } => {
                warn!("[FALLBACK] {}: copied verbatim ({})", outcome.source.display(), reason);
                format!("[FALLBACK] {}", name)
            }
            TaskResult::Failed(reason) => {
                error!("[ERROR] {}", reason);
                format!("[ERROR] {}", name)
            }
        };
        self.progress_manager.update(&message);

        if self.json_output {
            JsonMessage::file_complete(pass, outcome).emit();
            JsonMessage::progress(current, self.total_files).emit();
        }
    }

    /// Finalize the progress bar
    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Per-artifact log lines of a produced file
fn artifact_notes(result: &TaskResult) -> Vec<String> {
    match result {
        TaskResult::Produced(outcomes) => outcomes.iter().filter_map(|o| o.note()).collect(),
        _ => Vec::new(),
    }
}
