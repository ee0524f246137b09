//! # JSON Output Module
//!
//! Output strutturato in JSON (una riga per evento su stdout) per chi
//! integra la build in altri tool. I log `tracing` restano su stderr.
//!
//! ## Tipi di messaggi:
//! - `start`: inizio build con pass attivi e numero di file
//! - `file_complete`: esito di un file
//! - `progress`: progresso corrente
//! - `pass_complete`: fine di un pass
//! - `complete`: fine build con statistiche finali
//! - `error`: errore prima dell'avvio (config, logging)

use crate::progress::BuildStats;
use crate::report::{ArtifactOutcome, BuildReport, FileOutcome, TaskResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Start {
        source_root: PathBuf,
        dest_root: PathBuf,
        passes: Vec<String>,
        total_files: usize,
        skip_existing: bool,
        workers: usize,
    },

    FileComplete {
        pass: String,
        path: PathBuf,
        kind: String,
        status: String,
        original_size: u64,
        artifacts: Vec<JsonArtifact>,
        reason: Option<String>,
    },

    Progress {
        current: usize,
        total: usize,
        percentage: f64,
    },

    PassComplete {
        pass: String,
        files: usize,
        failures: usize,
        setup_errors: Vec<String>,
    },

    Complete {
        files_processed: usize,
        files_written: usize,
        files_skipped: usize,
        files_fell_back: usize,
        files_failed: usize,
        artifacts_dropped: usize,
        bytes_in: u64,
        bytes_out: u64,
        reduction_percent: f64,
        duration_seconds: f64,
        success: bool,
    },

    Error {
        message: String,
        details: Option<String>,
    },
}

/// One artifact line of a `file_complete` event
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct JsonArtifact {
    pub path: PathBuf,
    pub status: String,
    pub size: Option<u64>,
    pub reason: Option<String>,
}

impl From<&ArtifactOutcome> for JsonArtifact {
    fn from(outcome: &ArtifactOutcome) -> Self {
        let (status, reason) = match outcome {
            ArtifactOutcome::Written(_) => ("written", None),
            ArtifactOutcome::Skipped(_) => ("skipped", None),
            ArtifactOutcome::Copied { reason, .. } => ("copied", Some(reason.clone())),
            ArtifactOutcome::Dropped { reason, .. } => ("dropped", Some(reason.clone())),
            ArtifactOutcome::Claimed { owner, .. } => {
                ("claimed", Some(format!("path belongs to {}", owner.display())))
            }
        };
        Self {
            path: outcome.path().to_path_buf(),
            status: status.to_string(),
            size: outcome.artifact().map(|a| a.size),
            reason,
        }
    }
}

impl JsonMessage {
    /// Print the message as one JSON line on stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn file_complete(pass: &str, outcome: &FileOutcome) -> Self {
        let artifacts = match &outcome.result {
            TaskResult::Produced(outcomes) => outcomes.iter().map(JsonArtifact::from).collect(),
            TaskResult::FellBack { artifact, reason } => vec![JsonArtifact {
                path: artifact.path.clone(),
                status: "copied".to_string(),
                size: Some(artifact.size),
                reason: Some(reason.clone()),
            }],
            _ => Vec::new(),
        };

        Self::FileComplete {
            pass: pass.to_string(),
            path: outcome.source.clone(),
            kind: outcome.kind.to_string(),
            status: outcome.result.label().replace(' ', "_"),
            original_size: outcome.source_size,
            artifacts,
            reason: outcome.result.reason().map(str::to_string),
        }
    }

    pub fn progress(current: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self::Progress {
            current,
            total,
            percentage,
        }
    }

    pub fn pass_complete(report: &BuildReport) -> Self {
        Self::PassComplete {
            pass: report.pass.clone(),
            files: report.files.len(),
            failures: report.failures().count(),
            setup_errors: report.setup_errors.clone(),
        }
    }

    pub fn complete(stats: &BuildStats, duration_seconds: f64, success: bool) -> Self {
        Self::Complete {
            files_processed: stats.files_processed,
            files_written: stats.files_written,
            files_skipped: stats.files_skipped,
            files_fell_back: stats.files_fell_back,
            files_failed: stats.files_failed,
            artifacts_dropped: stats.artifacts_dropped,
            bytes_in: stats.bytes_in,
            bytes_out: stats.bytes_out,
            reduction_percent: stats.overall_reduction_percent(),
            duration_seconds,
            success,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Artifact;

    #[test]
    fn test_file_complete_serialization() {
        let outcome = FileOutcome {
            source: PathBuf::from("src/assets/js/app.js"),
            kind: "script",
            source_size: 120,
            result: TaskResult::FellBack {
                artifact: Artifact::new("public/assets/js/app.js", 120),
                reason: "terser failed: Unexpected token".into(),
            },
        };

        let json = serde_json::to_value(JsonMessage::file_complete("scripts", &outcome)).unwrap();
        assert_eq!(json["type"], "file_complete");
        assert_eq!(json["status"], "fell_back");
        assert_eq!(json["artifacts"][0]["status"], "copied");
        assert_eq!(json["artifacts"][0]["size"], 120);
        assert_eq!(json["reason"], "terser failed: Unexpected token");
    }

    #[test]
    fn test_progress_percentage() {
        match JsonMessage::progress(1, 4) {
            JsonMessage::Progress { percentage, .. } => assert_eq!(percentage, 25.0),
            other => panic!("unexpected message: {:?}", other),
        }
        match JsonMessage::progress(0, 0) {
            JsonMessage::Progress { percentage, .. } => assert_eq!(percentage, 0.0),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_complete() {
        let message = JsonMessage::complete(&BuildStats::new(), 1.5, true);
        let line = serde_json::to_string(&message).unwrap();
        assert!(line.starts_with(r#"{"type":"complete""#));
        let parsed: JsonMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, message);
    }
}
