//! # Build Report Module
//!
//! Risultati della build a tre livelli:
//! - `ArtifactOutcome`: cosa è successo a un singolo file di output
//! - `TaskResult`: esito di un File Task (un file sorgente)
//! - `BuildReport`: aggregazione di un pass, più gli errori di setup
//!
//! Solo `TaskResult::Failed` e gli errori di setup rendono fallita la build.
//! `Skipped`, `FellBack`, `Copied` e `Dropped` sono esiti normali.

use std::path::{Path, PathBuf};

/// One file written to the destination tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: u64,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Fate of one planned artifact of a raster source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Encoded and written
    Written(Artifact),
    /// Already present, left untouched
    Skipped(PathBuf),
    /// Primary output replaced by a verbatim copy of the source
    Copied { artifact: Artifact, reason: String },
    /// Derived format abandoned, nothing left at `path`
    Dropped { path: PathBuf, reason: String },
    /// Derived format not generated: `owner` (a source file of the same
    /// directory) already maps to `path`
    Claimed { path: PathBuf, owner: PathBuf },
}

impl ArtifactOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Written(artifact) | Self::Copied { artifact, .. } => &artifact.path,
            Self::Skipped(path) | Self::Dropped { path, .. } | Self::Claimed { path, .. } => path,
        }
    }

    /// Log line for outcomes that deviate from a plain write
    pub fn note(&self) -> Option<String> {
        match self {
            Self::Copied { artifact, reason } => Some(format!(
                "{} copied verbatim: {}",
                artifact.path.display(),
                reason
            )),
            Self::Dropped { path, reason } => Some(format!("{} dropped: {}", path.display(), reason)),
            Self::Claimed { path, owner } => Some(format!(
                "{} not generated, the path belongs to {}",
                path.display(),
                owner.display()
            )),
            Self::Written(_) | Self::Skipped(_) => None,
        }
    }

    /// Artifact present on disk after this build step, if it was written now
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Written(artifact) | Self::Copied { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}

/// Result of a File Task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    Produced(Vec<ArtifactOutcome>),
    Skipped(String),
    FellBack { artifact: Artifact, reason: String },
    Failed(String),
}

impl TaskResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Produced(_) => "written",
            Self::Skipped(_) => "skipped",
            Self::FellBack { .. } => "fell back",
            Self::Failed(_) => "failed",
        }
    }

    /// Why the task did not fully succeed, if it didn't
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Produced(_) => None,
            Self::Skipped(reason) | Self::FellBack { reason, .. } | Self::Failed(reason) => {
                Some(reason.as_str())
            }
        }
    }

    /// Artifacts written by this task, in plan order
    pub fn artifacts(&self) -> Vec<&Artifact> {
        match self {
            Self::Produced(outcomes) => outcomes.iter().filter_map(|o| o.artifact()).collect(),
            Self::FellBack { artifact, .. } => vec![artifact],
            _ => Vec::new(),
        }
    }

    /// Size of the primary output written this run
    pub fn primary_size(&self) -> Option<u64> {
        match self {
            Self::Produced(outcomes) => outcomes.first().and_then(|o| o.artifact()).map(|a| a.size),
            Self::FellBack { artifact, .. } => Some(artifact.size),
            _ => None,
        }
    }

    pub fn dropped_count(&self) -> usize {
        match self {
            Self::Produced(outcomes) => outcomes
                .iter()
                .filter(|o| matches!(o, ArtifactOutcome::Dropped { .. }))
                .count(),
            _ => 0,
        }
    }
}

/// Outcome of one source file
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub kind: &'static str,
    pub source_size: u64,
    pub result: TaskResult,
}

impl FileOutcome {
    pub fn failed(source: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind: "file",
            source_size: 0,
            result: TaskResult::Failed(message.into()),
        }
    }
}

/// Every result of one pass
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub pass: String,
    pub files: Vec<FileOutcome>,
    pub setup_errors: Vec<String>,
}

impl BuildReport {
    pub fn new(pass: &str) -> Self {
        Self {
            pass: pass.to_string(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: FileOutcome) {
        self.files.push(outcome);
    }

    pub fn record_setup_error(&mut self, message: impl Into<String>) {
        self.setup_errors.push(message.into());
    }

    /// Fold a subdirectory report into this one
    pub fn merge(&mut self, other: BuildReport) {
        self.files.extend(other.files);
        self.setup_errors.extend(other.setup_errors);
    }

    pub fn is_failure(&self) -> bool {
        !self.setup_errors.is_empty() || self.files.iter().any(|f| f.result.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.result.is_failure())
    }

    pub fn find(&self, source: &Path) -> Option<&FileOutcome> {
        self.files.iter().find(|f| f.source == source)
    }

    pub fn count(&self, predicate: impl Fn(&TaskResult) -> bool) -> usize {
        self.files.iter().filter(|f| predicate(&f.result)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, result: TaskResult) -> FileOutcome {
        FileOutcome {
            source: PathBuf::from(name),
            kind: "file",
            source_size: 10,
            result,
        }
    }

    #[test]
    fn test_only_failed_and_setup_errors_fail_a_report() {
        let mut report = BuildReport::new("images");
        report.record(outcome("a.png", TaskResult::Skipped("exists".into())));
        report.record(outcome(
            "b.svg",
            TaskResult::FellBack {
                artifact: Artifact::new("out/b.svg", 10),
                reason: "svgo missing".into(),
            },
        ));
        report.record(outcome(
            "c.png",
            TaskResult::Produced(vec![
                ArtifactOutcome::Copied {
                    artifact: Artifact::new("out/c.png", 10),
                    reason: "exhausted".into(),
                },
                ArtifactOutcome::Dropped {
                    path: PathBuf::from("out/c.webp"),
                    reason: "exhausted".into(),
                },
            ]),
        ));
        assert!(!report.is_failure());

        let mut failing = report.clone();
        failing.record(outcome("d.png", TaskResult::Failed("unreadable".into())));
        assert!(failing.is_failure());
        assert_eq!(failing.failures().count(), 1);

        report.record_setup_error("missing root");
        assert!(report.is_failure());
    }

    #[test]
    fn test_merge_and_counts() {
        let mut root = BuildReport::new("fonts");
        root.record(outcome("a.woff2", TaskResult::Skipped("exists".into())));

        let mut child = BuildReport::new("fonts");
        child.record(outcome("sub/b.woff2", TaskResult::Failed("gone".into())));
        child.record_setup_error("cannot create sub");

        root.merge(child);
        assert_eq!(root.files.len(), 2);
        assert_eq!(root.setup_errors.len(), 1);
        assert_eq!(root.count(|r| matches!(r, TaskResult::Skipped(_))), 1);
        assert!(root.find(Path::new("sub/b.woff2")).is_some());
    }

    #[test]
    fn test_primary_size_and_dropped() {
        let result = TaskResult::Produced(vec![
            ArtifactOutcome::Written(Artifact::new("a.png", 800)),
            ArtifactOutcome::Written(Artifact::new("a.webp", 600)),
            ArtifactOutcome::Dropped {
                path: PathBuf::from("a.avif"),
                reason: "exhausted".into(),
            },
        ]);
        assert_eq!(result.primary_size(), Some(800));
        assert_eq!(result.dropped_count(), 1);
        assert_eq!(result.artifacts().len(), 2);
        assert_eq!(result.reason(), None);
    }

    #[test]
    fn test_notes_carry_path_and_reason() {
        let copied = ArtifactOutcome::Copied {
            artifact: Artifact::new("out/a.png", 10),
            reason: "pngquant: not found".into(),
        };
        let note = copied.note().unwrap();
        assert!(note.contains("out/a.png"));
        assert!(note.contains("pngquant: not found"));

        let claimed = ArtifactOutcome::Claimed {
            path: PathBuf::from("out/a.webp"),
            owner: PathBuf::from("src/a.webp"),
        };
        assert_eq!(claimed.path(), Path::new("out/a.webp"));
        assert!(claimed.note().unwrap().contains("src/a.webp"));
        assert!(claimed.artifact().is_none());

        assert_eq!(ArtifactOutcome::Written(Artifact::new("out/a.png", 10)).note(), None);
    }
}
