//! # Tree Walker Module
//!
//! Rispecchia una directory sorgente nella directory di destinazione.
//!
//! ## Per ogni directory:
//! 1. Lista il contenuto della sorgente
//! 2. Crea la directory di destinazione (anche se vuota)
//! 3. Lancia un task per ogni sottodirectory
//! 4. Assegna i path derivati (`DirectoryClaims`) e lancia un task per file
//! 5. Attende tutto quello che ha lanciato prima di ritornare
//!
//! Fail-soft: un figlio che fallisce (o va in panic) viene registrato nel
//! report e non cancella i fratelli. Il walker non prende mai permessi di
//! concorrenza, solo i File Task lo fanno.

use crate::{
    error::OptimizeError,
    file_manager::{FileKind, FileManager},
    optimizer::{
        path_resolver::DirectoryClaims, progress_tracker::ProgressTracker,
        task_optimizer::TaskOptimizer,
    },
    report::{BuildReport, FileOutcome},
};
use futures::future::{BoxFuture, FutureExt};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone)]
pub struct TreeWalker {
    pass: String,
    task: TaskOptimizer,
    tracker: ProgressTracker,
    recursive: bool,
}

impl TreeWalker {
    pub fn new(pass: &str, task: TaskOptimizer, tracker: ProgressTracker, recursive: bool) -> Self {
        Self {
            pass: pass.to_string(),
            task,
            tracker,
            recursive,
        }
    }

    /// Mirror `source_dir` into `dest_dir` and report every file result
    pub fn mirror(&self, source_dir: PathBuf, dest_dir: PathBuf) -> BoxFuture<'static, BuildReport> {
        self.clone().mirror_dir(source_dir, dest_dir, true)
    }

    fn mirror_dir(
        self,
        source_dir: PathBuf,
        dest_dir: PathBuf,
        is_root: bool,
    ) -> BoxFuture<'static, BuildReport> {
        async move {
            let mut report = BuildReport::new(&self.pass);

            let mut entries = match tokio::fs::read_dir(&source_dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    let error = OptimizeError::io(&source_dir, e);
                    if is_root {
                        report.record_setup_error(format!("cannot read pass root: {}", error));
                    } else {
                        report.record(FileOutcome::failed(&source_dir, error.to_string()));
                    }
                    return report;
                }
            };

            if let Err(e) = FileManager::ensure_dir(&dest_dir).await {
                report.record_setup_error(format!("cannot create destination directory: {}", e));
                return report;
            }

            let mut dir_tasks: Vec<(PathBuf, JoinHandle<BuildReport>)> = Vec::new();
            let mut file_tasks: Vec<(PathBuf, JoinHandle<FileOutcome>)> = Vec::new();
            let mut files: Vec<(PathBuf, Option<FileKind>)> = Vec::new();

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        report.record(FileOutcome::failed(
                            &source_dir,
                            OptimizeError::io(&source_dir, e).to_string(),
                        ));
                        break;
                    }
                };

                let path = entry.path();
                // follows symlinks
                let metadata = match tokio::fs::metadata(&path).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        report.record(FileOutcome::failed(&path, OptimizeError::io(&path, e).to_string()));
                        continue;
                    }
                };

                if metadata.is_dir() {
                    if !self.recursive {
                        debug!("Not descending into {} (non-recursive pass)", path.display());
                        continue;
                    }
                    let child_dest = dest_dir.join(entry.file_name());
                    let walker = self.clone();
                    dir_tasks.push((
                        path.clone(),
                        tokio::spawn(walker.mirror_dir(path, child_dest, false)),
                    ));
                } else if metadata.is_file() {
                    let kind = self.task.classify(&path);
                    files.push((path, kind));
                } else {
                    debug!("Ignoring special file {}", path.display());
                }
            }

            let claims = Arc::new(DirectoryClaims::new(
                &files
                    .iter()
                    .filter_map(|(path, kind)| {
                        let format = match kind {
                            Some(FileKind::Raster(format)) => Some(*format),
                            _ => None,
                        };
                        path.file_name().map(|name| (OsString::from(name), format))
                    })
                    .collect::<Vec<_>>(),
            ));

            for (path, kind) in files {
                if kind.is_none() {
                    debug!("Ignoring {} in pass {}", path.display(), self.pass);
                    continue;
                }
                let task = self.task.clone();
                let tracker = self.tracker.clone();
                let pass = self.pass.clone();
                let dest = dest_dir.clone();
                let claims = Arc::clone(&claims);
                let source = path.clone();
                file_tasks.push((
                    path,
                    tokio::spawn(async move {
                        let outcome = task.run(&source, &dest, &claims).await;
                        tracker.file_finished(&pass, &outcome).await;
                        outcome
                    }),
                ));
            }

            for (path, handle) in file_tasks {
                match handle.await {
                    Ok(outcome) => report.record(outcome),
                    Err(e) => report.record(FileOutcome::failed(
                        &path,
                        format!("{}: {}", path.display(), OptimizeError::from(e)),
                    )),
                }
            }

            for (path, handle) in dir_tasks {
                match handle.await {
                    Ok(child) => report.merge(child),
                    Err(e) => report.record(FileOutcome::failed(
                        &path,
                        format!("{}: {}", path.display(), OptimizeError::from(e)),
                    )),
                }
            }

            report
        }
        .boxed()
    }
}
