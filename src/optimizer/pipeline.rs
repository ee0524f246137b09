//! # Asset Pipeline Orchestrator
//!
//! Orchestratore principale: lancia in parallelo tutti i pass abilitati e
//! decide l'esito della build.
//!
//! ## Flusso:
//! 1. Valida la configurazione e logga i tool esterni disponibili
//! 2. Conta i file di ogni pass (per la progress bar)
//! 3. Lancia un task per pass, ognuno con il proprio `TreeWalker`
//! 4. Attende tutti i pass: un errore di setup interrompe solo quel pass
//! 5. Stampa le statistiche finali
//!
//! La build fallisce se almeno un file è `Failed` o un pass ha avuto un
//! errore di setup. Fallback e skip non la fanno mai fallire.

use crate::{
    config::{Config, PassConfig},
    file_manager::FileManager,
    image_processor::RASTER_TOOLS,
    json_output::JsonMessage,
    optimizer::{
        concurrency::ConcurrencyManager,
        progress_tracker::ProgressTracker,
        task_optimizer::{Adapters, TaskOptimizer},
        tree_walker::TreeWalker,
    },
    platform::ToolResolver,
    progress::BuildStats,
    report::BuildReport,
    text_processor::TEXT_TOOLS,
};
use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Outcome of a whole build
#[derive(Debug)]
pub struct BuildSummary {
    pub reports: Vec<BuildReport>,
    pub stats: BuildStats,
    pub duration: Duration,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        !self.reports.iter().any(|report| report.is_failure())
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    pub fn report(&self, pass: &str) -> Option<&BuildReport> {
        self.reports.iter().find(|report| report.pass == pass)
    }
}

pub struct AssetPipeline {
    config: Config,
    tools: ToolResolver,
    adapters: Adapters,
}

impl AssetPipeline {
    /// Pipeline bound to the external tools
    pub fn new(config: Config) -> Result<Self> {
        let tools = ToolResolver::new(config.tools_dir.clone());
        let adapters = Adapters::external(&tools);
        Self::with_adapters(config, tools, adapters)
    }

    pub fn with_adapters(config: Config, tools: ToolResolver, adapters: Adapters) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tools,
            adapters,
        })
    }

    /// Run every enabled pass concurrently
    pub async fn run(&self) -> Result<BuildSummary> {
        let start_time = Instant::now();
        let passes: Vec<PassConfig> = self.config.enabled_passes().cloned().collect();

        // walkdir is synchronous, keep it off the runtime threads
        let roots: Vec<_> = passes
            .iter()
            .map(|pass| (self.config.pass_source(pass), pass.recursive, pass.kind))
            .collect();
        let total_files: usize = tokio::task::spawn_blocking(move || {
            roots
                .iter()
                .map(|(root, recursive, kind)| FileManager::count_files(root, *recursive, *kind))
                .sum()
        })
        .await?;

        if self.config.json_output {
            JsonMessage::Start {
                source_root: self.config.source_root.clone(),
                dest_root: self.config.dest_root.clone(),
                passes: passes.iter().map(|p| p.name.clone()).collect(),
                total_files,
                skip_existing: self.config.skip_existing,
                workers: self.config.workers,
            }
            .emit();
        } else {
            self.log_configuration(&passes, total_files);
        }
        self.check_dependencies();

        let tracker = ProgressTracker::new(total_files, self.config.json_output);
        let concurrency = ConcurrencyManager::new(self.config.workers, self.config.video_workers);

        let handles: Vec<_> = passes
            .iter()
            .map(|pass| {
                let task = TaskOptimizer::new(
                    pass.kind,
                    self.adapters.clone(),
                    self.config.image.clone(),
                    self.config.video.clone(),
                    self.config.skip_existing,
                    concurrency.clone(),
                );
                let walker = TreeWalker::new(&pass.name, task, tracker.clone(), pass.recursive);
                let source = self.config.pass_source(pass);
                let dest = self.config.pass_dest(pass);
                let name = pass.name.clone();
                (
                    name.clone(),
                    tokio::spawn(async move { run_pass(&name, walker, &source, &dest).await }),
                )
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let report = handle.await.unwrap_or_else(|e| {
                let mut report = BuildReport::new(&name);
                report.record_setup_error(format!("pass panicked: {}", e));
                report
            });
            if self.config.json_output {
                JsonMessage::pass_complete(&report).emit();
            }
            reports.push(report);
        }

        let stats = BuildStats::from_reports(&reports);
        let summary = BuildSummary {
            reports,
            stats,
            duration: start_time.elapsed(),
        };

        tracker.finish(&summary.stats.format_summary());
        self.print_final_stats(&summary);

        Ok(summary)
    }

    fn log_configuration(&self, passes: &[PassConfig], total_files: usize) {
        info!(
            "Building {} -> {}",
            self.config.source_root.display(),
            self.config.dest_root.display()
        );
        if self.config.skip_existing {
            info!("Skip mode: existing artifacts are left untouched");
        } else {
            info!("Fresh mode: every artifact is regenerated");
        }
        for pass in passes {
            info!(
                "  • {} ({:?}{}): {}",
                pass.name,
                pass.kind,
                if pass.recursive { "" } else { ", top level only" },
                self.config.pass_source(pass).display()
            );
        }
        info!("Found {} files to process", total_files);
    }

    /// Missing tools only produce fallbacks, so this never fails
    fn check_dependencies(&self) {
        let mut missing = Vec::new();
        for (tool, available) in self
            .tools
            .availability(RASTER_TOOLS)
            .into_iter()
            .chain(self.tools.availability(&["ffmpeg"]))
            .chain(self.tools.availability(TEXT_TOOLS))
        {
            if !available {
                missing.push(tool);
            }
        }

        if missing.is_empty() {
            info!("All external tools available");
        } else {
            warn!(
                "Missing tools, affected files will fall back to verbatim copies: {}",
                missing.join(", ")
            );
        }
    }

    fn print_final_stats(&self, summary: &BuildSummary) {
        let stats = &summary.stats;
        let duration = summary.duration.as_secs_f64();

        if self.config.json_output {
            JsonMessage::complete(stats, duration, summary.is_success()).emit();
            return;
        }

        info!("=== Build Complete ===");
        info!("Files processed: {}", stats.files_processed);
        info!("Files written: {}", stats.files_written);
        info!("Files skipped: {}", stats.files_skipped);
        info!("Files fell back: {}", stats.files_fell_back);
        info!("Derived formats dropped: {}", stats.artifacts_dropped);
        info!(
            "Bytes saved: {} ({:.2}%)",
            FileManager::format_size(stats.bytes_saved()),
            stats.overall_reduction_percent()
        );
        info!("Duration: {:.2}s", duration);

        for report in &summary.reports {
            for message in &report.setup_errors {
                error!("Pass {} aborted: {}", report.pass, message);
            }
        }
        if stats.files_failed > 0 {
            error!("{} file(s) failed", stats.files_failed);
        }
    }
}

/// Check the pass root, then mirror it
async fn run_pass(name: &str, walker: TreeWalker, source: &Path, dest: &Path) -> BuildReport {
    match tokio::fs::metadata(source).await {
        Ok(metadata) if metadata.is_dir() => walker.mirror(source.to_path_buf(), dest.to_path_buf()).await,
        Ok(_) => {
            let mut report = BuildReport::new(name);
            report.record_setup_error(format!("source root is not a directory: {}", source.display()));
            report
        }
        Err(e) => {
            let mut report = BuildReport::new(name);
            report.record_setup_error(format!("source root {}: {}", source.display(), e));
            report
        }
    }
}
