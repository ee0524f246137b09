//! # Static Asset Optimizer - Main Entry Point
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap` (tutti opzionali,
//!   ognuno con la sua variabile d'ambiente)
//! - Inizializzazione del logging con `tracing` (sempre su stderr)
//! - Caricamento della configurazione e override da CLI
//! - Exit code: 0 se la build riesce, 1 altrimenti
//!
//! ## Esempio di utilizzo:
//! ```bash
//! asset-optimizer --source site/src --dest site/public --workers 8
//! asset-optimizer --pass images --pass scripts --fresh --verbose
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use static_asset_optimizer::{json_output::JsonMessage, AssetPipeline, BuildSummary, Config};

#[derive(Parser)]
#[command(name = "asset-optimizer")]
#[command(about = "Mirror a site source tree into a size-optimized deploy tree")]
struct Args {
    /// JSON configuration file (missing file means defaults)
    #[arg(short, long, env = "ASSET_CONFIG", default_value = "asset-optimizer.json")]
    config: PathBuf,

    /// Source root, overrides the config file
    #[arg(short, long, env = "ASSET_SOURCE")]
    source: Option<PathBuf>,

    /// Destination root, overrides the config file
    #[arg(short, long, env = "ASSET_DEST")]
    dest: Option<PathBuf>,

    /// Directory searched for external tools before PATH
    #[arg(long, env = "ASSET_TOOLS_DIR")]
    tools_dir: Option<PathBuf>,

    /// Regenerate every artifact, even if it already exists
    #[arg(long, env = "ASSET_FRESH")]
    fresh: bool,

    /// Only run these passes (repeatable)
    #[arg(short, long = "pass", env = "ASSET_PASSES", value_delimiter = ',')]
    passes: Vec<String>,

    /// Number of concurrent image/text encodes
    #[arg(short, long, env = "ASSET_WORKERS")]
    workers: Option<usize>,

    /// Number of concurrent video transcodes
    #[arg(long, env = "ASSET_VIDEO_WORKERS")]
    video_workers: Option<usize>,

    /// Output progress and results as JSON lines on stdout
    #[arg(long, env = "ASSET_JSON")]
    json: bool,

    /// Write the effective configuration to --config and exit
    #[arg(long)]
    write_config: bool,

    /// Verbose logging
    #[arg(short, long, env = "ASSET_VERBOSE")]
    verbose: bool,
}

impl Args {
    /// Config file values with CLI and environment overrides applied
    async fn load_config(&self) -> Result<Config> {
        let mut config = Config::from_file(&self.config)
            .await
            .with_context(|| format!("Failed to load {}", self.config.display()))?;

        if let Some(ref source) = self.source {
            config.source_root = source.clone();
        }
        if let Some(ref dest) = self.dest {
            config.dest_root = dest.clone();
        }
        if let Some(ref tools_dir) = self.tools_dir {
            config.tools_dir = Some(tools_dir.clone());
        }
        if self.fresh {
            config.skip_existing = false;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(video_workers) = self.video_workers {
            config.video_workers = video_workers;
        }
        if self.json {
            config.json_output = true;
        }
        if !self.passes.is_empty() {
            config.restrict_passes(&self.passes)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(args: &Args) -> Result<BuildSummary> {
    let config = args.load_config().await?;

    if args.write_config {
        config.save_to_file(&args.config).await?;
        info!("Configuration written to {}", args.config.display());
        return Ok(BuildSummary {
            reports: Vec::new(),
            stats: Default::default(),
            duration: Default::default(),
        });
    }

    let pipeline = AssetPipeline::new(config)?;
    pipeline.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&args).await {
        Ok(summary) => summary.exit_code(),
        Err(e) => {
            if args.json {
                JsonMessage::error(e.to_string(), Some(format!("{:#}", e))).emit();
            }
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
