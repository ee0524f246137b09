//! # Static Asset Optimizer Library
//!
//! Build pass che rispecchia l'albero sorgente di un sito in un albero di
//! deploy ottimizzato.
//!
//! ## Architettura dei moduli:
//! - `config`: configurazione, pass e validazione
//! - `error`: tipi di errore della pipeline
//! - `quality_search`: ricerca lineare della qualità (senza filesystem)
//! - `image_processor`: codec raster (pngquant, mozjpeg, cwebp, avifenc)
//! - `video_processor`: transcodifica video con ffmpeg
//! - `text_processor`: svgo, html-minifier-terser, terser
//! - `file_manager`: classificazione, scritture atomiche, copie
//! - `platform`: risoluzione ed esecuzione dei tool esterni
//! - `report`: esiti per artifact, file e pass
//! - `optimizer`: walker, File Task e orchestratore
//! - `progress` / `json_output`: progress bar, statistiche, eventi JSON
//!
//! ## Utilizzo:
//! ```no_run
//! use static_asset_optimizer::{AssetPipeline, Config};
//!
//! # async fn build() -> anyhow::Result<()> {
//! let pipeline = AssetPipeline::new(Config::default())?;
//! let summary = pipeline.run().await?;
//! assert!(summary.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod optimizer;
pub mod platform;
pub mod progress;
pub mod quality_search;
pub mod report;
pub mod text_processor;
pub mod utils;
pub mod video_processor;

#[cfg(test)]
mod test_support;

pub use config::{Config, PassConfig, PassKind};
pub use error::OptimizeError;
pub use optimizer::{AssetPipeline, BuildSummary};
pub use report::{Artifact, ArtifactOutcome, BuildReport, TaskResult};
