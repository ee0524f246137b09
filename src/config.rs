//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione della build degli asset.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con radici sorgente/destinazione e policy
//! - Definisce i pass (`PassConfig`) che la pipeline esegue in parallelo
//! - Fornisce validazione dei parametri (policy di qualità, worker, CRF)
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default che riproducono il layout `src/` → `public/`
//!
//! ## Pass di default:
//! | Pass      | Sorgente          | Tipo      | Ricorsivo |
//! |-----------|-------------------|-----------|-----------|
//! | images    | assets/images     | assets    | sì        |
//! | icons     | assets/icons      | assets    | sì        |
//! | fonts     | assets/fonts      | copy      | sì        |
//! | videos    | assets/videos     | assets    | sì        |
//! | markup    | (root)            | markup    | no        |
//! | scripts   | assets/js         | scripts   | sì        |
//!
//! ## Esempio:
//! ```rust
//! use static_asset_optimizer::Config;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config {
//!     skip_existing: false,
//!     workers: 8,
//!     ..Default::default()
//! };
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::quality_search::SearchPolicy;
use crate::video_processor::VideoParams;
use anyhow::Result;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the files of a pass are classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    /// Raster images, SVG, MP4 and verbatim copies for everything else
    Assets,
    /// Verbatim copies only
    Copy,
    /// HTML minification, other files ignored
    Markup,
    /// JavaScript minification, other files ignored
    Scripts,
}

/// One top-level mirror pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassConfig {
    pub name: String,
    pub kind: PassKind,
    /// Source directory, relative to `Config::source_root`
    pub source: PathBuf,
    /// Destination directory, relative to `Config::dest_root`
    pub dest: PathBuf,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl PassConfig {
    pub fn new(name: &str, kind: PassKind, relative: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            source: PathBuf::from(relative),
            dest: PathBuf::from(relative),
            recursive: true,
            enabled: true,
        }
    }

    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }
}

/// Quality search policies, one per raster output format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageQuality {
    pub png: SearchPolicy,
    pub jpeg: SearchPolicy,
    pub webp: SearchPolicy,
    pub avif: SearchPolicy,
}

impl Default for ImageQuality {
    fn default() -> Self {
        Self {
            png: SearchPolicy::new(80, 10, 20),
            jpeg: SearchPolicy::new(75, 10, 20),
            webp: SearchPolicy::new(70, 10, 20),
            avif: SearchPolicy::new(45, 10, 20),
        }
    }
}

impl ImageQuality {
    /// Policy for an output format (anything else falls back to the JPEG policy)
    pub fn for_format(&self, format: ImageFormat) -> &SearchPolicy {
        match format {
            ImageFormat::Png => &self.png,
            ImageFormat::WebP => &self.webp,
            ImageFormat::Avif => &self.avif,
            _ => &self.jpeg,
        }
    }
}

/// Configuration for the asset build
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the site sources
    pub source_root: PathBuf,
    /// Root of the deploy tree
    pub dest_root: PathBuf,
    /// Leave existing destination artifacts untouched
    pub skip_existing: bool,
    /// Concurrent image/text encodes
    pub workers: usize,
    /// Concurrent video transcodes
    pub video_workers: usize,
    /// Extra directory searched for external tools before PATH
    pub tools_dir: Option<PathBuf>,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
    pub image: ImageQuality,
    pub video: VideoParams,
    pub passes: Vec<PassConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("src"),
            dest_root: PathBuf::from("public"),
            skip_existing: true,
            workers: 4,
            video_workers: 1,
            tools_dir: None,
            json_output: false,
            image: ImageQuality::default(),
            video: VideoParams::default(),
            passes: vec![
                PassConfig::new("images", PassKind::Assets, "assets/images"),
                PassConfig::new("icons", PassKind::Assets, "assets/icons"),
                PassConfig::new("fonts", PassKind::Copy, "assets/fonts"),
                PassConfig::new("videos", PassKind::Assets, "assets/videos"),
                PassConfig::new("markup", PassKind::Markup, "").non_recursive(),
                PassConfig::new("scripts", PassKind::Scripts, "assets/js"),
            ],
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.video_workers == 0 {
            return Err(anyhow::anyhow!("Number of video workers must be greater than 0"));
        }

        for (name, policy) in [
            ("png", &self.image.png),
            ("jpeg", &self.image.jpeg),
            ("webp", &self.image.webp),
            ("avif", &self.image.avif),
        ] {
            policy
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid {} quality policy: {}", name, e))?;
        }

        if self.video.crf > 51 {
            return Err(anyhow::anyhow!("Video CRF must be between 0 and 51"));
        }

        let mut seen = std::collections::HashSet::new();
        for pass in &self.passes {
            if !seen.insert(pass.name.as_str()) {
                return Err(anyhow::anyhow!("Duplicate pass name: {}", pass.name));
            }
        }

        Ok(())
    }

    /// Passes that will actually run
    pub fn enabled_passes(&self) -> impl Iterator<Item = &PassConfig> {
        self.passes.iter().filter(|pass| pass.enabled)
    }

    /// Keep only the named passes enabled
    pub fn restrict_passes(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            if !self.passes.iter().any(|pass| &pass.name == name) {
                return Err(anyhow::anyhow!("Unknown pass: {}", name));
            }
        }
        for pass in &mut self.passes {
            pass.enabled = names.contains(&pass.name);
        }
        Ok(())
    }

    pub fn pass_source(&self, pass: &PassConfig) -> PathBuf {
        join_relative(&self.source_root, &pass.source)
    }

    pub fn pass_dest(&self, pass: &PassConfig) -> PathBuf {
        join_relative(&self.dest_root, &pass.dest)
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

// `Path::join("")` appends a trailing separator
fn join_relative(root: &Path, relative: &Path) -> PathBuf {
    if relative.as_os_str().is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.workers = 0;
        assert!(config.validate().is_err());

        config.workers = 4;
        config.image.webp = SearchPolicy::new(70, 0, 20);
        assert!(config.validate().is_err());

        config.image.webp = SearchPolicy::new(10, 10, 20);
        assert!(config.validate().is_err());

        config.image.webp = SearchPolicy::new(70, 10, 20);
        config.video.crf = 52;
        assert!(config.validate().is_err());

        config.video.crf = 28;
        config.passes.push(PassConfig::new("images", PassKind::Copy, "other"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.source_root, PathBuf::from("src"));
        assert_eq!(config.dest_root, PathBuf::from("public"));
        assert!(config.skip_existing);
        assert_eq!(config.image.webp.start, 70);
        assert_eq!(config.image.avif.start, 45);
        assert_eq!(config.passes.len(), 6);

        let markup = config.passes.iter().find(|p| p.name == "markup").unwrap();
        assert!(!markup.recursive);
        assert_eq!(config.pass_source(markup), PathBuf::from("src"));
        assert_eq!(config.pass_dest(markup), PathBuf::from("public"));
    }

    #[test]
    fn test_restrict_passes() {
        let mut config = Config::default();
        config
            .restrict_passes(&["scripts".to_string(), "markup".to_string()])
            .unwrap();
        let enabled: Vec<_> = config.enabled_passes().map(|p| p.name.as_str()).collect();
        assert_eq!(enabled, vec!["markup", "scripts"]);

        assert!(config.restrict_passes(&["thumbnails".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("asset-optimizer.json");

        let original_config = Config {
            source_root: PathBuf::from("site"),
            skip_existing: false,
            workers: 8,
            passes: vec![PassConfig::new("fonts", PassKind::Copy, "fonts")],
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.source_root, PathBuf::from("site"));
        assert!(!loaded_config.skip_existing);
        assert_eq!(loaded_config.workers, 8);
        assert_eq!(loaded_config.passes, original_config.passes);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("asset-optimizer.json");
        tokio::fs::write(&config_path, r#"{ "dest_root": "dist" }"#)
            .await
            .unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.dest_root, PathBuf::from("dist"));
        assert_eq!(config.workers, 4);

        let missing = Config::from_file(&temp_dir.path().join("nope.json")).await.unwrap();
        assert_eq!(missing.dest_root, PathBuf::from("public"));
    }
}
