//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file della build.
//!
//! ## Responsabilità:
//! - Classificazione dei file per estensione (case-insensitive) e tipo di pass
//! - Scritture atomiche: file temporaneo nella directory di destinazione,
//!   poi rename sul path finale (mai file troncati al path finale)
//! - Copia verbatim (usata anche come fallback)
//! - Conteggio preliminare dei file per la progress bar
//! - Formattazione human-readable delle dimensioni
//!
//! ## Classificazione:
//! | Estensione       | Pass `assets` | Pass `copy` | Pass `markup` | Pass `scripts` |
//! |------------------|---------------|-------------|---------------|----------------|
//! | jpg, jpeg, png   | Raster        | Opaque      | ignorato      | ignorato       |
//! | svg              | Vector        | Opaque      | ignorato      | ignorato       |
//! | mp4              | Video         | Opaque      | ignorato      | ignorato       |
//! | html             | Opaque        | Opaque      | Markup        | ignorato       |
//! | js               | Opaque        | Opaque      | ignorato      | Script         |
//! | altro            | Opaque        | Opaque      | ignorato      | ignorato       |

use crate::config::PassKind;
use crate::error::{OptimizeError, Result};
use image::ImageFormat;
use std::path::Path;
use walkdir::WalkDir;

/// What a File Task does with a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Raster(ImageFormat),
    Vector,
    Video,
    Markup,
    Script,
    Opaque,
}

impl FileKind {
    /// Classify a file for a pass; `None` means the pass ignores it
    pub fn classify(path: &Path, pass: PassKind) -> Option<Self> {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match pass {
            PassKind::Copy => Some(Self::Opaque),
            PassKind::Markup => (ext == "html").then_some(Self::Markup),
            PassKind::Scripts => (ext == "js").then_some(Self::Script),
            PassKind::Assets => Some(match ext.as_str() {
                "jpg" | "jpeg" => Self::Raster(ImageFormat::Jpeg),
                "png" => Self::Raster(ImageFormat::Png),
                "svg" => Self::Vector,
                "mp4" => Self::Video,
                _ => Self::Opaque,
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Raster(_) => "image",
            Self::Vector => "svg",
            Self::Video => "video",
            Self::Markup => "html",
            Self::Script => "script",
            Self::Opaque => "file",
        }
    }
}

/// Manages file operations for the build
pub struct FileManager;

impl FileManager {
    /// Create a directory and its parents; an existing directory is fine
    pub async fn ensure_dir(dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| OptimizeError::io(dir, e))
    }

    /// Whether a destination artifact is already there
    pub async fn exists(path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Write bytes through a temporary file renamed into place
    pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<u64> {
        let temp = Self::temp_beside(path)?;
        tokio::fs::write(temp.path(), bytes)
            .await
            .map_err(|e| OptimizeError::io(path, e))?;
        Self::commit(temp, path).await
    }

    /// Rename a filled temporary file onto `path`, returning its size
    pub async fn commit(temp: tempfile::NamedTempFile, path: &Path) -> Result<u64> {
        // tempfile creates 0600, deployed assets must stay world-readable
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o644))
                .await
                .map_err(|e| OptimizeError::io(path, e))?;
        }
        let size = tokio::fs::metadata(temp.path())
            .await
            .map_err(|e| OptimizeError::io(path, e))?
            .len();
        temp.persist(path)
            .map_err(|e| OptimizeError::io(path, e.error))?;
        Ok(size)
    }

    /// Copy a file verbatim through a temporary file renamed into place
    pub async fn copy_verbatim(source: &Path, dest: &Path) -> Result<u64> {
        let temp = Self::temp_beside(dest)?;
        let size = tokio::fs::copy(source, temp.path())
            .await
            .map_err(|e| OptimizeError::io(source, e))?;
        temp.persist(dest)
            .map_err(|e| OptimizeError::io(dest, e.error))?;
        Ok(size)
    }

    /// Temporary file in the same directory as `path`, removed on drop
    pub fn temp_beside(path: &Path) -> Result<tempfile::NamedTempFile> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        tempfile::Builder::new()
            .prefix(".asset-")
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(|e| OptimizeError::io(parent, e))
    }

    /// Remove a leftover artifact; a missing file is fine
    pub async fn remove_stale(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OptimizeError::io(path, e)),
        }
    }

    /// Count the files a pass will hand to File Tasks
    pub fn count_files(root: &Path, recursive: bool, pass: PassKind) -> usize {
        let max_depth = if recursive { usize::MAX } else { 1 };

        WalkDir::new(root)
            .max_depth(max_depth)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| FileKind::classify(e.path(), pass).is_some())
            .count()
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
