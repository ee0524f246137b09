//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path di output. L'albero di destinazione
//! rispecchia quello sorgente 1:1: l'artifact primario mantiene nome ed
//! estensione, i formati derivati cambiano solo l'estensione.
//!
//! Un path derivato non è per forza libero: `a.webp` può essere a sua volta
//! un file sorgente accanto ad `a.png`, e `a.png` e `a.jpg` puntano entrambi
//! ad `a.webp`/`a.avif`. `DirectoryClaims` assegna ogni path derivato di una
//! directory a un solo proprietario: i file sorgente vincono sempre, tra due
//! sorgenti raster vince la prima in ordine di nome.

use crate::error::{OptimizeError, Result};
use crate::image_processor::derived_extension;
use image::ImageFormat;
use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Formats generated next to every raster source
pub const DERIVED_FORMATS: [ImageFormat; 2] = [ImageFormat::WebP, ImageFormat::Avif];

/// One output a raster source should end up with
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedArtifact {
    pub format: ImageFormat,
    pub path: PathBuf,
    pub primary: bool,
}

pub struct PathResolver;

impl PathResolver {
    /// Destination of `source` inside `dest_dir`
    pub fn dest_for(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let file_name = source.file_name().ok_or_else(|| {
            OptimizeError::Setup(format!("invalid file name: {}", source.display()))
        })?;
        Ok(dest_dir.join(file_name))
    }

    /// `a.png` becomes `a.webp`
    pub fn derived_path(primary: &Path, format: ImageFormat) -> PathBuf {
        primary.with_extension(derived_extension(format))
    }

    /// Primary re-encode first, then each derived format
    pub fn raster_plan(primary: &Path, source_format: ImageFormat) -> Vec<PlannedArtifact> {
        std::iter::once(PlannedArtifact {
            format: source_format,
            path: primary.to_path_buf(),
            primary: true,
        })
        .chain(DERIVED_FORMATS.iter().map(|format| PlannedArtifact {
            format: *format,
            path: Self::derived_path(primary, *format),
            primary: false,
        }))
        .collect()
    }
}

/// Ownership of the output file names of one directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryClaims {
    sources: HashSet<OsString>,
    derived: HashMap<OsString, OsString>,
}

impl DirectoryClaims {
    /// `files` lists every regular file of the source directory, with the
    /// raster format of those that get derived artifacts
    pub fn new(files: &[(OsString, Option<ImageFormat>)]) -> Self {
        let sources: HashSet<OsString> = files.iter().map(|(name, _)| name.clone()).collect();

        let mut rasters: Vec<&OsString> = files
            .iter()
            .filter(|(_, format)| format.is_some())
            .map(|(name, _)| name)
            .collect();
        rasters.sort();

        let mut derived = HashMap::new();
        for name in rasters {
            for format in DERIVED_FORMATS {
                let Some(derived_name) = PathResolver::derived_path(Path::new(name), format)
                    .file_name()
                    .map(OsStr::to_os_string)
                else {
                    continue;
                };
                if !sources.contains(&derived_name) {
                    derived.entry(derived_name).or_insert_with(|| name.clone());
                }
            }
        }

        Self { sources, derived }
    }

    /// The file that owns `derived_name` when it is not `source_name`
    pub fn owner_of<'a>(&'a self, source_name: &OsStr, derived_name: &'a OsStr) -> Option<&'a OsStr> {
        if self.sources.contains(derived_name) {
            return Some(derived_name);
        }
        match self.derived.get(derived_name) {
            Some(owner) if owner.as_os_str() != source_name => Some(owner.as_os_str()),
            _ => None,
        }
    }
}
