//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della pipeline.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Allega sempre il path del file di origine agli errori di I/O
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O con il path coinvolto (lettura sorgente, scrittura destinazione)
//! - `Codec`: Encoder immagine/video fallito o output non valido
//! - `Tool`: Tool esterno terminato con exit status non zero
//! - `MissingDependency`: Nessun tool esterno disponibile per un formato
//! - `Minify`: Minificazione HTML/JS/SVG fallita
//! - `Timeout`: Tool esterno oltre il tempo massimo
//! - `Setup`: Errori fatali per un pass (directory non creabile, root mancante)
//! - `Config`: Configurazione non valida
//! - `Join`: Task tokio andato in panic o cancellato
//!
//! ## Esempio:
//! ```rust
//! use static_asset_optimizer::OptimizeError;
//! use std::path::Path;
//!
//! async fn read_source(path: &Path) -> Result<Vec<u8>, OptimizeError> {
//!     let bytes = tokio::fs::read(path)
//!         .await
//!         .map_err(|e| OptimizeError::io(path, e))?;
//!     Ok(bytes)
//! }
//! ```

use std::path::{Path, PathBuf};

/// Custom error types for asset optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Codec error ({format}): {message}")]
    Codec { format: String, message: String },

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Minification error: {0}")]
    Minify(String),

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl OptimizeError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn codec(format: impl ToString, message: impl ToString) -> Self {
        Self::Codec {
            format: format.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OptimizeError>;
