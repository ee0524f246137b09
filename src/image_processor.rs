//! # Image Processing Module
//!
//! Questo modulo definisce il codec adapter raster e la sua implementazione
//! basata esclusivamente su tool esterni.
//!
//! ## Architettura
//!
//! - [`RasterCodec`]: trait `encode(bytes, formato, qualità) -> bytes`. È l'unico
//!   punto di contatto tra la quality search e gli encoder, quindi i test usano
//!   uno stub deterministico.
//! - [`ExternalRasterCodec`]: implementazione di produzione. Scrive la sorgente
//!   in una directory temporanea, lancia il tool e rilegge l'output.
//!
//! ## Formati Supportati
//!
//! | Formato | Tool (priorità decrescente) | Qualità        |
//! |---------|-----------------------------|----------------|
//! | PNG     | pngquant, oxipng            | `--quality 0-Q` (oxipng lossless) |
//! | JPEG    | cjpeg (mozjpeg), jpegoptim  | `-quality Q` / `--max=Q` |
//! | WebP    | cwebp                       | `-q Q -m 5`    |
//! | AVIF    | avifenc                     | `-q Q -s 5`    |
//!
//! ## Validazione output
//!
//! Un output vuoto o di formato diverso da quello richiesto è un errore di
//! codec: la quality search non deve mai confrontare dimensioni di file corrotti.

use crate::error::{OptimizeError, Result};
use crate::platform::ToolResolver;
use crate::tool_args;
use async_trait::async_trait;
use image::ImageFormat;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-invocation limit for image tools
pub const IMAGE_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Every tool the external codec may call
pub const RASTER_TOOLS: &[&str] = &["pngquant", "oxipng", "cjpeg", "jpegoptim", "cwebp", "avifenc"];

/// Encodes raster images to a format at a quality
#[async_trait]
pub trait RasterCodec: Send + Sync {
    async fn encode(&self, source: &[u8], format: ImageFormat, quality: u8) -> Result<Vec<u8>>;
}

/// Short lowercase name used in logs and errors
pub fn format_label(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::WebP => "webp",
        ImageFormat::Avif => "avif",
        _ => "image",
    }
}

/// File extension for a derived artifact
pub fn derived_extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        other => format_label(other),
    }
}

/// Where a tool leaves its result
#[derive(Clone, Copy)]
enum Emit {
    File,
    Stdout,
}

type ArgsBuilder = fn(&Path, &Path, u8) -> Vec<OsString>;

const PNG_TOOLS: &[(&str, Emit, ArgsBuilder)] = &[
    ("pngquant", Emit::File, pngquant_args),
    ("oxipng", Emit::File, oxipng_args),
];
const JPEG_TOOLS: &[(&str, Emit, ArgsBuilder)] = &[
    ("cjpeg", Emit::File, cjpeg_args),
    ("jpegoptim", Emit::Stdout, jpegoptim_args),
];
const WEBP_TOOLS: &[(&str, Emit, ArgsBuilder)] = &[("cwebp", Emit::File, cwebp_args)];
const AVIF_TOOLS: &[(&str, Emit, ArgsBuilder)] = &[("avifenc", Emit::File, avifenc_args)];

fn pngquant_args(input: &Path, output: &Path, quality: u8) -> Vec<OsString> {
    tool_args![
        "--quality", format!("0-{}", quality),
        "--speed", "1",
        "--strip",
        "--force",
        "--output", output,
        "--", input,
    ]
}

// lossless, quality does not apply
fn oxipng_args(input: &Path, output: &Path, _quality: u8) -> Vec<OsString> {
    tool_args!["-o", "6", "--strip", "safe", "--out", output, input]
}

fn cjpeg_args(input: &Path, output: &Path, quality: u8) -> Vec<OsString> {
    tool_args![
        "-quality", quality,
        "-optimize",
        "-progressive",
        "-outfile", output,
        input,
    ]
}

fn jpegoptim_args(input: &Path, _output: &Path, quality: u8) -> Vec<OsString> {
    tool_args![format!("--max={}", quality), "--strip-all", "--stdout", input]
}

fn cwebp_args(input: &Path, output: &Path, quality: u8) -> Vec<OsString> {
    tool_args!["-q", quality, "-m", "5", "-mt", "-quiet", input, "-o", output]
}

fn avifenc_args(input: &Path, output: &Path, quality: u8) -> Vec<OsString> {
    tool_args!["-q", quality, "-s", "5", input, output]
}

/// Raster codec driving external command-line encoders
#[derive(Debug, Clone)]
pub struct ExternalRasterCodec {
    tools: ToolResolver,
    timeout: Duration,
}

impl ExternalRasterCodec {
    pub fn new(tools: ToolResolver) -> Self {
        Self {
            tools,
            timeout: IMAGE_TOOL_TIMEOUT,
        }
    }

    /// Tools for an output format, in order of preference
    fn tool_chain(format: ImageFormat) -> &'static [(&'static str, Emit, ArgsBuilder)] {
        match format {
            ImageFormat::Png => PNG_TOOLS,
            ImageFormat::Jpeg => JPEG_TOOLS,
            ImageFormat::WebP => WEBP_TOOLS,
            ImageFormat::Avif => AVIF_TOOLS,
            _ => &[],
        }
    }

    /// Run the tools for `format` in order until one produces valid output
    async fn try_tools(
        &self,
        input: &Path,
        output: &Path,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>> {
        let label = format_label(format);
        let chain = Self::tool_chain(format);
        let mut last_error = None;

        for (tool_name, emit, args_builder) in chain {
            if !self.tools.is_available(tool_name) {
                continue;
            }

            let args = args_builder(input, output, quality);
            debug!("Attempting {} encode with {} at quality {}", label, tool_name, quality);

            let result = match self.tools.run(tool_name, &args, self.timeout).await {
                Ok(run) => match emit {
                    Emit::Stdout => Ok(run.stdout),
                    Emit::File => tokio::fs::read(output)
                        .await
                        .map_err(|e| OptimizeError::io(output, e)),
                },
                Err(e) => Err(e),
            };

            match result.and_then(|bytes| validate_output(format, bytes)) {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    warn!("{} encode failed with {}, trying next tool: {}", label, tool_name, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            let names: Vec<&str> = chain.iter().map(|(name, _, _)| *name).collect();
            OptimizeError::MissingDependency(format!(
                "no {} encoder available, install one of: {}",
                label,
                names.join(", ")
            ))
        }))
    }
}

#[async_trait]
impl RasterCodec for ExternalRasterCodec {
    async fn encode(&self, source: &[u8], format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
        let source_format = image::guess_format(source)
            .map_err(|e| OptimizeError::codec(format_label(format), format!("unrecognized source image: {}", e)))?;

        let staging = tempfile::tempdir()
            .map_err(|e| OptimizeError::io(&std::env::temp_dir(), e))?;
        let input = staging
            .path()
            .join(format!("source.{}", derived_extension(source_format)));
        let output = staging
            .path()
            .join(format!("encoded.{}", derived_extension(format)));

        tokio::fs::write(&input, source)
            .await
            .map_err(|e| OptimizeError::io(&input, e))?;

        // staging is removed when dropped, after the bytes are read back
        self.try_tools(&input, &output, format, quality).await
    }
}

/// Reject empty or mislabelled encoder output
fn validate_output(format: ImageFormat, bytes: Vec<u8>) -> Result<Vec<u8>> {
    let label = format_label(format);
    if bytes.is_empty() {
        return Err(OptimizeError::codec(label, "encoder produced an empty file"));
    }

    let matches = match format {
        // ISO-BMFF: size box then `ftyp`
        ImageFormat::Avif => bytes.len() > 12 && &bytes[4..8] == b"ftyp",
        _ => image::guess_format(&bytes).map(|f| f == format).unwrap_or(false),
    };

    if matches {
        Ok(bytes)
    } else {
        Err(OptimizeError::codec(label, "encoder output is not a valid file of the requested format"))
    }
}
