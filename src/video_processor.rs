//! # Video Processing Module
//!
//! Questo modulo gestisce la transcodifica dei video MP4.
//!
//! ## Responsabilità:
//! - Definisce `VideoCodec`, il codec adapter per i video
//! - Transcodifica con FFmpeg usando un set di parametri fisso
//!
//! ## Parametri (default):
//! - Codec video: libx264
//! - CRF: 28
//! - Preset: fast
//! - `-movflags +faststart` per lo streaming progressivo
//! - Audio copiato senza ricodifica
//!
//! Non c'è ricerca di qualità: la ricodifica è costosa e "più piccolo
//! dell'originale" non è un requisito per i video. Se FFmpeg fallisce il
//! chiamante copia il file originale.

use crate::error::{OptimizeError, Result};
use crate::platform::ToolResolver;
use crate::tool_args;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Per-video limit for a transcode
pub const VIDEO_TOOL_TIMEOUT: Duration = Duration::from_secs(900);

/// Fixed encode parameters for video transcodes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoParams {
    pub codec: String,
    /// Constant rate factor (0-51, lower = better quality)
    pub crf: u8,
    pub preset: String,
    /// Move the moov atom to the front for progressive playback
    pub faststart: bool,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            crf: 28,
            preset: "fast".to_string(),
            faststart: true,
        }
    }
}

/// Transcodes a video file into `dest`
#[async_trait]
pub trait VideoCodec: Send + Sync {
    async fn transcode(&self, source: &Path, dest: &Path, params: &VideoParams) -> Result<()>;
}

/// Video codec backed by the ffmpeg CLI
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    tools: ToolResolver,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(tools: ToolResolver) -> Self {
        Self {
            tools,
            timeout: VIDEO_TOOL_TIMEOUT,
        }
    }

    /// Command line for one transcode. The container is forced because the
    /// destination is a temporary file without an `.mp4` extension.
    pub fn ffmpeg_args(source: &Path, dest: &Path, params: &VideoParams) -> Vec<OsString> {
        let mut args = tool_args![
            "-hide_banner",
            "-loglevel", "error",
            "-y",
            "-i", source,
            "-c:v", params.codec.clone(),
            "-crf", params.crf,
            "-preset", params.preset.clone(),
            "-c:a", "copy",
        ];
        if params.faststart {
            args.extend(tool_args!["-movflags", "+faststart"]);
        }
        args.extend(tool_args!["-f", "mp4", dest]);
        args
    }
}

#[async_trait]
impl VideoCodec for FfmpegTranscoder {
    async fn transcode(&self, source: &Path, dest: &Path, params: &VideoParams) -> Result<()> {
        debug!(
            "Transcoding {} (codec: {}, CRF: {}, preset: {})",
            source.display(),
            params.codec,
            params.crf,
            params.preset
        );

        let args = Self::ffmpeg_args(source, dest, params);
        self.tools.run("ffmpeg", &args, self.timeout).await?;

        let metadata = tokio::fs::metadata(dest)
            .await
            .map_err(|e| OptimizeError::io(dest, e))?;
        if metadata.len() == 0 {
            return Err(OptimizeError::codec("mp4", "ffmpeg produced an empty file"));
        }
        Ok(())
    }
}
