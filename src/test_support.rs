//! Deterministic adapters for tests. Every stub counts its calls.

use crate::error::{OptimizeError, Result};
use crate::image_processor::{format_label, RasterCodec};
use crate::optimizer::Adapters;
use crate::text_processor::TextTransform;
use crate::video_processor::{VideoCodec, VideoParams};
use async_trait::async_trait;
use image::ImageFormat;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type SizeFn = dyn Fn(ImageFormat, u8) -> std::result::Result<usize, String> + Send + Sync;

/// Raster codec whose output size is a function of format and quality
pub struct StubRasterCodec {
    size_for: Box<SizeFn>,
    calls: AtomicUsize,
}

impl StubRasterCodec {
    pub fn new(
        size_for: impl Fn(ImageFormat, u8) -> std::result::Result<usize, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            size_for: Box::new(size_for),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fixed(size: usize) -> Self {
        Self::new(move |_, _| Ok(size))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RasterCodec for StubRasterCodec {
    async fn encode(&self, _source: &[u8], format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let size = (self.size_for)(format, quality)
            .map_err(|message| OptimizeError::codec(format_label(format), message))?;
        Ok(vec![0u8; size])
    }
}

/// Video codec that either always fails or writes a fixed payload
pub struct StubVideoCodec {
    output: Option<Vec<u8>>,
    calls: AtomicUsize,
}

impl StubVideoCodec {
    pub fn failing() -> Self {
        Self {
            output: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn producing(output: &[u8]) -> Self {
        Self {
            output: Some(output.to_vec()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoCodec for StubVideoCodec {
    async fn transcode(&self, _source: &Path, dest: &Path, _params: &VideoParams) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.output {
            Some(bytes) => tokio::fs::write(dest, bytes)
                .await
                .map_err(|e| OptimizeError::io(dest, e)),
            None => Err(OptimizeError::Tool {
                tool: "ffmpeg".into(),
                message: "moov atom not found".into(),
            }),
        }
    }
}

/// Text transform that collapses whitespace and rejects inputs containing a marker
pub struct StubTransform {
    reject_marker: Option<String>,
    calls: AtomicUsize,
}

impl StubTransform {
    pub fn minifying() -> Self {
        Self {
            reject_marker: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(marker: &str) -> Self {
        Self {
            reject_marker: Some(marker.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextTransform for StubTransform {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn transform(&self, source: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.reject_marker {
            if source.contains(marker.as_str()) {
                return Err(OptimizeError::Minify(format!("Unexpected token near '{}'", marker)));
            }
        }
        Ok(source.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Handles on the stubs wired into an `Adapters`
pub struct Stubs {
    pub raster: Arc<StubRasterCodec>,
    pub video: Arc<StubVideoCodec>,
    pub text: Arc<StubTransform>,
}

impl Stubs {
    pub fn new(raster: StubRasterCodec, video: StubVideoCodec, text: StubTransform) -> Self {
        Self {
            raster: Arc::new(raster),
            video: Arc::new(video),
            text: Arc::new(text),
        }
    }

    /// Every raster format converges, video and text succeed
    pub fn converging() -> Self {
        Self::new(
            StubRasterCodec::fixed(100),
            StubVideoCodec::producing(b"transcoded"),
            StubTransform::minifying(),
        )
    }

    pub fn adapters(&self) -> Adapters {
        Adapters {
            raster: self.raster.clone(),
            video: self.video.clone(),
            svg: self.text.clone(),
            html: self.text.clone(),
            script: self.text.clone(),
        }
    }
}
