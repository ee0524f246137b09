//! # Task Optimizer Module
//!
//! Il File Task: elabora un singolo file sorgente e produce zero o più
//! artifact nella directory di destinazione.
//!
//! ## Politica per tipo:
//! - **Raster**: artifact primario (stesso nome) + `.webp` + `.avif`, ognuno
//!   deciso in modo indipendente con la quality search. Le tre ricerche
//!   girano in parallelo. Primario non ottimizzabile → copia verbatim;
//!   derivato non ottimizzabile → scartato (ed eventuale file vecchio rimosso).
//! - **SVG / HTML / JS**: trasformazione testuale, in caso di errore copia
//!   verbatim (`FellBack`).
//! - **Video**: transcodifica singola, in caso di errore copia verbatim.
//! - **Altro**: copia verbatim.
//!
//! Con `skip_existing` attivo un artifact già presente non viene rigenerato
//! e nessun codec viene invocato per lui.
//!
//! Un formato derivato il cui path appartiene a un altro file della stessa
//! directory (vedi `DirectoryClaims`) non viene né generato né rimosso.
//!
//! Gli errori non escono mai dal task: vengono convertiti in `TaskResult`.

use crate::{
    config::{ImageQuality, PassKind},
    error::{OptimizeError, Result},
    file_manager::{FileKind, FileManager},
    image_processor::{format_label, ExternalRasterCodec, RasterCodec},
    optimizer::{
        concurrency::ConcurrencyManager,
        path_resolver::{DirectoryClaims, PathResolver, PlannedArtifact},
    },
    platform::ToolResolver,
    quality_search::{search_quality, SearchOutcome},
    report::{Artifact, ArtifactOutcome, FileOutcome, TaskResult},
    text_processor::{HtmlMinifier, ScriptMinifier, SvgOptimizer, TextTransform},
    video_processor::{FfmpegTranscoder, VideoCodec, VideoParams},
};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// The codec and transform bindings a build uses
#[derive(Clone)]
pub struct Adapters {
    pub raster: Arc<dyn RasterCodec>,
    pub video: Arc<dyn VideoCodec>,
    pub svg: Arc<dyn TextTransform>,
    pub html: Arc<dyn TextTransform>,
    pub script: Arc<dyn TextTransform>,
}

impl Adapters {
    /// Production bindings backed by external tools
    pub fn external(tools: &ToolResolver) -> Self {
        Self {
            raster: Arc::new(ExternalRasterCodec::new(tools.clone())),
            video: Arc::new(FfmpegTranscoder::new(tools.clone())),
            svg: Arc::new(SvgOptimizer::new(tools.clone())),
            html: Arc::new(HtmlMinifier::new(tools.clone())),
            script: Arc::new(ScriptMinifier::new(tools.clone())),
        }
    }
}

/// Worker for a single source file of one pass
#[derive(Clone)]
pub struct TaskOptimizer {
    pass: PassKind,
    adapters: Adapters,
    quality: Arc<ImageQuality>,
    video: Arc<VideoParams>,
    skip_existing: bool,
    concurrency: ConcurrencyManager,
}

impl TaskOptimizer {
    pub fn new(
        pass: PassKind,
        adapters: Adapters,
        quality: ImageQuality,
        video: VideoParams,
        skip_existing: bool,
        concurrency: ConcurrencyManager,
    ) -> Self {
        Self {
            pass,
            adapters,
            quality: Arc::new(quality),
            video: Arc::new(video),
            skip_existing,
            concurrency,
        }
    }

    /// How this pass treats `source`; `None` means it is ignored
    pub fn classify(&self, source: &Path) -> Option<FileKind> {
        FileKind::classify(source, self.pass)
    }

    /// Process a file and describe the outcome
    pub async fn run(&self, source: &Path, dest_dir: &Path, claims: &DirectoryClaims) -> FileOutcome {
        let kind = self.classify(source).map(|k| k.label()).unwrap_or("file");
        let source_size = tokio::fs::metadata(source)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        let result = self.process(source, dest_dir, claims).await;

        FileOutcome {
            source: source.to_path_buf(),
            kind,
            source_size,
            result,
        }
    }

    /// Produce the artifacts of `source` inside `dest_dir`
    pub async fn process(&self, source: &Path, dest_dir: &Path, claims: &DirectoryClaims) -> TaskResult {
        let Some(kind) = self.classify(source) else {
            return TaskResult::Skipped("not handled by this pass".into());
        };

        let dest = match PathResolver::dest_for(source, dest_dir) {
            Ok(dest) => dest,
            Err(e) => return failed(source, e),
        };

        match kind {
            FileKind::Raster(format) => self.process_raster(source, &dest, format, claims).await,
            other => {
                if self.skip_existing && FileManager::exists(&dest).await {
                    debug!("Skipping {}, output exists: {}", source.display(), dest.display());
                    return TaskResult::Skipped("destination exists".into());
                }

                let _permit = match self.concurrency.acquire(other).await {
                    Ok(permit) => permit,
                    Err(e) => return failed(source, e),
                };

                match other {
                    FileKind::Vector => self.process_text(source, &dest, &*self.adapters.svg).await,
                    FileKind::Markup => self.process_text(source, &dest, &*self.adapters.html).await,
                    FileKind::Script => self.process_text(source, &dest, &*self.adapters.script).await,
                    FileKind::Video => self.process_video(source, &dest).await,
                    _ => self.process_opaque(source, &dest).await,
                }
            }
        }
    }

    async fn process_raster(
        &self,
        source: &Path,
        dest: &Path,
        format: image::ImageFormat,
        claims: &DirectoryClaims,
    ) -> TaskResult {
        let plan = PathResolver::raster_plan(dest, format);
        let source_name = source.file_name().unwrap_or_default();

        let mut steps = Vec::with_capacity(plan.len());
        for artifact in &plan {
            let owner = if artifact.primary {
                None
            } else {
                artifact
                    .path
                    .file_name()
                    .and_then(|name| claims.owner_of(source_name, name))
            };
            let step = match owner {
                Some(owner) => Step::Claimed(source.with_file_name(owner)),
                None => {
                    if self.skip_existing && FileManager::exists(&artifact.path).await {
                        Step::Present
                    } else {
                        Step::Produce
                    }
                }
            };
            steps.push(step);
        }
        if !steps.iter().any(|step| matches!(step, Step::Produce)) {
            debug!("Skipping {}, every artifact exists", source.display());
            return TaskResult::Skipped("all artifacts exist".into());
        }

        let bytes = match tokio::fs::read(source).await {
            Ok(bytes) => bytes,
            Err(e) => return failed(source, OptimizeError::io(source, e)),
        };
        let source_size = bytes.len() as u64;

        let _permit = match self.concurrency.acquire(FileKind::Raster(format)).await {
            Ok(permit) => permit,
            Err(e) => return failed(source, e),
        };

        let outcomes = join_all(plan.iter().zip(steps).map(|(artifact, step)| {
            let bytes = &bytes;
            async move {
                match step {
                    Step::Claimed(owner) => Ok(ArtifactOutcome::Claimed {
                        path: artifact.path.clone(),
                        owner,
                    }),
                    Step::Present => Ok(ArtifactOutcome::Skipped(artifact.path.clone())),
                    Step::Produce => {
                        self.produce_raster_artifact(source, bytes, source_size, artifact)
                            .await
                    }
                }
            }
        }))
        .await;

        match outcomes.into_iter().collect::<Result<Vec<_>>>() {
            Ok(outcomes) => TaskResult::Produced(outcomes),
            Err(e) => failed(source, e),
        }
    }

    /// Search, then write, copy or drop one planned artifact.
    /// Only I/O errors on the destination come back as `Err`.
    async fn produce_raster_artifact(
        &self,
        source: &Path,
        bytes: &[u8],
        source_size: u64,
        artifact: &PlannedArtifact,
    ) -> Result<ArtifactOutcome> {
        let policy = self.quality.for_format(artifact.format);
        let label = format_label(artifact.format);

        let reason = match search_quality(
            &*self.adapters.raster,
            bytes,
            source_size,
            artifact.format,
            policy,
        )
        .await
        {
            Ok(report) => match report.outcome {
                SearchOutcome::Converged { quality, bytes } => {
                    let size = FileManager::write_atomic(&artifact.path, &bytes).await?;
                    debug!(
                        "{}: {} at quality {} ({} -> {})",
                        source.display(),
                        label,
                        quality,
                        FileManager::format_size(source_size),
                        FileManager::format_size(size)
                    );
                    return Ok(ArtifactOutcome::Written(Artifact::new(&artifact.path, size)));
                }
                SearchOutcome::Exhausted => format!(
                    "{} not smaller than the source down to quality {} ({} attempts)",
                    label,
                    policy.floor,
                    report.attempts.len()
                ),
            },
            Err(e) => {
                debug!("{}: {} encoder error: {}", source.display(), label, e);
                e.to_string()
            }
        };

        if artifact.primary {
            let size = FileManager::copy_verbatim(source, &artifact.path).await?;
            Ok(ArtifactOutcome::Copied {
                artifact: Artifact::new(&artifact.path, size),
                reason,
            })
        } else {
            FileManager::remove_stale(&artifact.path).await?;
            Ok(ArtifactOutcome::Dropped {
                path: artifact.path.clone(),
                reason,
            })
        }
    }

    async fn process_text(
        &self,
        source: &Path,
        dest: &Path,
        transform: &dyn TextTransform,
    ) -> TaskResult {
        let bytes = match tokio::fs::read(source).await {
            Ok(bytes) => bytes,
            Err(e) => return failed(source, OptimizeError::io(source, e)),
        };

        let transformed = match String::from_utf8(bytes) {
            Ok(text) => transform.transform(&text).await,
            Err(_) => Err(OptimizeError::Minify("input is not valid UTF-8".into())),
        };

        match transformed {
            Ok(output) => match FileManager::write_atomic(dest, output.as_bytes()).await {
                Ok(size) => TaskResult::Produced(vec![ArtifactOutcome::Written(Artifact::new(
                    dest, size,
                ))]),
                Err(e) => failed(source, e),
            },
            Err(e) => self.fall_back(source, dest, e).await,
        }
    }

    async fn process_video(&self, source: &Path, dest: &Path) -> TaskResult {
        let temp = match FileManager::temp_beside(dest) {
            Ok(temp) => temp,
            Err(e) => return failed(source, e),
        };

        match self.adapters.video.transcode(source, temp.path(), &self.video).await {
            Ok(()) => match FileManager::commit(temp, dest).await {
                Ok(size) => TaskResult::Produced(vec![ArtifactOutcome::Written(Artifact::new(
                    dest, size,
                ))]),
                Err(e) => failed(source, e),
            },
            Err(e) => {
                drop(temp);
                self.fall_back(source, dest, e).await
            }
        }
    }

    async fn process_opaque(&self, source: &Path, dest: &Path) -> TaskResult {
        match FileManager::copy_verbatim(source, dest).await {
            Ok(size) => TaskResult::Produced(vec![ArtifactOutcome::Written(Artifact::new(dest, size))]),
            Err(e) => failed(source, e),
        }
    }

    /// Verbatim copy after a failed transform
    async fn fall_back(&self, source: &Path, dest: &Path, error: OptimizeError) -> TaskResult {
        match FileManager::copy_verbatim(source, dest).await {
            Ok(size) => TaskResult::FellBack {
                artifact: Artifact::new(dest, size),
                reason: error.to_string(),
            },
            Err(copy_error) => TaskResult::Failed(format!(
                "{}: {} (fallback copy failed: {})",
                source.display(),
                error,
                copy_error
            )),
        }
    }
}

/// What happens to one planned raster artifact
enum Step {
    /// Path owned by another file of the directory
    Claimed(PathBuf),
    Present,
    Produce,
}

fn failed(source: &Path, error: OptimizeError) -> TaskResult {
    TaskResult::Failed(format!("{}: {}", source.display(), error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubRasterCodec, StubTransform, StubVideoCodec, Stubs};
    use image::ImageFormat;
    use std::ffi::OsString;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn task(pass: PassKind, stubs: &Stubs, skip_existing: bool) -> TaskOptimizer {
        TaskOptimizer::new(
            pass,
            stubs.adapters(),
            ImageQuality::default(),
            VideoParams::default(),
            skip_existing,
            ConcurrencyManager::new(2, 1),
        )
    }

    fn no_claims() -> DirectoryClaims {
        DirectoryClaims::default()
    }

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let out = temp_dir.path().join("out");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&out).unwrap();
        (temp_dir, src, out)
    }

    #[tokio::test]
    async fn test_raster_keeps_only_smaller_derived_formats() {
        let (_tmp, src, out) = fixture();
        let source = src.join("a.png");
        std::fs::write(&source, vec![1u8; 10_000]).unwrap();

        let stubs = Stubs::new(
            StubRasterCodec::new(|format, quality| {
                Ok(match format {
                    ImageFormat::Png => 8_000,
                    ImageFormat::WebP if quality >= 70 => 12_000,
                    ImageFormat::WebP => 9_000,
                    _ => 11_000,
                })
            }),
            StubVideoCodec::failing(),
            StubTransform::minifying(),
        );
        std::fs::write(out.join("a.avif"), b"stale").unwrap();

        let result = task(PassKind::Assets, &stubs, true).process(&source, &out, &no_claims()).await;

        let TaskResult::Produced(outcomes) = result else {
            panic!("unexpected result: {:?}", result);
        };
        assert_eq!(outcomes[0], ArtifactOutcome::Written(Artifact::new(out.join("a.png"), 8_000)));
        assert_eq!(outcomes[1], ArtifactOutcome::Written(Artifact::new(out.join("a.webp"), 9_000)));
        assert!(matches!(outcomes[2], ArtifactOutcome::Skipped(_)));

        assert_eq!(std::fs::metadata(out.join("a.webp")).unwrap().len(), 9_000);
        // stale avif is an existing artifact in skip-existing mode
        assert_eq!(std::fs::read(out.join("a.avif")).unwrap(), b"stale");
    }

    #[tokio::test]
    async fn test_claimed_derived_path_is_left_alone() {
        let (_tmp, src, out) = fixture();
        let source = src.join("a.png");
        std::fs::write(&source, vec![1u8; 1_000]).unwrap();
        std::fs::write(src.join("a.webp"), b"RIFF-source").unwrap();
        // the copy pass of a.webp already landed
        std::fs::write(out.join("a.webp"), b"RIFF-source").unwrap();

        // webp never beats the source, so an owned path would be dropped
        let stubs = Stubs::new(
            StubRasterCodec::new(|format, _| Ok(if format == ImageFormat::WebP { 5_000 } else { 10 })),
            StubVideoCodec::failing(),
            StubTransform::minifying(),
        );
        let claims = DirectoryClaims::new(&[
            (OsString::from("a.png"), Some(ImageFormat::Png)),
            (OsString::from("a.webp"), None),
        ]);

        let result = task(PassKind::Assets, &stubs, false)
            .process(&source, &out, &claims)
            .await;

        let TaskResult::Produced(outcomes) = &result else {
            panic!("unexpected result: {:?}", result);
        };
        assert_eq!(
            outcomes[1],
            ArtifactOutcome::Claimed {
                path: out.join("a.webp"),
                owner: src.join("a.webp"),
            }
        );
        assert!(matches!(outcomes[2], ArtifactOutcome::Written(_)));
        assert_eq!(std::fs::read(out.join("a.webp")).unwrap(), b"RIFF-source");
        // png and avif searched, webp never
        assert_eq!(stubs.raster.calls(), 2);
        assert_eq!(result.dropped_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_derived_is_dropped_and_stale_removed() {
        let (_tmp, src, out) = fixture();
        let source = src.join("b.jpg");
        std::fs::write(&source, vec![1u8; 500]).unwrap();
        std::fs::write(out.join("b.avif"), b"stale").unwrap();

        let stubs = Stubs::new(
            StubRasterCodec::new(|format, _| {
                Ok(if format == ImageFormat::Avif { 900 } else { 400 })
            }),
            StubVideoCodec::failing(),
            StubTransform::minifying(),
        );

        let result = task(PassKind::Assets, &stubs, false).process(&source, &out, &no_claims()).await;

        let TaskResult::Produced(outcomes) = &result else {
            panic!("unexpected result: {:?}", result);
        };
        assert!(matches!(outcomes[2], ArtifactOutcome::Dropped { .. }));
        assert!(!out.join("b.avif").exists());
        assert!(out.join("b.webp").exists());
        assert_eq!(result.dropped_count(), 1);
        // jpeg 1 attempt, webp 1 attempt, avif (45-20)/10+1 = 3 attempts
        assert_eq!(stubs.raster.calls(), 5);
    }

    #[tokio::test]
    async fn test_primary_falls_back_to_copy() {
        let (_tmp, src, out) = fixture();
        let source = src.join("c.png");
        std::fs::write(&source, vec![3u8; 64]).unwrap();

        let stubs = Stubs::new(
            StubRasterCodec::new(|_, _| Err("pngquant: quality too low".to_string())),
            StubVideoCodec::failing(),
            StubTransform::minifying(),
        );

        let result = task(PassKind::Assets, &stubs, true).process(&source, &out, &no_claims()).await;

        let TaskResult::Produced(outcomes) = &result else {
            panic!("unexpected result: {:?}", result);
        };
        assert!(matches!(outcomes[0], ArtifactOutcome::Copied { .. }));
        assert_eq!(std::fs::read(out.join("c.png")).unwrap(), vec![3u8; 64]);
        assert!(!out.join("c.webp").exists());
        assert!(!result.is_failure());
    }

    #[tokio::test]
    async fn test_all_artifacts_present_skips_without_codec() {
        let (_tmp, src, out) = fixture();
        let source = src.join("d.png");
        std::fs::write(&source, vec![1u8; 100]).unwrap();
        for name in ["d.png", "d.webp", "d.avif"] {
            std::fs::write(out.join(name), b"x").unwrap();
        }

        let stubs = Stubs::converging();
        let result = task(PassKind::Assets, &stubs, true).process(&source, &out, &no_claims()).await;

        assert!(matches!(result, TaskResult::Skipped(_)));
        assert_eq!(stubs.raster.calls(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_raster_fails_naming_source() {
        let (_tmp, src, out) = fixture();
        let source = src.join("missing.png");

        let stubs = Stubs::converging();
        let result = task(PassKind::Assets, &stubs, true).process(&source, &out, &no_claims()).await;

        match result {
            TaskResult::Failed(message) => assert!(message.contains("missing.png")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_script_syntax_error_falls_back() {
        let (_tmp, src, out) = fixture();
        let source = src.join("app.js");
        let content = b"function broken( { syntax error\n";
        std::fs::write(&source, content).unwrap();

        let stubs = Stubs::new(
            StubRasterCodec::fixed(1),
            StubVideoCodec::failing(),
            StubTransform::rejecting("syntax error"),
        );

        let result = task(PassKind::Scripts, &stubs, true).process(&source, &out, &no_claims()).await;

        assert!(matches!(result, TaskResult::FellBack { .. }));
        assert_eq!(std::fs::read(out.join("app.js")).unwrap(), content);
    }

    #[tokio::test]
    async fn test_non_utf8_markup_falls_back_without_transform() {
        let (_tmp, src, out) = fixture();
        let source = src.join("index.html");
        std::fs::write(&source, [0xff, 0xfe, 0x00]).unwrap();

        let stubs = Stubs::converging();
        let result = task(PassKind::Markup, &stubs, true).process(&source, &out, &no_claims()).await;

        assert!(matches!(result, TaskResult::FellBack { .. }));
        assert_eq!(stubs.text.calls(), 0);
        assert_eq!(std::fs::read(out.join("index.html")).unwrap(), [0xff, 0xfe, 0x00]);
    }

    #[tokio::test]
    async fn test_markup_is_minified() {
        let (_tmp, src, out) = fixture();
        let source = src.join("index.html");
        std::fs::write(&source, "<p>\n    hello\n</p>\n").unwrap();

        let stubs = Stubs::converging();
        let result = task(PassKind::Markup, &stubs, true).process(&source, &out, &no_claims()).await;

        assert!(matches!(result, TaskResult::Produced(_)));
        assert_eq!(std::fs::read_to_string(out.join("index.html")).unwrap(), "<p> hello </p>");
    }

    #[tokio::test]
    async fn test_failing_video_is_copied() {
        let (_tmp, src, out) = fixture();
        let source = src.join("intro.mp4");
        std::fs::write(&source, b"original video").unwrap();

        let stubs = Stubs::new(
            StubRasterCodec::fixed(1),
            StubVideoCodec::failing(),
            StubTransform::minifying(),
        );
        let result = task(PassKind::Assets, &stubs, true).process(&source, &out, &no_claims()).await;

        assert!(matches!(result, TaskResult::FellBack { .. }));
        assert_eq!(std::fs::read(out.join("intro.mp4")).unwrap(), b"original video");
        // only the final file is left behind
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_video_transcode_is_committed() {
        let (_tmp, src, out) = fixture();
        let source = src.join("intro.MP4");
        std::fs::write(&source, b"original video").unwrap();

        let stubs = Stubs::converging();
        let result = task(PassKind::Assets, &stubs, true).process(&source, &out, &no_claims()).await;

        assert!(matches!(result, TaskResult::Produced(_)));
        assert_eq!(std::fs::read(out.join("intro.MP4")).unwrap(), b"transcoded");
        assert_eq!(stubs.video.calls(), 1);
    }

    #[tokio::test]
    async fn test_existing_single_artifact_is_skipped() {
        let (_tmp, src, out) = fixture();
        let source = src.join("logo.svg");
        std::fs::write(&source, "<svg/>").unwrap();
        std::fs::write(out.join("logo.svg"), "<svg></svg>").unwrap();

        let stubs = Stubs::converging();
        let result = task(PassKind::Assets, &stubs, true).process(&source, &out, &no_claims()).await;
        assert!(matches!(result, TaskResult::Skipped(_)));
        assert_eq!(stubs.text.calls(), 0);

        let fresh = task(PassKind::Assets, &stubs, false).process(&source, &out, &no_claims()).await;
        assert!(matches!(fresh, TaskResult::Produced(_)));
        assert_eq!(std::fs::read_to_string(out.join("logo.svg")).unwrap(), "<svg/>");
    }

    #[tokio::test]
    async fn test_copy_pass_never_transforms() {
        let (_tmp, src, out) = fixture();
        let source = src.join("inter.woff2");
        std::fs::write(&source, b"wOF2").unwrap();

        let stubs = Stubs::converging();
        let outcome = task(PassKind::Copy, &stubs, true).run(&source, &out, &no_claims()).await;

        assert_eq!(outcome.kind, "file");
        assert_eq!(outcome.source_size, 4);
        assert!(matches!(outcome.result, TaskResult::Produced(_)));
        assert_eq!(std::fs::read(out.join("inter.woff2")).unwrap(), b"wOF2");
    }
}
