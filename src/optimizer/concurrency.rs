//! # Concurrency Module
//!
//! Limita il numero di encode contemporanei con due semafori:
//! - `workers` permessi per immagini, SVG, HTML e JS
//! - `video_workers` permessi (default 1) per le transcodifiche video
//!
//! Solo i File Task prendono permessi, mai il walker: la ricorsione non può
//! andare in deadlock. Le copie verbatim non prendono permessi.

use crate::error::{OptimizeError, Result};
use crate::file_manager::FileKind;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ConcurrencyManager {
    encode_semaphore: Arc<Semaphore>,
    video_semaphore: Arc<Semaphore>,
}

impl ConcurrencyManager {
    pub fn new(workers: usize, video_workers: usize) -> Self {
        info!("Concurrency configuration:");
        info!("  • Images, SVG, HTML, JS: {} concurrent workers", workers);
        info!("  • Videos: {} concurrent workers", video_workers);

        Self {
            encode_semaphore: Arc::new(Semaphore::new(workers)),
            video_semaphore: Arc::new(Semaphore::new(video_workers)),
        }
    }

    /// Permit for a file of this kind; `None` when the kind runs unthrottled
    pub async fn acquire(&self, kind: FileKind) -> Result<Option<OwnedSemaphorePermit>> {
        let semaphore = match kind {
            FileKind::Opaque => return Ok(None),
            FileKind::Video => &self.video_semaphore,
            _ => &self.encode_semaphore,
        };

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| OptimizeError::Setup(format!("worker pool closed: {}", e)))?;
        debug!("Acquired {} permit", kind.label());
        Ok(Some(permit))
    }

    pub fn available_encode_permits(&self) -> usize {
        self.encode_semaphore.available_permits()
    }

    pub fn available_video_permits(&self) -> usize {
        self.video_semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    #[tokio::test]
    async fn test_permits_per_kind() {
        let manager = ConcurrencyManager::new(2, 1);

        let opaque = manager.acquire(FileKind::Opaque).await.unwrap();
        assert!(opaque.is_none());
        assert_eq!(manager.available_encode_permits(), 2);

        let image = manager
            .acquire(FileKind::Raster(ImageFormat::Png))
            .await
            .unwrap();
        assert!(image.is_some());
        assert_eq!(manager.available_encode_permits(), 1);

        let video = manager.acquire(FileKind::Video).await.unwrap();
        assert!(video.is_some());
        assert_eq!(manager.available_video_permits(), 0);

        drop(image);
        drop(video);
        assert_eq!(manager.available_encode_permits(), 2);
        assert_eq!(manager.available_video_permits(), 1);
    }

    #[tokio::test]
    async fn test_video_is_serialized() {
        let manager = ConcurrencyManager::new(4, 1);
        let _first = manager.acquire(FileKind::Video).await.unwrap();

        let second = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            manager.acquire(FileKind::Video),
        )
        .await;
        assert!(second.is_err());
    }
}
