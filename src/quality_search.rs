//! # Quality Search Module
//!
//! Ricerca lineare della qualità di encoding per i formati raster.
//!
//! ## Algoritmo:
//! 1. Encoding alla qualità iniziale della policy
//! 2. Se la dimensione risultante è strettamente minore della sorgente: successo
//! 3. Altrimenti, se `qualità - step >= floor`, riduce la qualità e riprova
//! 4. Se il floor viene superato senza mai battere la sorgente: `Exhausted`
//!
//! La ricerca è lineare e non binaria: le curve rate-distortion degli encoder
//! non sono abbastanza monotone per bisecare, e i candidati sono pochi.
//!
//! La funzione non tocca il filesystem: riceve i byte sorgente e un
//! `RasterCodec`, quindi nei test basta uno stub.

use crate::error::{OptimizeError, Result};
use crate::image_processor::{format_label, RasterCodec};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Start/step/floor of a linear quality search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPolicy {
    pub start: u8,
    pub step: u8,
    pub floor: u8,
    #[serde(default = "default_ceiling")]
    pub ceiling: u8,
}

fn default_ceiling() -> u8 {
    100
}

impl SearchPolicy {
    pub fn new(start: u8, step: u8, floor: u8) -> Self {
        Self {
            start,
            step,
            floor,
            ceiling: default_ceiling(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(OptimizeError::Config("quality step must be greater than 0".into()));
        }
        if self.start < self.floor {
            return Err(OptimizeError::Config(format!(
                "start quality {} is below the floor {}",
                self.start, self.floor
            )));
        }
        if self.start > self.ceiling {
            return Err(OptimizeError::Config(format!(
                "start quality {} is above the ceiling {}",
                self.start, self.ceiling
            )));
        }
        Ok(())
    }

    /// Number of encodes a search makes when nothing beats the source
    pub fn max_attempts(&self) -> usize {
        usize::from((self.start - self.floor) / self.step) + 1
    }

    fn next_quality(&self, current: u8) -> Option<u8> {
        current
            .checked_sub(self.step)
            .filter(|next| *next >= self.floor)
    }
}

/// Whether an attempt beat the source size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Smaller,
    NotSmaller,
}

/// One encode made during a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeAttempt {
    pub format: ImageFormat,
    pub quality: u8,
    pub size: u64,
    pub outcome: AttemptOutcome,
}

#[derive(Debug)]
pub enum SearchOutcome {
    Converged { quality: u8, bytes: Vec<u8> },
    Exhausted,
}

/// Result of a search: every attempt, plus the accepted encoding if any
#[derive(Debug)]
pub struct SearchReport {
    pub format: ImageFormat,
    pub source_size: u64,
    pub attempts: Vec<EncodeAttempt>,
    pub outcome: SearchOutcome,
}

impl SearchReport {
    pub fn is_converged(&self) -> bool {
        matches!(self.outcome, SearchOutcome::Converged { .. })
    }

    pub fn smallest_attempt(&self) -> Option<u64> {
        self.attempts.iter().map(|a| a.size).min()
    }
}

/// Find the highest quality whose encoding is strictly smaller than `source_size`.
///
/// A codec error ends the search for this format and is returned as is.
pub async fn search_quality(
    codec: &dyn RasterCodec,
    source: &[u8],
    source_size: u64,
    format: ImageFormat,
    policy: &SearchPolicy,
) -> Result<SearchReport> {
    policy.validate()?;

    let label = format_label(format);
    let mut attempts = Vec::with_capacity(policy.max_attempts());
    let mut quality = policy.start;

    loop {
        let bytes = codec.encode(source, format, quality).await?;
        let size = bytes.len() as u64;

        if size < source_size {
            attempts.push(EncodeAttempt {
                format,
                quality,
                size,
                outcome: AttemptOutcome::Smaller,
            });
            debug!(
                "{} converged at quality {} ({} bytes, source {} bytes)",
                label, quality, size, source_size
            );
            return Ok(SearchReport {
                format,
                source_size,
                attempts,
                outcome: SearchOutcome::Converged { quality, bytes },
            });
        }

        attempts.push(EncodeAttempt {
            format,
            quality,
            size,
            outcome: AttemptOutcome::NotSmaller,
        });

        match policy.next_quality(quality) {
            Some(next) => {
                debug!(
                    "{} at quality {} is {} bytes (source {} bytes), retrying with quality {}",
                    label, quality, size, source_size, next
                );
                quality = next;
            }
            None => {
                warn!(
                    "{} still not smaller than the source at minimum quality {} ({} attempts)",
                    label,
                    quality,
                    attempts.len()
                );
                return Ok(SearchReport {
                    format,
                    source_size,
                    attempts,
                    outcome: SearchOutcome::Exhausted,
                });
            }
        }
    }
}
