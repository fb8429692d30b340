//! Mixer meter blob layout
//!
//! After the codec strips the blob's big-endian size, a `meters/6` blob is a
//! little-endian `i32` sample count followed by that many little-endian
//! `f32` samples. For a single-channel subscription, sample 0 is the
//! pre-fader level and sample 3 the post-fader level.

use crate::error::{Result, StateError};

/// Parsed meter samples.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterBlob {
    pub samples: Vec<f32>,
}

impl MeterBlob {
    /// Parse a blob. A declared count larger than the data is clamped to the
    /// samples actually present.
    pub fn parse(blob: &[u8]) -> Result<Self> {
        let header: [u8; 4] = blob
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| StateError::Parse(format!("meter blob too short ({} bytes)", blob.len())))?;
        let declared = usize::try_from(i32::from_le_bytes(header)).unwrap_or(0);

        let samples: Vec<f32> = blob[4..]
            .chunks_exact(4)
            .take(declared)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        if samples.len() < declared {
            tracing::debug!(
                "Meter blob declares {} samples but carries {}",
                declared,
                samples.len()
            );
        }

        Ok(Self { samples })
    }

    /// Read the level selected by `tap`.
    pub fn level(&self, tap: MeterTap) -> Option<f32> {
        match tap {
            MeterTap::Mono(i) => self.samples.get(i).copied(),
            MeterTap::Stereo(l, r) => {
                let l = self.samples.get(l)?;
                let r = self.samples.get(r)?;
                Some((l + r) / 2.0)
            }
        }
    }
}

/// Which sample(s) of the blob represent the watched channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterTap {
    /// One sample
    Mono(usize),
    /// Average of two samples
    Stereo(usize, usize),
}

impl Default for MeterTap {
    fn default() -> Self {
        MeterTap::Mono(0)
    }
}
