//! Downsampling to a bounded working resolution

use crate::ingest::PixelBuffer;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sampler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Largest allowed width or height of the working image.
    pub max_dimension: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { max_dimension: 320 }
    }
}

/// Reduces a source image to the working resolution, preserving aspect ratio.
///
/// Every call allocates its own output buffer, so one sampler can serve
/// concurrent requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSampler {
    config: SamplerConfig,
}

impl ImageSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Working dimensions for a `width x height` source.
    pub fn working_size(&self, width: u32, height: u32) -> (u32, u32) {
        let max_dim = self.config.max_dimension.max(1);
        let largest = width.max(height);
        if largest <= max_dim {
            return (width, height);
        }
        let scale = max_dim as f32 / largest as f32;
        let w = ((width as f32 * scale).round() as u32).clamp(1, max_dim);
        let h = ((height as f32 * scale).round() as u32).clamp(1, max_dim);
        (w, h)
    }

    /// Downsample `source` to the working resolution.
    #[tracing::instrument(skip_all, fields(width = source.width(), height = source.height()))]
    pub fn sample(&self, source: &PixelBuffer) -> PixelBuffer {
        let (w, h) = self.working_size(source.width(), source.height());
        if (w, h) == source.dimensions() {
            return source.clone();
        }
        debug!(
            "Downsampling {}x{} -> {}x{}",
            source.width(),
            source.height(),
            w,
            h
        );
        let resized = imageops::resize(source.as_image(), w, h, FilterType::Triangle);
        // resize never yields a zero dimension for w, h >= 1
        PixelBuffer::from_rgb_image(resized).unwrap_or_else(|_| source.clone())
    }
}
