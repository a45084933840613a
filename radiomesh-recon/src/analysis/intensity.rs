//! Grayscale intensity and Sobel edge magnitude.
//!
//! - Luma uses Rec. 601 weights, normalized to [0, 1].
//! - Sobel runs on interior pixels only; the one-pixel border stays at zero.

use crate::analysis::field::{EdgeMap, IntensityMap, ScalarField};
use crate::ingest::{ImageSampler, PixelBuffer, SamplerConfig};
use tracing::debug;

type Kernel3 = [[f32; 3]; 3];

const SOBEL_KERNEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_KERNEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Rec. 601 luma of an 8-bit RGB triple, normalized to [0, 1].
#[inline]
pub fn luma([r, g, b]: [u8; 3]) -> f32 {
    ((0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0).clamp(0.0, 1.0)
}

/// Working-resolution image with its derived fields.
#[derive(Debug, Clone)]
pub struct AnalyzedImage {
    /// Downsampled source pixels.
    pub pixels: PixelBuffer,
    pub intensity: IntensityMap,
    pub edges: EdgeMap,
}

impl AnalyzedImage {
    pub fn width(&self) -> usize {
        self.intensity.width()
    }

    pub fn height(&self) -> usize {
        self.intensity.height()
    }
}

/// Derives intensity and edge fields from a pixel buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntensityAnalyzer {
    sampler: ImageSampler,
}

impl IntensityAnalyzer {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            sampler: ImageSampler::new(config),
        }
    }

    /// Downsample `source` and compute its intensity and edge maps.
    #[tracing::instrument(skip_all, fields(width = source.width(), height = source.height()))]
    pub fn analyze(&self, source: &PixelBuffer) -> AnalyzedImage {
        let pixels = self.sampler.sample(source);
        let intensity = intensity_map(&pixels);
        let edges = sobel_magnitude(&intensity);
        let (_, max_edge) = edges.min_max();
        debug!(
            "Analyzed {}x{} working image (mean intensity {:.3}, max edge {:.3})",
            intensity.width(),
            intensity.height(),
            intensity.mean(),
            max_edge
        );
        AnalyzedImage {
            pixels,
            intensity,
            edges,
        }
    }
}

/// Per-pixel normalized luma.
pub fn intensity_map(pixels: &PixelBuffer) -> IntensityMap {
    ScalarField::from_fn(pixels.width() as usize, pixels.height() as usize, |x, y| {
        luma(pixels.rgb(x as u32, y as u32))
    })
}

/// Sobel gradient magnitude `sqrt(gx^2 + gy^2)` at interior pixels.
pub fn sobel_magnitude(intensity: &IntensityMap) -> EdgeMap {
    let (w, h) = intensity.dimensions();
    let mut edges = ScalarField::new(w, h);
    if w < 3 || h < 3 {
        return edges;
    }

    for y in 1..h - 1 {
        let rows = [intensity.row(y - 1), intensity.row(y), intensity.row(y + 1)];
        for x in 1..w - 1 {
            let mut gx = 0.0;
            let mut gy = 0.0;
            for (ky, row) in rows.iter().enumerate() {
                for kx in 0..3 {
                    let v = row[x + kx - 1];
                    gx += v * SOBEL_KERNEL_X[ky][kx];
                    gy += v * SOBEL_KERNEL_Y[ky][kx];
                }
            }
            edges.set(x, y, (gx * gx + gy * gy).sqrt());
        }
    }

    edges
}
