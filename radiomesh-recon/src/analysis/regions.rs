//! Homogeneous region extraction by constrained flood growth.
//!
//! Seeds are visited in raster order on a fixed stride. Growth steps by
//! `grow_stride` in four directions while the intensity stays within
//! tolerance of the seed and no strong edge is crossed. Region size is capped;
//! pixels queued when a region hits the cap remain available to later seeds.

use crate::analysis::field::{EdgeMap, IntensityMap};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Region growing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionParams {
    /// Distance between candidate seeds, in pixels.
    pub seed_stride: usize,
    /// Step between grown pixels, in pixels.
    pub grow_stride: usize,
    /// Maximum `|intensity - seed intensity|` accepted during growth.
    pub intensity_tolerance: f32,
    /// Edge magnitude above which growth stops.
    pub edge_stop: f32,
    /// Seeds darker than this are skipped.
    pub min_seed_intensity: f32,
    pub max_region_pixels: usize,
    pub min_region_pixels: usize,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self {
            seed_stride: 4,
            grow_stride: 2,
            intensity_tolerance: 0.15,
            edge_stop: 0.5,
            min_seed_intensity: 0.10,
            max_region_pixels: 2000,
            min_region_pixels: 20,
        }
    }
}

/// Inclusive pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl RegionBounds {
    fn point(x: usize, y: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> usize {
        self.max_y - self.min_y + 1
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }
}

/// A connected homogeneous region. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Member pixels in visit order.
    pub pixels: Vec<(usize, usize)>,
    pub bounds: RegionBounds,
    /// Mean pixel position.
    pub centroid: Vec2,
    pub average_intensity: f32,
}

impl Region {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// Segments an intensity field into homogeneous regions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionExtractor {
    params: RegionParams,
}

impl RegionExtractor {
    pub fn new(params: RegionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RegionParams {
        &self.params
    }

    /// Extract all regions. Identical input yields identical output.
    #[tracing::instrument(skip_all, fields(width = intensity.width(), height = intensity.height()))]
    pub fn extract(&self, intensity: &IntensityMap, edges: &EdgeMap) -> Vec<Region> {
        let (w, h) = intensity.dimensions();
        let seed_stride = self.params.seed_stride.max(1);
        let mut visited = vec![false; w * h];
        let mut regions = Vec::new();
        let mut discarded = 0usize;

        for sy in (0..h).step_by(seed_stride) {
            for sx in (0..w).step_by(seed_stride) {
                if visited[sy * w + sx] {
                    continue;
                }
                if intensity.get(sx, sy) < self.params.min_seed_intensity {
                    continue;
                }
                let pixels = self.grow(intensity, edges, &mut visited, sx, sy);
                if pixels.len() < self.params.min_region_pixels {
                    discarded += 1;
                    continue;
                }
                regions.push(build_region(intensity, pixels));
            }
        }

        debug!(
            "Extracted {} regions ({} undersized discarded)",
            regions.len(),
            discarded
        );
        regions
    }

    fn grow(
        &self,
        intensity: &IntensityMap,
        edges: &EdgeMap,
        visited: &mut [bool],
        sx: usize,
        sy: usize,
    ) -> Vec<(usize, usize)> {
        let (w, h) = intensity.dimensions();
        let step = self.params.grow_stride.max(1) as isize;
        let seed_value = intensity.get(sx, sy);
        let mut pixels = Vec::new();
        let mut stack = vec![(sx, sy)];
        visited[sy * w + sx] = true;

        while let Some((x, y)) = stack.pop() {
            pixels.push((x, y));
            if pixels.len() >= self.params.max_region_pixels {
                // pending pixels stay free to seed or join later regions
                for (px, py) in stack.drain(..) {
                    visited[py * w + px] = false;
                }
                break;
            }
            for (dx, dy) in [(step, 0), (-step, 0), (0, step), (0, -step)] {
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                let idx = ny * w + nx;
                if visited[idx] {
                    continue;
                }
                if (intensity.get(nx, ny) - seed_value).abs() > self.params.intensity_tolerance {
                    continue;
                }
                if edges.get(nx, ny) > self.params.edge_stop {
                    continue;
                }
                visited[idx] = true;
                stack.push((nx, ny));
            }
        }

        pixels
    }
}

fn build_region(intensity: &IntensityMap, pixels: Vec<(usize, usize)>) -> Region {
    let (x0, y0) = pixels[0];
    let mut bounds = RegionBounds::point(x0, y0);
    let mut sum_pos = Vec2::ZERO;
    let mut sum_intensity = 0.0;
    for &(x, y) in &pixels {
        bounds.include(x, y);
        sum_pos += Vec2::new(x as f32, y as f32);
        sum_intensity += intensity.get(x, y);
    }
    let n = pixels.len() as f32;
    Region {
        centroid: sum_pos / n,
        average_intensity: sum_intensity / n,
        bounds,
        pixels,
    }
}
