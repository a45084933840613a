//! Monocular depth estimation from intensity and edge fields.
//!
//! Depth is intensity-driven displacement with raised boundaries and a
//! curvature term, followed by an edge-aware bilateral pass. Inputs must
//! already be at mesh-grid resolution.

use crate::analysis::field::{DepthField, EdgeMap, IntensityMap, ScalarField};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Depth estimation constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthParams {
    /// Edges stronger than this raise the surface.
    pub edge_boost_threshold: f32,
    pub edge_boost_factor: f32,
    pub gradient_factor: f32,
    /// Bilateral window is `(2 * radius + 1)^2`.
    pub bilateral_radius: usize,
    pub spatial_sigma: f32,
    /// Range sigma at zero edge strength, relative to the depth scale.
    pub range_sigma: f32,
    /// How strongly edges narrow the range kernel.
    pub edge_sharpening: f32,
    /// Depth is clamped to `[0, max_depth_factor * depth_scale]`.
    pub max_depth_factor: f32,
}

impl Default for DepthParams {
    fn default() -> Self {
        Self {
            edge_boost_threshold: 0.2,
            edge_boost_factor: 0.5,
            gradient_factor: 0.3,
            bilateral_radius: 2,
            spatial_sigma: 1.5,
            range_sigma: 0.1,
            edge_sharpening: 4.0,
            max_depth_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DepthEstimator {
    params: DepthParams,
}

impl DepthEstimator {
    pub fn new(params: DepthParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DepthParams {
        &self.params
    }

    /// Estimate a depth field.
    ///
    /// `smoothing` in [0, 1] blends between the raw displacement (0) and the
    /// bilateral result (1). The output is finite and within
    /// `[0, max_depth_factor * depth_scale]`.
    #[tracing::instrument(skip_all, fields(width = intensity.width(), height = intensity.height()))]
    pub fn estimate(
        &self,
        intensity: &IntensityMap,
        edges: &EdgeMap,
        depth_scale: f32,
        smoothing: f32,
    ) -> DepthField {
        let smoothing = smoothing.clamp(0.0, 1.0);
        let raw = self.displacement(intensity, edges, depth_scale);
        let smoothed = self.bilateral(&raw, edges, depth_scale);
        let max_depth = self.params.max_depth_factor * depth_scale;

        let (w, h) = raw.dimensions();
        let depth = ScalarField::from_fn(w, h, |x, y| {
            let pre = raw.get(x, y);
            let d = pre + smoothing * (smoothed.get(x, y) - pre);
            if d.is_finite() { d.clamp(0.0, max_depth) } else { 0.0 }
        });

        let (lo, hi) = depth.min_max();
        debug!("Depth range [{:.3}, {:.3}] (scale {})", lo, hi, depth_scale);
        depth
    }

    /// Unsmoothed displacement: intensity, edge boost and gradient terms.
    pub fn displacement(
        &self,
        intensity: &IntensityMap,
        edges: &EdgeMap,
        depth_scale: f32,
    ) -> DepthField {
        let p = &self.params;
        ScalarField::from_fn(intensity.width(), intensity.height(), |x, y| {
            let edge = edges.get(x, y);
            let boost = if edge > p.edge_boost_threshold {
                edge * p.edge_boost_factor * depth_scale
            } else {
                0.0
            };
            let (xi, yi) = (x as isize, y as isize);
            let gx = (intensity.get_clamped(xi + 1, yi) - intensity.get_clamped(xi - 1, yi)) * 0.5;
            let gy = (intensity.get_clamped(xi, yi + 1) - intensity.get_clamped(xi, yi - 1)) * 0.5;
            let gradient = (gx * gx + gy * gy).sqrt();
            intensity.get(x, y) * depth_scale + boost + p.gradient_factor * depth_scale * gradient
        })
    }

    /// Edge-aware bilateral filter. The range kernel narrows with local edge
    /// strength so strong boundaries survive.
    pub fn bilateral(&self, depth: &DepthField, edges: &EdgeMap, depth_scale: f32) -> DepthField {
        let p = &self.params;
        let (w, h) = depth.dimensions();
        let r = p.bilateral_radius as isize;
        let spatial_denom = 2.0 * p.spatial_sigma * p.spatial_sigma;

        // spatial weights depend only on the offset
        let side = (2 * r + 1) as usize;
        let mut spatial = Vec::with_capacity(side * side);
        for dy in -r..=r {
            for dx in -r..=r {
                spatial.push((-((dx * dx + dy * dy) as f32) / spatial_denom).exp());
            }
        }

        ScalarField::from_fn(w, h, |x, y| {
            let center = depth.get(x, y);
            let sigma = p.range_sigma * depth_scale / (1.0 + p.edge_sharpening * edges.get(x, y));
            let range_denom = 2.0 * sigma * sigma;
            if range_denom <= f32::MIN_POSITIVE {
                return center;
            }

            let mut weight_sum = 0.0;
            let mut acc = 0.0;
            for dy in -r..=r {
                let ny = y as isize + dy;
                if ny < 0 || ny >= h as isize {
                    continue;
                }
                for dx in -r..=r {
                    let nx = x as isize + dx;
                    if nx < 0 || nx >= w as isize {
                        continue;
                    }
                    let v = depth.get(nx as usize, ny as usize);
                    let diff = v - center;
                    let k = ((dy + r) as usize) * side + (dx + r) as usize;
                    let weight = spatial[k] * (-(diff * diff) / range_denom).exp();
                    weight_sum += weight;
                    acc += weight * v;
                }
            }
            if weight_sum > 0.0 { acc / weight_sum } else { center }
        })
    }
}
