//! Weighted kidney indicators.
//!
//! Both kidneys are presumed centered at `(w/4, h/2)` and `(3w/4, h/2)`.
//! Each indicator is a boolean; the score is the sum of the weights of the
//! indicators that hold.

use super::statistics::balance;
use crate::analysis::field::IntensityMap;
use serde::Serialize;

pub const WEIGHT_SIMILAR_HALVES: f32 = 2.5;
pub const WEIGHT_DARK_CENTER: f32 = 1.0;
pub const WEIGHT_LAYERING: f32 = 2.0;
pub const WEIGHT_HILUM: f32 = 1.5;
pub const WEIGHT_PELVIS: f32 = 1.5;
pub const WEIGHT_ASPECT: f32 = 0.5;
pub const WEIGHT_BRIGHT_CORTEX: f32 = 1.0;

const HALF_SIMILARITY: f32 = 0.70;
const CENTER_MARGIN: f32 = 0.05;
/// Share of columns forming the center strip.
const CENTER_STRIP: f32 = 0.1;
const LAYERING_VARIANCE: f32 = 0.035;
const HILUM_RATIO: f32 = 0.75;
const HILUM_MIN_LATERAL: f32 = 0.2;
const PELVIS_CONTRAST: f32 = 0.1;
const ASPECT_RANGE: (f32, f32) = (0.9, 2.5);
const CORTEX_BRIGHTNESS: f32 = 0.35;

/// Which kidney cues are present in an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KidneyIndicators {
    pub similar_halves: bool,
    pub dark_center: bool,
    pub layering: bool,
    pub hilum: bool,
    pub pelvis: bool,
    pub aspect: bool,
    pub bright_cortex: bool,
}

impl KidneyIndicators {
    /// Every indicator set.
    pub const ALL: Self = Self {
        similar_halves: true,
        dark_center: true,
        layering: true,
        hilum: true,
        pelvis: true,
        aspect: true,
        bright_cortex: true,
    };

    pub fn compute(intensity: &IntensityMap) -> Self {
        let (w, h) = intensity.dimensions();
        if w < 4 || h < 4 {
            return Self::default();
        }

        let half = w / 2;
        let left = intensity.region_mean(0, 0, half, h);
        let right = intensity.region_mean(w - half, 0, w, h);

        let strip = ((w as f32 * CENTER_STRIP / 2.0) as usize).max(1);
        let center = intensity.region_mean(half - strip, 0, half + strip, h);

        let left_cx = w / 4;
        let right_cx = 3 * w / 4;
        let cy = h / 2;
        let offset = (w / 8).max(1) as isize;

        let layering =
            (column_variance(intensity, left_cx) + column_variance(intensity, right_cx)) / 2.0;

        // medial samples point toward the image center
        let hilum = hilum_at(intensity, left_cx, cy, offset)
            || hilum_at(intensity, right_cx, cy, -offset);

        let radius = (w.min(h) / 6).max(2) as f32;
        let pelvis = pelvis_at(intensity, left_cx, cy, radius)
            || pelvis_at(intensity, right_cx, cy, radius);

        let aspect = w as f32 / h as f32;

        Self {
            similar_halves: balance(left, right) > HALF_SIMILARITY && left.max(right) > 0.0,
            dark_center: center < left.min(right) - CENTER_MARGIN,
            layering: layering > LAYERING_VARIANCE,
            hilum,
            pelvis,
            aspect: (ASPECT_RANGE.0..=ASPECT_RANGE.1).contains(&aspect),
            bright_cortex: left > CORTEX_BRIGHTNESS && right > CORTEX_BRIGHTNESS,
        }
    }

    /// Weighted sum of the indicators that hold.
    pub fn score(&self) -> f32 {
        [
            (self.similar_halves, WEIGHT_SIMILAR_HALVES),
            (self.dark_center, WEIGHT_DARK_CENTER),
            (self.layering, WEIGHT_LAYERING),
            (self.hilum, WEIGHT_HILUM),
            (self.pelvis, WEIGHT_PELVIS),
            (self.aspect, WEIGHT_ASPECT),
            (self.bright_cortex, WEIGHT_BRIGHT_CORTEX),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, w)| w)
        .sum()
    }

    pub fn count(&self) -> usize {
        [
            self.similar_halves,
            self.dark_center,
            self.layering,
            self.hilum,
            self.pelvis,
            self.aspect,
            self.bright_cortex,
        ]
        .iter()
        .filter(|on| **on)
        .count()
    }
}

/// Population variance of one column.
fn column_variance(intensity: &IntensityMap, x: usize) -> f32 {
    let h = intensity.height();
    let mut sum = 0.0;
    let mut sq = 0.0;
    for y in 0..h {
        let v = intensity.get(x, y);
        sum += v;
        sq += v * v;
    }
    let mean = sum / h as f32;
    (sq / h as f32 - mean * mean).max(0.0)
}

fn patch_mean(intensity: &IntensityMap, cx: isize, cy: isize, radius: isize) -> f32 {
    let mut sum = 0.0;
    let mut n = 0;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            sum += intensity.get_clamped(cx + dx, cy + dy);
            n += 1;
        }
    }
    sum / n as f32
}

/// A medial intensity dip relative to the lateral side of the same kidney.
fn hilum_at(intensity: &IntensityMap, cx: usize, cy: usize, medial_offset: isize) -> bool {
    let (cx, cy) = (cx as isize, cy as isize);
    let medial = patch_mean(intensity, cx + medial_offset, cy, 1);
    let lateral = patch_mean(intensity, cx - medial_offset, cy, 1);
    lateral > HILUM_MIN_LATERAL && medial < HILUM_RATIO * lateral
}

/// A dark center surrounded by brighter tissue.
fn pelvis_at(intensity: &IntensityMap, cx: usize, cy: usize, radius: f32) -> bool {
    let (cx, cy) = (cx as isize, cy as isize);
    let center = patch_mean(intensity, cx, cy, 2);
    let ring = (0..8)
        .map(|k| {
            let angle = k as f32 * std::f32::consts::FRAC_PI_4;
            let dx = (radius * angle.cos()).round() as isize;
            let dy = (radius * angle.sin()).round() as isize;
            intensity.get_clamped(cx + dx, cy + dy)
        })
        .sum::<f32>()
        / 8.0;
    center + PELVIS_CONTRAST < ring
}
