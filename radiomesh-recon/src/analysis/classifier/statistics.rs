//! Global color and layout statistics consumed by the classification rules.

use super::kidney::KidneyIndicators;
use crate::analysis::field::IntensityMap;
use crate::analysis::intensity::AnalyzedImage;
use serde::Serialize;

/// Channel variance (0-255 scale) below which a pixel counts as gray.
pub const GRAY_VARIANCE: f32 = 40.0;
/// Brightness (0-255) below which a pixel counts as dark.
pub const DARK_BRIGHTNESS: f32 = 50.0;
/// Share of the image on each side treated as border.
pub const BORDER_FRACTION: f32 = 0.1;
pub const BORDER_DARK_RATIO: f32 = 0.6;
pub const GLOBAL_DARK_RATIO: f32 = 0.35;

#[inline]
fn brightness(r: f32, g: f32, b: f32) -> f32 {
    (r + g + b) / 3.0
}

pub fn is_blue(r: f32, g: f32, b: f32) -> bool {
    b > r && b > 0.9 * g
}

pub fn is_gray(r: f32, g: f32, b: f32) -> bool {
    let m = brightness(r, g, b);
    ((r - m).powi(2) + (g - m).powi(2) + (b - m).powi(2)) / 3.0 < GRAY_VARIANCE
}

pub fn is_pink(r: f32, g: f32, b: f32) -> bool {
    r >= 150.0 && g >= 90.0 && r - g >= 20.0 && b + 15.0 >= g && b <= r
}

pub fn is_brown_red(r: f32, g: f32, b: f32) -> bool {
    (70.0..=210.0).contains(&r) && r >= 1.4 * g && g >= b && !is_pink(r, g, b)
}

pub fn is_dark(r: f32, g: f32, b: f32) -> bool {
    brightness(r, g, b) < DARK_BRIGHTNESS
}

/// `min / max` of two non-negative quantities; 1 when both are zero.
pub(crate) fn balance(a: f32, b: f32) -> f32 {
    let hi = a.max(b);
    if hi <= f32::EPSILON {
        return 1.0;
    }
    a.min(b) / hi
}

/// Whole-image statistics, computed once per classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TissueStatistics {
    pub mean_r: f32,
    pub mean_g: f32,
    pub mean_b: f32,
    pub blue_ratio: f32,
    pub gray_ratio: f32,
    pub pink_ratio: f32,
    pub brown_ratio: f32,
    pub dark_ratio: f32,
    pub border_dark_ratio: f32,
    pub dark_background: bool,
    /// Left/right intensity balance in [0, 1].
    pub symmetry: f32,
    pub aspect_ratio: f32,
    /// Mean brightness of non-dark pixels (0-255).
    pub foreground_brightness: f32,
    /// Largest pairwise difference between channel means.
    pub channel_divergence: f32,
    pub red_dominance: f32,
    /// Mean intensity over the central third.
    pub center_intensity: f32,
    pub kidney: KidneyIndicators,
}

impl TissueStatistics {
    pub fn compute(image: &AnalyzedImage) -> Self {
        let pixels = &image.pixels;
        let (w, h) = (image.width(), image.height());
        let total = (w * h).max(1) as f32;
        let bx = (w as f32 * BORDER_FRACTION) as usize;
        let by = (h as f32 * BORDER_FRACTION) as usize;

        let mut sum = [0.0f32; 3];
        let (mut blue, mut gray, mut pink) = (0usize, 0usize, 0usize);
        let (mut brown, mut dark) = (0usize, 0usize);
        let (mut border, mut border_dark) = (0usize, 0usize);
        let mut foreground_sum = 0.0;

        for (x, y, px) in pixels.pixels() {
            let [r, g, b] = px.map(f32::from);
            sum[0] += r;
            sum[1] += g;
            sum[2] += b;
            blue += is_blue(r, g, b) as usize;
            gray += is_gray(r, g, b) as usize;
            pink += is_pink(r, g, b) as usize;
            brown += is_brown_red(r, g, b) as usize;

            let is_dark_px = is_dark(r, g, b);
            if is_dark_px {
                dark += 1;
            } else {
                foreground_sum += brightness(r, g, b);
            }

            let (x, y) = (x as usize, y as usize);
            if x < bx || y < by || x >= w - bx || y >= h - by {
                border += 1;
                border_dark += is_dark_px as usize;
            }
        }

        let [mean_r, mean_g, mean_b] = sum.map(|s| s / total);
        let dark_ratio = dark as f32 / total;
        let border_dark_ratio = if border > 0 {
            border_dark as f32 / border as f32
        } else {
            dark_ratio
        };
        let foreground = w * h - dark;
        let aspect_ratio = w as f32 / h.max(1) as f32;

        Self {
            mean_r,
            mean_g,
            mean_b,
            blue_ratio: blue as f32 / total,
            gray_ratio: gray as f32 / total,
            pink_ratio: pink as f32 / total,
            brown_ratio: brown as f32 / total,
            dark_ratio,
            border_dark_ratio,
            dark_background: border_dark_ratio > BORDER_DARK_RATIO
                || dark_ratio > GLOBAL_DARK_RATIO,
            symmetry: symmetry(&image.intensity),
            aspect_ratio,
            foreground_brightness: if foreground > 0 {
                foreground_sum / foreground as f32
            } else {
                0.0
            },
            channel_divergence: (mean_r - mean_g)
                .abs()
                .max((mean_g - mean_b).abs())
                .max((mean_r - mean_b).abs()),
            red_dominance: mean_r / (mean_g + mean_b + 1.0),
            center_intensity: image
                .intensity
                .region_mean(w / 3, h / 3, 2 * w / 3, 2 * h / 3),
            kidney: KidneyIndicators::compute(&image.intensity),
        }
    }
}

/// Balance between the intensity sums of the left and right halves. The
/// middle column of an odd-width image belongs to neither half.
fn symmetry(intensity: &IntensityMap) -> f32 {
    let (w, h) = intensity.dimensions();
    let half = w / 2;
    let mut left = 0.0;
    let mut right = 0.0;
    for y in 0..h {
        let row = intensity.row(y);
        left += row[..half].iter().sum::<f32>();
        right += row[w - half..].iter().sum::<f32>();
    }
    balance(left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::intensity::IntensityAnalyzer;
    use crate::ingest::PixelBuffer;

    fn stats(pixels: PixelBuffer) -> TissueStatistics {
        TissueStatistics::compute(&IntensityAnalyzer::default().analyze(&pixels))
    }

    #[test]
    fn test_pixel_predicates() {
        assert!(is_blue(40.0, 60.0, 200.0));
        assert!(!is_blue(200.0, 60.0, 40.0));
        assert!(is_gray(100.0, 105.0, 98.0));
        assert!(!is_gray(200.0, 40.0, 40.0));
        assert!(is_pink(230.0, 160.0, 170.0));
        assert!(is_brown_red(120.0, 55.0, 35.0));
        assert!(!is_brown_red(230.0, 160.0, 150.0));
        assert!(is_dark(10.0, 20.0, 30.0));
    }

    #[test]
    fn test_dark_background_from_border() {
        let s = stats(
            PixelBuffer::from_fn(100, 100, |x, y| {
                if (20..80).contains(&x) && (20..80).contains(&y) { [200; 3] } else { [0; 3] }
            })
            .unwrap(),
        );
        assert_eq!(s.border_dark_ratio, 1.0);
        assert!(s.dark_background);
        assert!((s.foreground_brightness - 200.0).abs() < 1e-3);
        assert!((s.symmetry - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_symmetry_one_sided() {
        let pixels =
            PixelBuffer::from_fn(60, 40, |x, _| if x < 30 { [180; 3] } else { [0; 3] }).unwrap();
        let s = stats(pixels);
        assert_eq!(s.symmetry, 0.0);
    }

    #[test]
    fn test_color_means() {
        let s = stats(PixelBuffer::filled(50, 25, [200, 40, 40]).unwrap());
        assert!((s.mean_r - 200.0).abs() < 1e-3);
        assert!((s.channel_divergence - 160.0).abs() < 1e-3);
        assert!((s.red_dominance - 200.0 / 81.0).abs() < 1e-4);
        assert!((s.aspect_ratio - 2.0).abs() < 1e-6);
        assert!(!s.dark_background);
    }
}
