//! Owned RGB pixel buffers

use crate::ingest::DecodeError;
use glam::Vec3;
use image::RgbImage;

/// Immutable RGB pixel data for one reconstruction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    image: RgbImage,
}

impl PixelBuffer {
    /// Wrap a decoded RGB image. Zero-sized images are rejected.
    pub fn from_rgb_image(image: RgbImage) -> Result<Self, DecodeError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DecodeError::EmptyImage);
        }
        Ok(Self { image })
    }

    /// Build from tightly packed RGB8 bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, DecodeError> {
        let expected = width as usize * height as usize * 3;
        let actual = data.len();
        let image = RgbImage::from_raw(width, height, data).ok_or(DecodeError::InvalidBuffer {
            width,
            height,
            expected,
            actual,
        })?;
        Self::from_rgb_image(image)
    }

    /// A buffer filled with a single color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, DecodeError> {
        Self::from_rgb_image(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    /// Build by evaluating `f(x, y)` at every pixel.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self, DecodeError>
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        Self::from_rgb_image(RgbImage::from_fn(width, height, |x, y| image::Rgb(f(x, y))))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Get image dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width() as f32 / self.height() as f32
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Raw RGB triple at `(x, y)`.
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    /// RGB at `(x, y)` normalized to [0, 1].
    #[inline]
    pub fn color(&self, x: u32, y: u32) -> Vec3 {
        let [r, g, b] = self.rgb(x, y);
        Vec3::new(r as f32, g as f32, b as f32) / 255.0
    }

    /// Bilinear color at normalized coordinates `u, v` in [0, 1], mapping
    /// corners onto corner pixels.
    pub fn sample_color(&self, u: f32, v: f32) -> Vec3 {
        let max_x = (self.width() - 1) as f32;
        let max_y = (self.height() - 1) as f32;
        let fx = (u * max_x).clamp(0.0, max_x);
        let fy = (v * max_y).clamp(0.0, max_y);
        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let x1 = (x0 + 1).min(self.width() - 1);
        let y1 = (y0 + 1).min(self.height() - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;
        let top = self.color(x0, y0).lerp(self.color(x1, y0), tx);
        let bottom = self.color(x0, y1).lerp(self.color(x1, y1), tx);
        top.lerp(bottom, ty).clamp(Vec3::ZERO, Vec3::ONE)
    }

    /// Iterate `(x, y, [r, g, b])` in raster order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, [u8; 3])> + '_ {
        self.image.enumerate_pixels().map(|(x, y, p)| (x, y, p.0))
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }
}
