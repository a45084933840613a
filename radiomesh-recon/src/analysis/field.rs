//! Dense 2D scalar grids

/// Row-major grid of `f32` values.
///
/// Used for intensity maps, edge maps and depth fields alike.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

/// Normalized grayscale intensity in [0, 1].
pub type IntensityMap = ScalarField;
/// Non-negative gradient magnitudes.
pub type EdgeMap = ScalarField;
/// Surface displacement per grid vertex.
pub type DepthField = ScalarField;

impl ScalarField {
    /// A zero-filled field.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Build by evaluating `f(x, y)` in raster order.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Value at signed coordinates clamped into the grid.
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.get(cx, cy)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Bilinear sample at continuous pixel coordinates, clamped to the grid.
    pub fn sample(&self, fx: f32, fy: f32) -> f32 {
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let fx = fx.clamp(0.0, max_x);
        let fy = fy.clamp(0.0, max_y);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;
        let top = self.get(x0, y0) * (1.0 - tx) + self.get(x1, y0) * tx;
        let bottom = self.get(x0, y1) * (1.0 - tx) + self.get(x1, y1) * tx;
        top * (1.0 - ty) + bottom * ty
    }

    /// Bilinear sample at normalized coordinates `u, v` in [0, 1].
    pub fn sample_normalized(&self, u: f32, v: f32) -> f32 {
        self.sample(
            u * (self.width - 1) as f32,
            v * (self.height - 1) as f32,
        )
    }

    /// Resample to a new size with bilinear interpolation, mapping corners
    /// onto corners.
    pub fn resample(&self, width: usize, height: usize) -> Self {
        let ux = if width > 1 { 1.0 / (width - 1) as f32 } else { 0.0 };
        let uy = if height > 1 { 1.0 / (height - 1) as f32 } else { 0.0 };
        Self::from_fn(width, height, |x, y| {
            self.sample_normalized(x as f32 * ux, y as f32 * uy)
        })
    }

    /// Apply `f` to every value.
    pub fn map<F: Fn(f32) -> f32>(&self, f: F) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f32>() / self.data.len() as f32
    }

    /// Mean over the half-open rectangle `[x0, x1) x [y0, y1)`, clamped.
    pub fn region_mean(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f32 {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return 0.0;
        }
        let mut sum = 0.0;
        for y in y0..y1 {
            sum += self.row(y)[x0..x1].iter().sum::<f32>();
        }
        sum / ((x1 - x0) * (y1 - y0)) as f32
    }

    /// `(min, max)` over all values, `(0, 0)` when empty.
    pub fn min_max(&self) -> (f32, f32) {
        if self.data.is_empty() {
            return (0.0, 0.0);
        }
        self.data
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}
