/// Borrowed 8-bit grayscale raster.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

/// Owned 8-bit grayscale raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Image of the given size filled with `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// Fill the axis-aligned pixel rectangle `[x0, x1) × [y0, y1)`, clipped to the image.
    pub fn fill_rect(&mut self, x0: usize, y0: usize, x1: usize, y1: usize, value: u8) {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        for y in y0.min(y1)..y1 {
            let row = y * self.width;
            self.data[row + x0.min(x1)..row + x1].fill(value);
        }
    }
}

impl GrayImageView<'_> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.len() < self.width * self.height
    }

    /// Pixel value, or `None` outside the raster.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(self.data[y as usize * self.width + x as usize])
    }
}

// Edge-clamped lookup; keeps gradients at the raster border finite and small.
#[inline]
fn get_gray_clamped(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    let x = x.clamp(0, src.width as i32 - 1);
    let y = y.clamp(0, src.height as i32 - 1);
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample with pixel centres at integer coordinates.
///
/// Coordinates outside the raster are clamped to the nearest edge pixel.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    if src.is_empty() {
        return 0.0;
    }
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray_clamped(src, x0, y0) as f32;
    let p10 = get_gray_clamped(src, x0 + 1, y0) as f32;
    let p01 = get_gray_clamped(src, x0, y0 + 1) as f32;
    let p11 = get_gray_clamped(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}
