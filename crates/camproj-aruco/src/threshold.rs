//! Thresholding utilities: global Otsu for marker patches and a local-mean
//! adaptive threshold for candidate search.

use camproj_core::GrayImageView;

/// Compute Otsu threshold from a set of sample intensities.
///
/// Samples `<= t` form the dark class.
pub(crate) fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let mut min_v = 255u8;
    let mut max_v = 0u8;
    for &v in samples {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    if min_v == max_v {
        return min_v;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    let nonzero_bins = hist.iter().filter(|&&h| h > 0).count();
    if nonzero_bins <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}

/// Mean and (population) standard deviation of the samples.
pub(crate) fn mean_std(samples: &[u8]) -> (f32, f32) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let (sum, sum_sq) = samples.iter().fold((0f64, 0f64), |(s, q), &v| {
        let v = v as f64;
        (s + v, q + v * v)
    });
    let mean = sum / n;
    let var = (sum_sq / n - mean * mean).max(0.0);
    (mean as f32, var.sqrt() as f32)
}

/// Summed-area table over a grayscale image, `(w + 1) × (h + 1)` entries.
pub(crate) struct IntegralImage {
    width: usize,
    height: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    pub(crate) fn new(img: &GrayImageView<'_>) -> Self {
        let (w, h) = (img.width, img.height);
        let stride = w + 1;
        let mut sums = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0u64;
            for x in 0..w {
                row += img.data[y * w + x] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self {
            width: w,
            height: h,
            sums,
        }
    }

    /// Mean over the `(2 * half + 1)²` window centred on `(x, y)`, clipped to the image.
    #[inline]
    pub(crate) fn box_mean(&self, x: usize, y: usize, half: usize) -> f32 {
        let x0 = x.saturating_sub(half);
        let y0 = y.saturating_sub(half);
        let x1 = (x + half + 1).min(self.width);
        let y1 = (y + half + 1).min(self.height);
        let stride = self.width + 1;
        let sum = self.sums[y1 * stride + x1] + self.sums[y0 * stride + x0]
            - self.sums[y0 * stride + x1]
            - self.sums[y1 * stride + x0];
        let area = ((x1 - x0) * (y1 - y0)) as f32;
        sum as f32 / area
    }
}

/// Binary foreground mask: `1` where the pixel is at least `c` darker than
/// its local mean over a `win × win` window, `0` elsewhere.
pub(crate) fn adaptive_threshold(
    img: &GrayImageView<'_>,
    integral: &IntegralImage,
    win: usize,
    c: f32,
) -> Vec<u8> {
    let half = win.max(3) / 2;
    let mut mask = vec![0u8; img.width * img.height];
    for y in 0..img.height {
        for x in 0..img.width {
            let v = img.data[y * img.width + x] as f32;
            if v <= integral.box_mean(x, y, half) - c {
                mask[y * img.width + x] = 1;
            }
        }
    }
    mask
}
