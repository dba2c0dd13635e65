use crate::{sample_bilinear_u8, GrayImage, GrayImageView};
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};

/// Planar projective transform `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    /// Row-major copy of the matrix.
    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    /// Map a point, returning `None` when it lands on the line at infinity.
    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        if w.abs() < 1e-12 {
            return None;
        }
        Some(Point2::new(v[0] / w, v[1] / w))
    }

    /// Finite entries and full rank (relative to the matrix scale).
    pub fn is_non_degenerate(&self) -> bool {
        if self.h.iter().any(|v| !v.is_finite()) {
            return false;
        }
        let norm = self.h.norm();
        if norm <= f64::MIN_POSITIVE {
            return false;
        }
        let det = (self.h / norm).determinant();
        det.abs() > 1e-12
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = (2.0_f64).sqrt() / mean_dist;
    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Hartley normalization: translate to the centroid, scale so the mean distance is sqrt(2).
///
/// Returns `None` when all points coincide.
fn normalize_points(pts: &[Point2<f64>]) -> Option<(Vec<Point2<f64>>, Matrix3<f64>)> {
    if pts.is_empty() {
        return None;
    }
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let cx = sx / n;
    let cy = sy / n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !mean_dist.is_finite() || mean_dist < 1e-12 {
        return None;
    }

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    Some((out, t))
}

/// Fix the projective scale: `H[2][2] = 1` when possible, unit Frobenius norm otherwise.
fn fix_scale(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let norm = h.norm();
    if !norm.is_finite() || norm < 1e-300 {
        return None;
    }
    let s = h[(2, 2)];
    if s.abs() > 1e-12 * norm {
        Some(h / s)
    } else {
        Some(h / norm)
    }
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    fix_scale(t_dst_inv * hn * t_src)
}

/// True when any three of the four points are (nearly) collinear, or all coincide.
///
/// Evaluated in Hartley-normalized coordinates so the tolerance is scale-free.
pub fn has_collinear_triple(pts: &[Point2<f64>; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    let Some((n, _)) = normalize_points(pts) else {
        return true;
    };
    TRIPLES.iter().any(|&[a, b, c]| {
        let ab = n[b] - n[a];
        let ac = n[c] - n[a];
        (ab.x * ac.y - ab.y * ac.x).abs() < 1e-6
    })
}

/// Exact homography through four correspondences: `dst ~ H * src`.
///
/// Solves the 8×8 system with `h33 = 1` in normalized coordinates. Returns
/// `None` for degenerate configurations (three collinear points, coincident
/// points).
pub fn exact_homography(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    if has_collinear_triple(src) || has_collinear_triple(dst) {
        return None;
    }
    let (src_n, t_src) = normalize_points(src)?;
    let (dst_n, t_dst) = normalize_points(dst)?;

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h = Homography::new(denormalize_homography(hn, t_src, t_dst)?);
    h.is_non_degenerate().then_some(h)
}

/// Four-point homography for image-space quads (`f32` pixel coordinates).
///
/// Corner order must be consistent between `src` and `dst`.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let widen = |p: &Point2<f32>| Point2::new(p.x as f64, p.y as f64);
    exact_homography(&src.each_ref().map(widen), &dst.each_ref().map(widen))
}

/// Least-squares homography over `n >= 4` correspondences (normalized DLT).
///
/// Solves `A h = 0` through the SVD of the `2n × 9` design matrix; the
/// solution is the right singular vector of the smallest singular value.
pub fn dlt_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return None;
    }

    let (s, t_src) = normalize_points(src)?;
    let (d, t_dst) = normalize_points(dst)?;

    // Pad to at least 9 rows so the thin SVD still exposes the null vector.
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);

    for k in 0..n {
        let x = s[k].x;
        let y = s[k].y;
        let u = d[k].x;
        let v = d[k].y;

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let smallest = svd.singular_values.imin();
    let h = v_t.row(smallest);

    let hn = Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);
    let h = Homography::new(denormalize_homography(hn, t_src, t_dst)?);
    h.is_non_degenerate().then_some(h)
}

/// Warp into a rectified image: for each output pixel, map through `h_img_from_rect` and sample.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_img_from_rect: Homography,
    out_w: usize,
    out_h: usize,
) -> GrayImage {
    let mut out = vec![0u8; out_w * out_h];

    for y in 0..out_h {
        for x in 0..out_w {
            // sample at pixel center
            let pr = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
            let pi = h_img_from_rect.apply(pr);
            out[y * out_w + x] = sample_bilinear_u8(src, pi.x, pi.y);
        }
    }

    GrayImage {
        width: out_w,
        height: out_h,
        data: out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ground_truth() -> Homography {
        Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ))
    }

    fn map(h: &Homography, p: Point2<f64>) -> Point2<f64> {
        h.apply_f64(p).expect("finite mapping")
    }

    #[test]
    fn exact_four_point_solve_recovers_h() {
        let gt = ground_truth();
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(180.0, 0.0),
            Point2::new(180.0, 130.0),
            Point2::new(0.0, 130.0),
        ];
        let dst = src.map(|p| map(&gt, p));

        let recovered = exact_homography(&src, &dst).expect("recoverable");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(150.0, 120.0),
        ] {
            assert_abs_diff_eq!(map(&recovered, p), map(&gt, p), epsilon = 1e-6);
        }
    }

    #[test]
    fn dlt_with_four_points_matches_exact_solve() {
        let gt = ground_truth();
        let src = vec![
            Point2::new(10.0, 10.0),
            Point2::new(200.0, 15.0),
            Point2::new(190.0, 140.0),
            Point2::new(5.0, 120.0),
        ];
        let dst: Vec<_> = src.iter().map(|&p| map(&gt, p)).collect();

        let h = dlt_homography(&src, &dst).expect("dlt");
        for (s, d) in src.iter().zip(&dst) {
            assert_abs_diff_eq!(map(&h, *s), *d, epsilon = 1e-6);
        }
    }

    #[test]
    fn dlt_handles_overdetermined_case() {
        let gt = Homography::new(Matrix3::new(
            1.0, 0.2, 12.0, //
            -0.1, 0.9, 6.0, //
            0.0006, 0.0004, 1.0,
        ));

        let src: Vec<Point2<f64>> = (0..3)
            .flat_map(|y| (0..3).map(move |x| Point2::new(x as f64 * 40.0, y as f64 * 50.0)))
            .collect();
        let dst: Vec<Point2<f64>> = src.iter().map(|&p| map(&gt, p)).collect();

        let estimated = dlt_homography(&src, &dst).expect("estimate");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(80.0, 100.0),
        ] {
            assert_abs_diff_eq!(map(&estimated, p), map(&gt, p), epsilon = 1e-6);
        }
        assert_abs_diff_eq!(estimated.h[(2, 2)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let collinear = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
            Point2::new(3.0, 3.0),
        ];
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(exact_homography(&collinear, &square).is_none());
        assert!(dlt_homography(&square, &[Point2::new(1.0, 1.0); 3]).is_none());
        assert!(dlt_homography(&square, &[Point2::new(5.0, 5.0); 4]).is_none());
    }

    #[test]
    fn warp_with_half_pixel_shift_reproduces_patch() {
        let mut img = GrayImage::filled(8, 8, 255);
        img.fill_rect(0, 0, 4, 8, 0);
        // output pixel centres sit at +0.5; shift them back onto source pixel centres
        let h = Homography::from_array([[1.0, 0.0, -0.5], [0.0, 1.0, -0.5], [0.0, 0.0, 1.0]]);
        let out = warp_perspective_gray(&img.view(), h, 8, 8);
        assert_eq!(out, img);
    }
}
