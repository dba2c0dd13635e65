//! Sub-pixel corner refinement.
//!
//! Each corner is moved to the point `q` minimizing
//! `Σ w(p) (∇I(p) · (p - q))²` over a window: at a true corner every image
//! gradient is orthogonal to the vector from the corner to its pixel.

use camproj_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

/// Refine a single corner. Falls back to `initial` when the iteration walks
/// out of the search window or the structure tensor is singular.
pub(crate) fn refine_corner(
    image: &GrayImageView<'_>,
    initial: Point2<f32>,
    half_win: usize,
    max_iterations: usize,
    min_accuracy: f32,
) -> Point2<f32> {
    let hw = half_win.max(1) as i32;
    let sigma_sq = (hw * hw) as f64;
    let eps_sq = (min_accuracy as f64).powi(2);

    let mut c = Vector2::new(initial.x as f64, initial.y as f64);
    for _ in 0..max_iterations.max(1) {
        let mut tensor = Matrix2::<f64>::zeros();
        let mut rhs = Vector2::<f64>::zeros();

        for dy in -hw..=hw {
            for dx in -hw..=hw {
                let w = (-((dx * dx + dy * dy) as f64) / sigma_sq).exp();
                let q = c + Vector2::new(dx as f64, dy as f64);
                let (qx, qy) = (q.x as f32, q.y as f32);
                let gx = 0.5
                    * (sample_bilinear(image, qx + 1.0, qy) - sample_bilinear(image, qx - 1.0, qy))
                        as f64;
                let gy = 0.5
                    * (sample_bilinear(image, qx, qy + 1.0) - sample_bilinear(image, qx, qy - 1.0))
                        as f64;
                let g = Vector2::new(gx, gy);
                let ggt = g * g.transpose() * w;
                tensor += ggt;
                rhs += ggt * q;
            }
        }

        let det = tensor.determinant();
        if det.abs() <= f64::EPSILON * tensor.trace().powi(2) {
            break;
        }
        let Some(inv) = tensor.try_inverse() else {
            break;
        };
        let next = inv * rhs;
        let step_sq = (next - c).norm_squared();
        c = next;
        if step_sq <= eps_sq {
            break;
        }
    }

    let limit = hw as f64;
    let moved = (c.x - initial.x as f64).abs() > limit || (c.y - initial.y as f64).abs() > limit;
    if moved || !c.iter().all(|v| v.is_finite()) {
        return initial;
    }
    Point2::new(c.x as f32, c.y as f32)
}
