//! Polygon approximation and quad geometry.

use nalgebra::{Point2, Vector2};

use crate::DetectorParams;

/// Closed Douglas–Peucker simplification of a traced contour.
///
/// The two split points are the contour point farthest from the first one
/// and the point farthest from that, so they usually land on corners.
/// Vertices keep the contour's winding.
pub(crate) fn approx_closed_polygon(contour: &[Point2<i32>], epsilon: f64) -> Vec<Point2<f32>> {
    let pts: Vec<Point2<f64>> = contour
        .iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect();
    let n = pts.len();
    if n < 3 {
        return pts.iter().map(|p| p.cast::<f32>()).collect();
    }

    let farthest_from = |i: usize| -> usize {
        (0..n)
            .max_by(|&a, &b| {
                let da = (pts[a] - pts[i]).norm_squared();
                let db = (pts[b] - pts[i]).norm_squared();
                da.total_cmp(&db)
            })
            .unwrap_or(i)
    };
    let a = farthest_from(0);
    let b = farthest_from(a);
    if a == b {
        return vec![pts[a].cast::<f32>()];
    }

    let mut keep = vec![false; n];
    keep[a] = true;
    keep[b] = true;
    simplify_arc(&pts, a, b, epsilon, &mut keep);
    simplify_arc(&pts, b, a, epsilon, &mut keep);

    pts.iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(p, _)| p.cast::<f32>())
        .collect()
}

/// Mark the points of the arc `first → last` (forward, wrapping) that
/// survive simplification.
fn simplify_arc(pts: &[Point2<f64>], first: usize, last: usize, eps: f64, keep: &mut [bool]) {
    let n = pts.len();
    let mut stack = vec![(first, last)];
    while let Some((i, j)) = stack.pop() {
        let span = (j + n - i) % n;
        if span < 2 {
            continue;
        }
        let mut best = (0.0f64, i);
        for k in 1..span {
            let idx = (i + k) % n;
            let d = point_segment_distance(pts[idx], pts[i], pts[j]);
            if d > best.0 {
                best = (d, idx);
            }
        }
        if best.0 > eps {
            keep[best.1] = true;
            stack.push((i, best.1));
            stack.push((best.1, j));
        }
    }
}

fn point_segment_distance(p: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < 1e-12 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

#[inline]
fn cross(o: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let u = a - o;
    let v = b - o;
    u.x * v.y - u.y * v.x
}

/// Strictly convex, in either winding.
pub(crate) fn is_convex(q: &[Point2<f32>; 4]) -> bool {
    let signs: Vec<f32> = (0..4)
        .map(|i| cross(q[i], q[(i + 1) % 4], q[(i + 2) % 4]))
        .collect();
    signs.iter().all(|&s| s > 0.0) || signs.iter().all(|&s| s < 0.0)
}

pub(crate) fn min_side_sq(q: &[Point2<f32>; 4]) -> f32 {
    (0..4)
        .map(|i| (q[(i + 1) % 4] - q[i]).norm_squared())
        .fold(f32::INFINITY, f32::min)
}

/// Reorder so the corners run clockwise on screen (y pointing down).
pub(crate) fn orient_clockwise(q: &mut [Point2<f32>; 4]) {
    if cross(q[0], q[1], q[2]) < 0.0 {
        q.swap(1, 3);
    }
}

/// Enclosed area (shoelace).
pub(crate) fn quad_area(q: &[Point2<f32>; 4]) -> f32 {
    let twice: f32 = (0..4)
        .map(|i| {
            let (a, b) = (q[i], q[(i + 1) % 4]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    0.5 * twice.abs()
}

pub(crate) fn quad_centroid(q: &[Point2<f32>; 4]) -> Point2<f32> {
    let sum = q.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
    Point2::from(sum / 4.0)
}

/// Whether `p` lies inside (or on) the convex quad `q`.
pub(crate) fn quad_contains(q: &[Point2<f32>; 4], p: Point2<f32>) -> bool {
    let mut pos = false;
    let mut neg = false;
    for i in 0..4 {
        let c = cross(q[i], q[(i + 1) % 4], p);
        pos |= c > 0.0;
        neg |= c < 0.0;
    }
    !(pos && neg)
}

/// Mean squared distance between corresponding corners, minimized over
/// the four cyclic alignments.
pub(crate) fn corner_distance_sq(a: &[Point2<f32>; 4], b: &[Point2<f32>; 4]) -> f32 {
    (0..4)
        .map(|shift| {
            (0..4)
                .map(|i| (a[i] - b[(i + shift) % 4]).norm_squared())
                .sum::<f32>()
                / 4.0
        })
        .fold(f32::INFINITY, f32::min)
}

/// Fit a marker-like quad to a traced contour.
///
/// Rejects contours that do not simplify to exactly four vertices, are not
/// convex, have a side shorter than `min_corner_distance_rate` times the
/// contour length, or come closer than `min_distance_to_border` to the image
/// edge. The result is ordered clockwise on screen.
pub(crate) fn quad_from_contour(
    contour: &[Point2<i32>],
    width: usize,
    height: usize,
    params: &DetectorParams,
) -> Option<[Point2<f32>; 4]> {
    let len = contour.len() as f32;
    let eps = (len * params.polygon_accuracy_rate) as f64;
    let poly = approx_closed_polygon(contour, eps);
    let mut quad: [Point2<f32>; 4] = poly.try_into().ok()?;

    if !is_convex(&quad) {
        return None;
    }

    let min_side = len * params.min_corner_distance_rate;
    if min_side_sq(&quad) < min_side * min_side {
        return None;
    }

    let d = params.min_distance_to_border as f32;
    let (max_x, max_y) = (width as f32 - 1.0 - d, height as f32 - 1.0 - d);
    if quad
        .iter()
        .any(|p| p.x < d || p.y < d || p.x > max_x || p.y > max_y)
    {
        return None;
    }

    orient_clockwise(&mut quad);
    Some(quad)
}
