//! End-to-end marker detection on a grayscale image.

use camproj_core::GrayImageView;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::contour::find_outer_contours;
use crate::decode::read_marker_code;
use crate::quad::{corner_distance_sq, quad_area, quad_centroid, quad_contains, quad_from_contour};
use crate::refine::refine_corner;
use crate::threshold::{adaptive_threshold, IntegralImage};
use crate::{CornerRefinement, DetectorParams, Dictionary, Matcher};

/// One decoded marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    /// Dictionary id.
    pub id: u32,
    /// Outer corners in image pixels: the marker's own top-left, top-right,
    /// bottom-right, bottom-left, whatever its orientation in the image.
    pub corners: [Point2<f32>; 4],
    /// Clockwise quarter turns of the marker in the image, judged by which
    /// of its corners is nearest the image's top-left.
    pub rotation: u8,
    /// Bit errors corrected while matching.
    pub hamming: u8,
}

impl MarkerObservation {
    pub fn area(&self) -> f32 {
        quad_area(&self.corners)
    }

    pub fn center(&self) -> Point2<f32> {
        quad_centroid(&self.corners)
    }
}

/// A convex quad found by the contour stage, before decoding.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Candidate {
    pub corners: [Point2<f32>; 4],
    pub perimeter: usize,
}

/// Detector for one dictionary.
///
/// Holds no per-call state, so a single instance can serve concurrent
/// requests behind an `Arc`.
#[derive(Clone, Debug)]
pub struct ArucoDetector {
    params: DetectorParams,
    matcher: Matcher,
}

impl ArucoDetector {
    pub fn new(dictionary: Dictionary, params: DetectorParams) -> Self {
        let max_hamming = params.max_hamming(dictionary.max_correction_bits);
        Self {
            matcher: Matcher::new(dictionary, max_hamming),
            params,
        }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    pub fn dictionary(&self) -> Dictionary {
        self.matcher.dictionary()
    }

    /// Detect all markers of the dictionary in `image`.
    ///
    /// An empty or marker-free image yields an empty list. At most one
    /// observation survives per marker: same-id detections whose centers fall
    /// inside each other collapse to the one with the larger area.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image),
            fields(width = image.width, height = image.height)
        )
    )]
    pub fn detect(&self, image: &GrayImageView<'_>) -> Vec<MarkerObservation> {
        if image.is_empty() {
            return Vec::new();
        }

        let candidates = self.find_candidates(image);
        let dict = self.dictionary();

        let mut markers = Vec::new();
        for cand in &candidates {
            let Some(code) = read_marker_code(image, &cand.corners, dict.marker_size, &self.params)
            else {
                continue;
            };
            let Some(m) = self.matcher.match_code(code) else {
                continue;
            };
            // the dictionary's top-left cell sits at candidate corner `rotation`
            let r = m.rotation as usize;
            let mut corners: [Point2<f32>; 4] = std::array::from_fn(|k| cand.corners[(r + k) % 4]);
            if self.params.corner_refinement == CornerRefinement::Subpix {
                self.refine(image, &mut corners, dict.marker_size);
            }
            markers.push(MarkerObservation {
                id: m.id,
                corners,
                rotation: image_rotation(&corners),
                hamming: m.hamming,
            });
        }

        let decoded = markers.len();
        let markers = if self.params.dedup_overlapping {
            dedup_markers(markers)
        } else {
            markers
        };
        log::debug!(
            "{} candidates, {} decoded, {} markers after dedup",
            candidates.len(),
            decoded,
            markers.len()
        );
        markers
    }

    /// Convex quads from every adaptive-threshold pass, with near-identical
    /// quads collapsed to the one with the longest contour.
    pub(crate) fn find_candidates(&self, image: &GrayImageView<'_>) -> Vec<Candidate> {
        let p = &self.params;
        let (w, h) = (image.width, image.height);
        let max_dim = w.max(h) as f32;
        let min_len = (p.min_perimeter_rate * max_dim).max(4.0) as usize;
        let max_len = (p.max_perimeter_rate * max_dim) as usize;

        let integral = IntegralImage::new(image);
        let mut candidates = Vec::new();
        for win in p.threshold_windows() {
            let mask = adaptive_threshold(image, &integral, win, p.adaptive_constant);
            let contours = find_outer_contours(&mask, w, h, min_len, max_len);
            let before = candidates.len();
            candidates.extend(contours.iter().filter_map(|c| {
                quad_from_contour(c, w, h, p).map(|corners| Candidate {
                    corners,
                    perimeter: c.len(),
                })
            }));
            log::trace!(
                "window {win}: {} contours, {} quads",
                contours.len(),
                candidates.len() - before
            );
        }

        collapse_close_candidates(candidates, p.min_marker_distance_rate)
    }

    fn refine(&self, image: &GrayImageView<'_>, corners: &mut [Point2<f32>; 4], marker_size: usize) {
        let p = &self.params;
        let cells = (marker_size + 2 * p.marker_border_bits) as f32;
        let min_side = (0..4)
            .map(|i| (corners[(i + 1) % 4] - corners[i]).norm())
            .fold(f32::INFINITY, f32::min);
        // keep the window inside the border cell
        let cell_limit = ((min_side / cells * 0.5).floor() as usize).max(1);
        let half_win = p.corner_refinement_win_size.min(cell_limit);

        for c in corners.iter_mut() {
            *c = refine_corner(
                image,
                *c,
                half_win,
                p.corner_refinement_max_iterations,
                p.corner_refinement_min_accuracy,
            );
        }
    }
}

/// Index of the corner with the smallest `x + y` tells how far the marker's
/// own top-left has been turned away from the image's top-left.
fn image_rotation(corners: &[Point2<f32>; 4]) -> u8 {
    let k = (0..4)
        .min_by(|&a, &b| {
            let sa = corners[a].x + corners[a].y;
            let sb = corners[b].x + corners[b].y;
            sa.total_cmp(&sb)
        })
        .unwrap_or(0);
    ((4 - k) % 4) as u8
}

fn collapse_close_candidates(candidates: Vec<Candidate>, rate: f32) -> Vec<Candidate> {
    let n = candidates.len();
    let mut keep = vec![true; n];
    for i in 0..n {
        if !keep[i] {
            continue;
        }
        for j in (i + 1)..n {
            if !keep[j] {
                continue;
            }
            let (a, b) = (&candidates[i], &candidates[j]);
            let limit = rate * a.perimeter.min(b.perimeter) as f32;
            if corner_distance_sq(&a.corners, &b.corners) >= limit * limit {
                continue;
            }
            if b.perimeter > a.perimeter {
                keep[i] = false;
                break;
            }
            keep[j] = false;
        }
    }

    candidates
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then_some(c))
        .collect()
}

/// Same-id observations where either center lies inside the other quad are
/// one physical marker; keep the larger. Equal areas keep the first found.
fn dedup_markers(markers: Vec<MarkerObservation>) -> Vec<MarkerObservation> {
    let mut kept: Vec<MarkerObservation> = Vec::with_capacity(markers.len());
    for m in markers {
        let existing = kept.iter_mut().find(|k| {
            k.id == m.id
                && (quad_contains(&k.corners, m.center()) || quad_contains(&m.corners, k.center()))
        });
        match existing {
            Some(k) if m.area() > k.area() => *k = m,
            Some(_) => {}
            None => kept.push(m),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::builtins::DICT_4X4_50;
    use crate::test_utils::{axis_aligned_corners, cycle_corners, paste, render_marker};
    use camproj_core::GrayImage;

    fn assert_corners_near(got: &[Point2<f32>; 4], want: &[Point2<f32>; 4], tol: f32) {
        for (g, w) in got.iter().zip(want) {
            assert_abs_diff_eq!(*g, *w, epsilon = tol);
        }
    }

    fn square(x0: f32, y0: f32, side: f32) -> [Point2<f32>; 4] {
        [
            Point2::new(x0, y0),
            Point2::new(x0 + side, y0),
            Point2::new(x0 + side, y0 + side),
            Point2::new(x0, y0 + side),
        ]
    }

    fn obs(id: u32, corners: [Point2<f32>; 4]) -> MarkerObservation {
        MarkerObservation {
            id,
            corners,
            rotation: 0,
            hamming: 0,
        }
    }

    #[test]
    fn overlapping_same_id_keeps_larger() {
        let small = obs(4, square(10.0, 10.0, 20.0));
        let large = obs(4, square(8.0, 8.0, 24.0));
        let out = dedup_markers(vec![small, large.clone()]);
        assert_eq!(out, vec![large]);
    }

    #[test]
    fn equal_area_keeps_first() {
        let a = obs(4, square(10.0, 10.0, 20.0));
        let b = obs(4, square(11.0, 10.0, 20.0));
        let out = dedup_markers(vec![a.clone(), b]);
        assert_eq!(out, vec![a]);
    }

    #[test]
    fn distant_or_different_ids_are_kept() {
        let a = obs(4, square(10.0, 10.0, 20.0));
        let far = obs(4, square(200.0, 10.0, 20.0));
        let other = obs(5, square(10.0, 10.0, 20.0));
        assert_eq!(dedup_markers(vec![a, far, other]).len(), 3);
    }

    #[test]
    fn rotation_follows_top_left_corner() {
        let upright = square(0.0, 0.0, 10.0);
        for r in 0..4usize {
            let turned: [Point2<f32>; 4] = std::array::from_fn(|k| upright[(r + k) % 4]);
            assert_eq!(image_rotation(&turned) as usize, r);
        }
    }

    #[test]
    fn nested_candidates_collapse_to_outer() {
        let outer = Candidate {
            corners: square(10.0, 10.0, 60.0),
            perimeter: 236,
        };
        let inner = Candidate {
            corners: square(20.0, 20.0, 40.0),
            perimeter: 156,
        };
        let separate = Candidate {
            corners: square(200.0, 10.0, 60.0),
            perimeter: 236,
        };
        let out = collapse_close_candidates(vec![inner, outer, separate], 0.125);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].perimeter, 236);
        assert_eq!(out[0].corners[0], Point2::new(10.0, 10.0));
    }

    #[test]
    fn detects_marker_in_every_orientation() {
        let detector = ArucoDetector::new(DICT_4X4_50, DetectorParams::default());
        for r in 0..4u8 {
            let marker = render_marker(&DICT_4X4_50, 9, r, 10).expect("id");
            let mut canvas = GrayImage::filled(160, 140, 255);
            paste(&mut canvas, &marker, 50, 40);

            let found = detector.detect(&canvas.view());
            assert_eq!(found.len(), 1, "rotation {r}: {found:?}");
            let m = &found[0];
            assert_eq!(m.id, 9);
            assert_eq!(m.rotation, r);
            let want = cycle_corners(&axis_aligned_corners(50, 40, marker.width), r as usize);
            assert_corners_near(&m.corners, &want, 1.0);
        }
    }

    #[test]
    fn blank_and_empty_images_yield_nothing() {
        let detector = ArucoDetector::new(DICT_4X4_50, DetectorParams::default());
        let blank = GrayImage::filled(64, 48, 255);
        assert!(detector.detect(&blank.view()).is_empty());

        let empty = GrayImageView {
            width: 0,
            height: 0,
            data: &[],
        };
        assert!(detector.detect(&empty).is_empty());
    }
}
