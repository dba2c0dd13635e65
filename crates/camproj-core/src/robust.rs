//! Outlier-robust homography estimation (normalized DLT inside RANSAC).

use crate::homography::{dlt_homography, exact_homography, has_collinear_triple};
use crate::ransac::{ransac, Estimator, RansacOptions};
use crate::Homography;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Minimum number of correspondences for a homography.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Why a robust homography could not be produced.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HomographyError {
    #[error("Need at least 4 point correspondences")]
    InsufficientPoints { got: usize },
    #[error("Camera and projector point counts must match")]
    LengthMismatch { src: usize, dst: usize },
    #[error("point {index} has a non-finite coordinate")]
    NonFinitePoint { index: usize },
    #[error("Failed to compute homography")]
    NotComputed,
}

/// Parameters of [`estimate_homography_robust`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustHomographyParams {
    /// Max reprojection error (destination pixels) for a correspondence to count as an inlier.
    pub reproj_threshold: f64,
    /// Upper bound on sampled hypotheses.
    pub max_iters: usize,
    /// Confidence used for early termination.
    pub confidence: f64,
    /// Consensus size required to accept a hypothesis (never below 4).
    pub min_inliers: usize,
    /// Sampling seed. Fixed so that estimation is a pure function of its input.
    pub seed: u64,
}

impl Default for RobustHomographyParams {
    fn default() -> Self {
        let ransac = RansacOptions::default();
        Self {
            reproj_threshold: ransac.thresh,
            max_iters: ransac.max_iters,
            confidence: ransac.confidence,
            min_inliers: ransac.min_inliers,
            seed: ransac.seed,
        }
    }
}

impl RobustHomographyParams {
    fn ransac_options(&self) -> RansacOptions {
        RansacOptions {
            max_iters: self.max_iters.max(1),
            thresh: self.reproj_threshold,
            min_inliers: self.min_inliers.max(MIN_CORRESPONDENCES),
            confidence: self.confidence,
            seed: self.seed,
        }
    }
}

/// A successful robust fit.
#[derive(Clone, Debug)]
pub struct HomographyFit {
    /// Maps source points to destination points: `dst ~ H * src`.
    pub homography: Homography,
    /// Indices of the correspondences consistent with `homography`.
    pub inliers: Vec<usize>,
    /// RMS reprojection error over `inliers`, in destination pixels.
    pub inlier_rms: f64,
    /// Hypotheses drawn before termination.
    pub iterations: usize,
}

#[derive(Clone, Copy, Debug)]
struct Correspondence {
    src: Point2<f64>,
    dst: Point2<f64>,
}

struct HomographyEstimator;

impl HomographyEstimator {
    fn split(data: &[Correspondence], idx: &[usize]) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
        idx.iter().map(|&i| (data[i].src, data[i].dst)).unzip()
    }

    fn quad(data: &[Correspondence], idx: &[usize]) -> ([Point2<f64>; 4], [Point2<f64>; 4]) {
        let src = [0, 1, 2, 3].map(|k| data[idx[k]].src);
        let dst = [0, 1, 2, 3].map(|k| data[idx[k]].dst);
        (src, dst)
    }
}

impl Estimator for HomographyEstimator {
    type Datum = Correspondence;
    type Model = Homography;

    const MIN_SAMPLES: usize = MIN_CORRESPONDENCES;

    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model> {
        let (src, dst) = Self::quad(data, sample);
        exact_homography(&src, &dst)
    }

    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
        match model.apply_f64(datum.src) {
            Some(p) => (p - datum.dst).norm(),
            None => f64::INFINITY,
        }
    }

    fn is_degenerate(data: &[Self::Datum], sample: &[usize]) -> bool {
        let (src, dst) = Self::quad(data, sample);
        has_collinear_triple(&src) || has_collinear_triple(&dst)
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        let (src, dst) = Self::split(data, inliers);
        dlt_homography(&src, &dst)
    }
}

/// Validate a correspondence set: count, equal lengths, finite coordinates.
///
/// Checks run in that order, so a short `src` reports
/// [`HomographyError::InsufficientPoints`] even if lengths also differ.
pub fn check_correspondences(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> Result<(), HomographyError> {
    if src.len() < MIN_CORRESPONDENCES {
        return Err(HomographyError::InsufficientPoints { got: src.len() });
    }
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let finite = |p: &Point2<f64>| p.x.is_finite() && p.y.is_finite();
    if let Some(index) = src
        .iter()
        .zip(dst)
        .position(|(s, d)| !finite(s) || !finite(d))
    {
        return Err(HomographyError::NonFinitePoint { index });
    }
    Ok(())
}

/// Estimate `H` with `dst ~ H * src`, robust to outlier correspondences.
///
/// Minimal 4-point samples are drawn with a seeded RNG, scored by inlier
/// count (ties broken by RMS reprojection error), and the winner is refitted
/// by least squares over its inliers. The scale of the returned matrix is
/// whatever the solver produced (normally `H[2][2] == 1`).
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, dst, params), fields(n = src.len()))
)]
pub fn estimate_homography_robust(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    params: &RobustHomographyParams,
) -> Result<HomographyFit, HomographyError> {
    check_correspondences(src, dst)?;

    let data: Vec<Correspondence> = src
        .iter()
        .zip(dst)
        .map(|(&src, &dst)| Correspondence { src, dst })
        .collect();

    let res = ransac::<HomographyEstimator>(&data, &params.ransac_options());
    let Some(homography) = res.model else {
        log::debug!("no homography consensus among {} correspondences", data.len());
        return Err(HomographyError::NotComputed);
    };
    if !homography.is_non_degenerate() {
        return Err(HomographyError::NotComputed);
    }

    Ok(HomographyFit {
        homography,
        inliers: res.inliers,
        inlier_rms: res.inlier_rms,
        iterations: res.iters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    fn camera_to_projector() -> Homography {
        Homography::new(Matrix3::new(
            1.6, 0.12, 40.0, //
            -0.08, 1.45, 25.0, //
            0.0004, 0.0002, 1.0,
        ))
    }

    fn grid(n: usize, step: f64) -> Vec<Point2<f64>> {
        (0..n)
            .flat_map(|j| (0..n).map(move |i| Point2::new(30.0 + i as f64 * step, 20.0 + j as f64 * step)))
            .collect()
    }

    fn reprojection_error(h: &Homography, src: &Point2<f64>, dst: &Point2<f64>) -> f64 {
        (h.apply_f64(*src).expect("finite") - dst).norm()
    }

    #[test]
    fn four_exact_correspondences_reproject_precisely() {
        let gt = camera_to_projector();
        let src = vec![
            Point2::new(100.0, 100.0),
            Point2::new(500.0, 110.0),
            Point2::new(520.0, 400.0),
            Point2::new(90.0, 380.0),
        ];
        let dst: Vec<_> = src.iter().map(|&p| gt.apply_f64(p).expect("finite")).collect();

        let fit = estimate_homography_robust(&src, &dst, &RobustHomographyParams::default())
            .expect("homography");
        assert_eq!(fit.inliers, vec![0, 1, 2, 3]);
        for (s, d) in src.iter().zip(&dst) {
            assert!(reprojection_error(&fit.homography, s, d) < 1e-3);
        }
    }

    #[test]
    fn preconditions_report_distinct_errors() {
        let p = Point2::new(1.0, 2.0);
        let params = RobustHomographyParams::default();

        let err = estimate_homography_robust(&[p; 3], &[p; 3], &params).unwrap_err();
        assert_eq!(err, HomographyError::InsufficientPoints { got: 3 });
        assert_eq!(err.to_string(), "Need at least 4 point correspondences");

        let err = estimate_homography_robust(&[p; 5], &[p; 4], &params).unwrap_err();
        assert_eq!(err, HomographyError::LengthMismatch { src: 5, dst: 4 });
        assert_eq!(err.to_string(), "Camera and projector point counts must match");

        let mut bad = grid(2, 10.0);
        bad[2].y = f64::NAN;
        let err = estimate_homography_robust(&bad, &grid(2, 10.0), &params).unwrap_err();
        assert_eq!(err, HomographyError::NonFinitePoint { index: 2 });
    }

    #[test]
    fn collinear_points_cannot_be_fitted() {
        let src: Vec<_> = (0..8).map(|i| Point2::new(i as f64 * 10.0, i as f64 * 5.0)).collect();
        let dst: Vec<_> = (0..8).map(|i| Point2::new(i as f64 * 7.0, 3.0)).collect();
        let err = estimate_homography_robust(&src, &dst, &RobustHomographyParams::default())
            .unwrap_err();
        assert_eq!(err, HomographyError::NotComputed);
        assert_eq!(err.to_string(), "Failed to compute homography");
    }

    #[test]
    fn single_outlier_is_rejected_unlike_plain_dlt() {
        let gt = camera_to_projector();
        let src = grid(4, 60.0);
        let mut dst: Vec<_> = src.iter().map(|&p| gt.apply_f64(p).expect("finite")).collect();
        dst[5] += nalgebra::Vector2::new(180.0, -140.0);

        let naive = dlt_homography(&src, &dst).expect("plain dlt still solves");
        let naive_worst = src
            .iter()
            .zip(&dst)
            .enumerate()
            .filter(|(i, _)| *i != 5)
            .map(|(_, (s, d))| reprojection_error(&naive, s, d))
            .fold(0.0, f64::max);
        assert!(naive_worst > 1.0, "plain DLT should be dragged off, worst {naive_worst}");

        let fit = estimate_homography_robust(&src, &dst, &RobustHomographyParams::default())
            .expect("robust fit");
        assert!(!fit.inliers.contains(&5));
        assert_eq!(fit.inliers.len(), src.len() - 1);
        for (i, (s, d)) in src.iter().zip(&dst).enumerate() {
            if i != 5 {
                assert!(reprojection_error(&fit.homography, s, d) < 1e-6);
            }
        }
    }

    #[test]
    fn estimation_is_repeatable() {
        let gt = camera_to_projector();
        let src = grid(5, 40.0);
        let mut dst: Vec<_> = src.iter().map(|&p| gt.apply_f64(p).expect("finite")).collect();
        dst[3] += nalgebra::Vector2::new(-60.0, 90.0);
        dst[17] += nalgebra::Vector2::new(45.0, 30.0);

        let params = RobustHomographyParams::default();
        let a = estimate_homography_robust(&src, &dst, &params).expect("fit");
        let b = estimate_homography_robust(&src, &dst, &params).expect("fit");
        assert_eq!(a.homography, b.homography);
        assert_eq!(a.inliers, b.inliers);
    }
}
