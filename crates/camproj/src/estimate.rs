//! Camera-to-projector homography from JSON point lists.

use camproj_core::{estimate_homography_robust, RobustHomographyParams};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::wire::Point;

/// Outcome of a homography request.
///
/// `success` holds exactly when `matrix` is present and `error` is absent.
/// On the wire a missing matrix is written as `[]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HomographyResult {
    #[serde(with = "matrix_or_empty")]
    matrix: Option<[[f64; 3]; 3]>,
    success: bool,
    error: Option<String>,
}

impl HomographyResult {
    pub fn success(matrix: [[f64; 3]; 3]) -> Self {
        Self {
            matrix: Some(matrix),
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl std::fmt::Display) -> Self {
        Self {
            matrix: None,
            success: false,
            error: Some(error.to_string()),
        }
    }

    /// Row-major 3×3 matrix mapping camera points to projector points.
    pub fn matrix(&self) -> Option<&[[f64; 3]; 3]> {
        self.matrix.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Estimate the homography taking `camera_points` onto `projector_points`.
///
/// Never fails: precondition violations and estimation failures come back as
/// [`HomographyResult::failure`] with the estimator's message.
pub fn estimate_homography(
    camera_points: &[Point],
    projector_points: &[Point],
    params: &RobustHomographyParams,
) -> HomographyResult {
    let src: Vec<Point2<f64>> = camera_points.iter().copied().map(Point2::from).collect();
    let dst: Vec<Point2<f64>> = projector_points.iter().copied().map(Point2::from).collect();

    match estimate_homography_robust(&src, &dst, params) {
        Ok(fit) => {
            log::debug!(
                "homography: {}/{} inliers, rms {:.4}px after {} iterations",
                fit.inliers.len(),
                src.len(),
                fit.inlier_rms,
                fit.iterations
            );
            HomographyResult::success(fit.homography.to_array())
        }
        Err(err) => {
            log::debug!("homography rejected: {err}");
            HomographyResult::failure(err)
        }
    }
}

mod matrix_or_empty {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(m: &Option<[[f64; 3]; 3]>, s: S) -> Result<S::Ok, S::Error> {
        match m {
            Some(rows) => rows.serialize(s),
            None => <[[f64; 3]; 0]>::default().serialize(s),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[[f64; 3]; 3]>, D::Error> {
        let rows = Vec::<[f64; 3]>::deserialize(d)?;
        match rows.len() {
            0 => Ok(None),
            3 => Ok(Some([rows[0], rows[1], rows[2]])),
            n => Err(de::Error::invalid_length(n, &"0 or 3 rows")),
        }
    }
}
