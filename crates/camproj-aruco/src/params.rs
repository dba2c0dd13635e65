use serde::{Deserialize, Serialize};

/// How detected marker corners are polished after decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerRefinement {
    /// Keep the polygon-fit corners (pixel accurate).
    None,
    /// Gradient-based sub-pixel refinement in a small window around each corner.
    #[default]
    Subpix,
}

/// Parameters for [`crate::ArucoDetector`].
///
/// All fields have defaults; a partial JSON object only overrides what it names.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Smallest adaptive-threshold window (pixels, odd).
    pub adaptive_win_min: usize,
    /// Largest adaptive-threshold window (pixels, odd).
    pub adaptive_win_max: usize,
    /// Window size increment between threshold passes.
    pub adaptive_win_step: usize,
    /// A pixel is foreground when it is at least this much darker than its local mean.
    pub adaptive_constant: f32,
    /// Minimum contour perimeter, relative to `max(width, height)`.
    pub min_perimeter_rate: f32,
    /// Maximum contour perimeter, relative to `max(width, height)`.
    pub max_perimeter_rate: f32,
    /// Douglas–Peucker tolerance, relative to the contour length.
    pub polygon_accuracy_rate: f32,
    /// Minimum quad side, relative to the contour length.
    pub min_corner_distance_rate: f32,
    /// Minimum distance (pixels) between any quad corner and the image border.
    pub min_distance_to_border: u32,
    /// Near-identical candidates closer than this (relative to the smaller
    /// perimeter) are collapsed before decoding.
    pub min_marker_distance_rate: f32,
    /// Number of black border cells around the data bits.
    pub marker_border_bits: usize,
    /// Resolution of the rectified patch, pixels per cell.
    pub perspective_remove_pixel_per_cell: usize,
    /// Fraction of each cell ignored on every side when reading a bit.
    pub perspective_remove_ignored_margin_per_cell: f32,
    /// Patches with a lower intensity standard deviation are rejected as blank.
    pub min_otsu_std_dev: f32,
    /// Allowed white border cells, relative to the number of data bits.
    pub max_erroneous_bits_in_border_rate: f32,
    /// Scales the dictionary's correction capacity into a Hamming budget.
    pub error_correction_rate: f32,
    pub corner_refinement: CornerRefinement,
    /// Half-size of the sub-pixel search window (pixels).
    pub corner_refinement_win_size: usize,
    pub corner_refinement_max_iterations: usize,
    /// Stop when a corner moves less than this (pixels) in one iteration.
    pub corner_refinement_min_accuracy: f32,
    /// Collapse same-id detections that overlap into the larger one.
    pub dedup_overlapping: bool,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            adaptive_win_min: 3,
            adaptive_win_max: 23,
            adaptive_win_step: 10,
            adaptive_constant: 7.0,
            min_perimeter_rate: 0.03,
            max_perimeter_rate: 4.0,
            polygon_accuracy_rate: 0.03,
            min_corner_distance_rate: 0.05,
            min_distance_to_border: 3,
            min_marker_distance_rate: 0.125,
            marker_border_bits: 1,
            perspective_remove_pixel_per_cell: 4,
            perspective_remove_ignored_margin_per_cell: 0.13,
            min_otsu_std_dev: 5.0,
            max_erroneous_bits_in_border_rate: 0.35,
            error_correction_rate: 1.0,
            corner_refinement: CornerRefinement::Subpix,
            corner_refinement_win_size: 5,
            corner_refinement_max_iterations: 30,
            corner_refinement_min_accuracy: 0.1,
            dedup_overlapping: true,
        }
    }
}

impl DetectorParams {
    /// Adaptive-threshold window sizes to run, smallest first.
    pub fn threshold_windows(&self) -> Vec<usize> {
        let min = self.adaptive_win_min.max(3);
        let max = self.adaptive_win_max.max(min);
        let step = self.adaptive_win_step.max(1);
        (min..=max).step_by(step).collect()
    }

    /// Hamming budget for a dictionary with `max_correction_bits`.
    pub fn max_hamming(&self, max_correction_bits: u8) -> u8 {
        let rate = self.error_correction_rate.clamp(0.0, 1.0);
        (max_correction_bits as f32 * rate).floor() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows_are_3_13_23() {
        assert_eq!(DetectorParams::default().threshold_windows(), vec![3, 13, 23]);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let params: DetectorParams =
            serde_json::from_str(r#"{ "corner_refinement": "none", "adaptive_constant": 9.0 }"#)
                .expect("parse");
        assert_eq!(params.corner_refinement, CornerRefinement::None);
        assert_eq!(params.adaptive_constant, 9.0);
        assert_eq!(params.marker_border_bits, 1);
    }

    #[test]
    fn hamming_budget_scales_with_rate() {
        let mut params = DetectorParams::default();
        assert_eq!(params.max_hamming(1), 1);
        params.error_correction_rate = 0.6;
        assert_eq!(params.max_hamming(1), 0);
        assert_eq!(params.max_hamming(5), 3);
    }
}
