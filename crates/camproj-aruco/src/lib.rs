//! ArUco marker detection.
//!
//! This crate finds square fiducials of a fixed dictionary in a grayscale
//! image:
//! - local adaptive thresholding at a few window sizes,
//! - outer contours of dark blobs, simplified to convex quads,
//! - perspective rectification and Otsu bit reading,
//! - dictionary matching across the four rotations,
//! - optional sub-pixel corner refinement.
//!
//! Corners are reported in the marker's own frame (its top-left first), in
//! pixel coordinates where pixel centres sit at integer positions.
//!
//! ## Quickstart
//!
//! ```no_run
//! use camproj_aruco::{builtins, ArucoDetector, DetectorParams};
//! use camproj_core::GrayImageView;
//!
//! let pixels = vec![255u8; 640 * 480];
//! let view = GrayImageView { width: 640, height: 480, data: &pixels };
//! let detector = ArucoDetector::new(builtins::DICT_4X4_50, DetectorParams::default());
//! for m in detector.detect(&view) {
//!     println!("id {} at {:?}", m.id, m.corners);
//! }
//! ```

pub mod builtins;
mod contour;
mod decode;
mod detector;
mod dictionary;
mod matcher;
mod params;
mod quad;
mod refine;
mod threshold;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use detector::{ArucoDetector, MarkerObservation};
pub use dictionary::Dictionary;
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use params::{CornerRefinement, DetectorParams};

/// Version of the detection library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
