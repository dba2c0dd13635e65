//! Request and response bodies specific to the HTTP surface.
//!
//! Detection and homography results are the facade's own types
//! ([`camproj::DetectionResult`], [`camproj::HomographyResult`]).

use camproj::Point;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Version of the marker detection library serving requests.
    pub vision_version: String,
    pub dictionary: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HomographyRequest {
    pub camera_points: Vec<Point>,
    pub projector_points: Vec<Point>,
}
