use camproj_aruco::MarkerObservation;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A 2D point as it appears in JSON: `{"x": .., "y": ..}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<Point> for Point2<f64> {
    fn from(p: Point) -> Self {
        Point2::new(p.x, p.y)
    }
}

impl From<Point2<f32>> for Point {
    fn from(p: Point2<f32>) -> Self {
        Self::new(p.x as f64, p.y as f64)
    }
}

/// One marker in a detection response; corners are TL, TR, BR, BL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub id: u32,
    pub corners: [Point; 4],
}

impl From<&MarkerObservation> for DetectedMarker {
    fn from(m: &MarkerObservation) -> Self {
        Self {
            id: m.id,
            corners: m.corners.map(Point::from),
        }
    }
}
