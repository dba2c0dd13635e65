//! High-level facade crate for the `camproj-*` workspace.
//!
//! This crate provides:
//! - re-exports of the detector and geometry crates,
//! - end-to-end helpers that take encoded image bytes (raw or base64) to a
//!   [`DetectionResult`], and point lists to a [`HomographyResult`],
//! - the JSON service configuration shared by the server and the CLI.
//!
//! Both result types are total: failures are carried in their `error`
//! field instead of being returned as `Err`.
//!
//! ## Quickstart
//!
//! ```no_run
//! use camproj::{config::ServiceConfig, detect};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ServiceConfig::default();
//! let detector = cfg.build_detector()?;
//! let bytes = std::fs::read("frame.png")?;
//! let result = detect::detect_from_bytes(&detector, &bytes)?;
//! println!("{} markers", result.markers().len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `camproj::core`: rasters, homographies, RANSAC, robust estimation.
//! - `camproj::aruco`: dictionaries and the marker detector.
//! - `camproj::detect`: image ingest and [`DetectionResult`].
//! - `camproj::estimate`: [`HomographyResult`] from point lists.
//! - `camproj::config`: [`config::ServiceConfig`].

pub use camproj_aruco as aruco;
pub use camproj_core as core;

pub use camproj_aruco::{ArucoDetector, DetectorParams, MarkerObservation};
pub use camproj_core::{Homography, HomographyError, RobustHomographyParams};

pub mod config;
pub mod detect;
pub mod estimate;
mod wire;

pub use detect::{DetectionResult, IngestError};
pub use estimate::HomographyResult;
pub use wire::{DetectedMarker, Point};
