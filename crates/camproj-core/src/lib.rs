//! Core types and utilities for camproj.
//!
//! This crate is small and purely geometric: grayscale rasters, projective
//! transforms, and the robust estimator that maps camera points onto
//! projector points. It does not know about markers or HTTP.

mod homography;
mod image;
mod logger;
pub mod ransac;
mod robust;

pub use homography::{
    dlt_homography, exact_homography, has_collinear_triple, homography_from_4pt,
    warp_perspective_gray, Homography,
};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use robust::{
    check_correspondences, estimate_homography_robust, HomographyError, HomographyFit,
    RobustHomographyParams, MIN_CORRESPONDENCES,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
