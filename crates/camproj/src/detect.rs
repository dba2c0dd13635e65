//! Image ingest and end-to-end marker detection.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use camproj_aruco::ArucoDetector;
use camproj_core::GrayImageView;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::wire::DetectedMarker;

/// Standard alphabet; padding optional, stray trailing bits tolerated.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Why an encoded image could not be turned into a raster.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("Invalid image data: empty payload")]
    Empty,
    #[error("Invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid image data: {0}")]
    Decode(#[from] image::ImageError),
}

/// Markers found in one image, or the reason there are none.
///
/// Either `error` is set and the result is otherwise empty (no markers, zero
/// dimensions), or `error` is `None` and the dimensions are the image's.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    markers: Vec<DetectedMarker>,
    image_width: u32,
    image_height: u32,
    error: Option<String>,
}

impl DetectionResult {
    pub fn success(image_width: u32, image_height: u32, markers: Vec<DetectedMarker>) -> Self {
        Self {
            markers,
            image_width,
            image_height,
            error: None,
        }
    }

    /// An empty result carrying `error`'s message verbatim.
    pub fn failure(error: impl std::fmt::Display) -> Self {
        Self {
            markers: Vec::new(),
            image_width: 0,
            image_height: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn markers(&self) -> &[DetectedMarker] {
        &self.markers
    }

    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Convert an `image::GrayImage` into the lightweight `camproj-core` view type.
pub fn gray_view(img: &image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode any supported encoded image (PNG, JPEG, ...) to 8-bit grayscale.
pub fn decode_gray(bytes: &[u8]) -> Result<image::GrayImage, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::Empty);
    }
    Ok(image::load_from_memory(bytes)?.to_luma8())
}

/// Decode a base64 payload, optionally wrapped as a data URL
/// (`data:image/png;base64,....`). Everything up to the first comma is
/// dropped; ASCII whitespace is ignored.
pub fn decode_base64_payload(payload: &str) -> Result<Vec<u8>, IngestError> {
    let body = payload
        .split_once(',')
        .map_or(payload, |(_, rest)| rest);
    let compact: String = body
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Err(IngestError::Empty);
    }
    Ok(LENIENT_BASE64.decode(compact)?)
}

/// Run `detector` on a decoded grayscale image.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(detector, img), fields(width = img.width(), height = img.height()))
)]
pub fn detect_image(detector: &ArucoDetector, img: &image::GrayImage) -> DetectionResult {
    let observations = detector.detect(&gray_view(img));
    let markers = observations.iter().map(DetectedMarker::from).collect();
    DetectionResult::success(img.width(), img.height(), markers)
}

/// Decode encoded image bytes and detect markers.
///
/// Undecodable input is an `Err` so that callers can answer it differently
/// from a successful detection.
pub fn detect_from_bytes(
    detector: &ArucoDetector,
    bytes: &[u8],
) -> Result<DetectionResult, IngestError> {
    let img = decode_gray(bytes)?;
    Ok(detect_image(detector, &img))
}

/// Decode a base64 (or data URL) image and detect markers. Never fails:
/// ingest errors come back inside the result.
pub fn detect_from_base64(detector: &ArucoDetector, payload: &str) -> DetectionResult {
    let bytes = match decode_base64_payload(payload) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::debug!("base64 payload rejected: {err}");
            return DetectionResult::failure(err);
        }
    };
    detect_from_bytes(detector, &bytes).unwrap_or_else(|err| {
        log::debug!("image payload rejected: {err}");
        DetectionResult::failure(err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_is_stripped() {
        let plain = decode_base64_payload("aGVsbG8=").expect("plain");
        let url = decode_base64_payload("data:text/plain;base64,aGVsbG8=").expect("url");
        assert_eq!(plain, b"hello");
        assert_eq!(url, b"hello");
    }

    #[test]
    fn padding_and_whitespace_are_optional() {
        assert_eq!(decode_base64_payload("aGVsbG8").expect("unpadded"), b"hello");
        assert_eq!(decode_base64_payload("aGVs\nbG8=\n").expect("wrapped"), b"hello");
    }

    #[test]
    fn empty_and_garbage_payloads_are_errors() {
        assert!(matches!(decode_base64_payload(""), Err(IngestError::Empty)));
        assert!(matches!(
            decode_base64_payload("data:image/png;base64,"),
            Err(IngestError::Empty)
        ));
        assert!(matches!(
            decode_base64_payload("not base64!"),
            Err(IngestError::Base64(_))
        ));
    }

    #[test]
    fn failure_result_is_empty() {
        let r = DetectionResult::failure(IngestError::Empty);
        assert!(!r.is_success());
        assert!(r.markers().is_empty());
        assert_eq!((r.image_width(), r.image_height()), (0, 0));
        assert_eq!(r.error(), Some("Invalid image data: empty payload"));
    }

    #[test]
    fn undecodable_bytes_are_rejected() {
        assert!(matches!(
            decode_gray(b"definitely not an image"),
            Err(IngestError::Decode(_))
        ));
        assert!(matches!(decode_gray(&[]), Err(IngestError::Empty)));
    }
}
