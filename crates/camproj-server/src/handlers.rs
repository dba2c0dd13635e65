use std::any::Any;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use camproj::detect::{detect_from_base64, detect_from_bytes};
use camproj::estimate::estimate_homography;
use camproj::{DetectionResult, HomographyResult};
use serde_json::{Map, Value};

use crate::state::AppState;
use crate::wire::{HealthResponse, HomographyRequest};

/// Multipart field carrying the uploaded image.
const IMAGE_FIELD: &str = "image";

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        vision_version: camproj::aruco::VERSION.to_string(),
        dictionary: state.detector.dictionary().name.to_string(),
    })
}

/// `POST /detect`: multipart upload. Unreadable uploads answer 400 with an
/// error-carrying body; everything else answers 200.
pub(crate) async fn detect_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<DetectionResult>) {
    let bytes = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(IMAGE_FIELD) => match field.bytes().await {
                Ok(bytes) => break bytes,
                Err(err) => return bad_request(err),
            },
            Ok(Some(_)) => continue,
            Ok(None) => return bad_request(format!("Missing form field \"{IMAGE_FIELD}\"")),
            Err(err) => return bad_request(err),
        }
    };

    let detector = state.detector.clone();
    match run_blocking(move || detect_from_bytes(&detector, &bytes)).await {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)),
        Ok(Err(err)) => bad_request(err),
        Err(msg) => (StatusCode::OK, Json(DetectionResult::failure(msg))),
    }
}

/// `POST /detect-base64`: `{"image": "<base64 or data URL>"}`. Always 200.
pub(crate) async fn detect_base64(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> Json<DetectionResult> {
    let payload = match body.get(IMAGE_FIELD) {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Json(DetectionResult::failure(format!(
                "\"{IMAGE_FIELD}\" must be a string, got {other}"
            )))
        }
    };

    let detector = state.detector.clone();
    let result = run_blocking(move || detect_from_base64(&detector, &payload))
        .await
        .unwrap_or_else(DetectionResult::failure);
    Json(result)
}

/// `POST /homography`. Always 200 with a structured result.
pub(crate) async fn homography(
    State(state): State<AppState>,
    Json(req): Json<HomographyRequest>,
) -> Json<HomographyResult> {
    let params = state.homography.clone();
    let result = run_blocking(move || {
        estimate_homography(&req.camera_points, &req.projector_points, &params)
    })
    .await
    .unwrap_or_else(HomographyResult::failure);
    Json(result)
}

fn bad_request(err: impl std::fmt::Display) -> (StatusCode, Json<DetectionResult>) {
    tracing::debug!(error = %err, "rejecting upload");
    (StatusCode::BAD_REQUEST, Json(DetectionResult::failure(err)))
}

/// Run CPU-bound work off the async workers. A panic comes back as its message.
async fn run_blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|err| {
        let msg = if err.is_panic() {
            panic_message(err.into_panic())
        } else {
            err.to_string()
        };
        tracing::error!(error = %msg, "blocking task failed");
        msg
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "detection task panicked".to_string()
    }
}
