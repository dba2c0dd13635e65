use std::path::Path;

use approx::assert_abs_diff_eq;
use assert_cmd::Command;
use camproj::core::GrayImage;
use camproj::{DetectionResult, HomographyResult};
use camproj_aruco::builtins::DICT_4X4_50;
use camproj_aruco::test_utils::{paste, render_marker};
use predicates::prelude::*;
use serde_json::json;

fn camproj() -> Command {
    Command::new(env!("CARGO_BIN_EXE_camproj"))
}

fn write_points(path: &Path, cam: &[(f64, f64)], proj: &[(f64, f64)]) {
    let pts = |v: &[(f64, f64)]| {
        v.iter()
            .map(|&(x, y)| json!({ "x": x, "y": y }))
            .collect::<Vec<_>>()
    };
    let req = json!({ "camera_points": pts(cam), "projector_points": pts(proj) });
    std::fs::write(path, req.to_string()).expect("write points");
}

fn write_marker_png(path: &Path, id: u32) {
    let marker = render_marker(&DICT_4X4_50, id, 0, 10).expect("id");
    let mut canvas = GrayImage::filled(180, 150, 255);
    paste(&mut canvas, &marker, 60, 40);
    image::GrayImage::from_raw(180, 150, canvas.data)
        .expect("buffer")
        .save(path)
        .expect("png");
}

#[test]
fn homography_prints_scale_and_offset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("points.json");
    let cam = [(0.0, 0.0), (100.0, 0.0), (100.0, 80.0), (0.0, 80.0), (40.0, 30.0)];
    let proj: Vec<_> = cam.iter().map(|&(x, y)| (2.0 * x + 5.0, 2.0 * y + 3.0)).collect();
    write_points(&path, &cam, &proj);

    let out = camproj()
        .args(["--log-level", "warn", "homography"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let result: HomographyResult = serde_json::from_slice(&out).expect("json");
    assert!(result.is_success(), "{:?}", result.error());
    let m = result.matrix().expect("matrix");
    let s = m[2][2];
    let want = [[2.0, 0.0, 5.0], [0.0, 2.0, 3.0], [0.0, 0.0, 1.0]];
    for (row, want_row) in m.iter().zip(&want) {
        for (v, w) in row.iter().zip(want_row) {
            assert_abs_diff_eq!(v / s, *w, epsilon = 1e-6);
        }
    }
}

#[test]
fn homography_with_three_points_reports_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("points.json");
    let three = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
    write_points(&path, &three, &three);

    camproj()
        .arg("homography")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Need at least 4 point correspondences"))
        .stdout(predicate::str::contains("\"success\":false"));
}

#[test]
fn detect_prints_marker_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("frame.png");
    write_marker_png(&path, 27);

    let out = camproj()
        .arg("detect")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let result: DetectionResult = serde_json::from_slice(&out).expect("json");
    assert!(result.is_success());
    assert_eq!((result.image_width(), result.image_height()), (180, 150));
    let ids: Vec<u32> = result.markers().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![27]);
}

#[test]
fn detect_rejects_junk_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("junk.png");
    std::fs::write(&path, b"definitely not a png").expect("write");

    camproj()
        .arg("detect")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn config_with_unknown_dictionary_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = dir.path().join("service.json");
    std::fs::write(&cfg, r#"{"dictionary": "DICT_7X7_1000"}"#).expect("write");
    let img = dir.path().join("frame.png");
    write_marker_png(&img, 3);

    camproj()
        .arg("--config")
        .arg(&cfg)
        .arg("detect")
        .arg(&img)
        .assert()
        .failure()
        .stderr(predicate::str::contains("DICT_7X7_1000"));
}

#[test]
fn serve_rejects_invalid_origin_before_binding() {
    camproj()
        .args(["serve", "--port", "0", "--allow-origin", "bad\norigin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidOrigin"));
}

#[test]
fn unknown_log_level_is_a_usage_error() {
    camproj()
        .args(["--log-level", "loud", "detect", "x.png"])
        .assert()
        .code(2);
}
