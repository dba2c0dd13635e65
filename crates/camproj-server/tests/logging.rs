use log::{Level, LevelFilter, Metadata};

#[test]
fn tracing_subscriber_receives_log_records() {
    camproj::core::init_tracing(false, "info");

    assert_ne!(log::max_level(), LevelFilter::Off);
    let meta = Metadata::builder()
        .level(Level::Error)
        .target("camproj_aruco::detector")
        .build();
    assert!(log::logger().enabled(&meta));
}
