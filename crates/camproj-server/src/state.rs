use std::sync::Arc;

use camproj::config::{ConfigError, ServiceConfig};
use camproj::{ArucoDetector, RobustHomographyParams};

/// Read-only state shared by every request.
#[derive(Clone, Debug)]
pub struct AppState {
    pub detector: Arc<ArucoDetector>,
    pub homography: Arc<RobustHomographyParams>,
}

impl AppState {
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            detector: Arc::new(cfg.build_detector()?),
            homography: Arc::new(cfg.homography.clone()),
        })
    }
}
