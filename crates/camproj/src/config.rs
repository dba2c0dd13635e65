//! JSON service configuration.

use std::{fs, path::Path};

use camproj_aruco::{builtins, ArucoDetector, DetectorParams};
use camproj_core::RobustHomographyParams;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unknown dictionary {name:?} (available: {available})")]
    UnknownDictionary { name: String, available: String },
}

fn default_dictionary() -> String {
    builtins::DICT_4X4_50.name.to_string()
}

/// Detector and estimator settings for the service and the CLI.
///
/// Every section is optional in JSON and falls back to its defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_dictionary")]
    pub dictionary: String,
    #[serde(default)]
    pub detector: DetectorParams,
    #[serde(default)]
    pub homography: RobustHomographyParams,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            dictionary: default_dictionary(),
            detector: DetectorParams::default(),
            homography: RobustHomographyParams::default(),
        }
    }
}

impl ServiceConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Build the marker detector for the configured dictionary.
    pub fn build_detector(&self) -> Result<ArucoDetector, ConfigError> {
        let dict = builtins::builtin_dictionary(&self.dictionary).ok_or_else(|| {
            ConfigError::UnknownDictionary {
                name: self.dictionary.clone(),
                available: builtins::BUILTIN_DICTIONARY_NAMES.join(", "),
            }
        })?;
        Ok(ArucoDetector::new(dict, self.detector.clone()))
    }
}
