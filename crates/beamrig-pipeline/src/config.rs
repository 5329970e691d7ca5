//! Tunable constants of the engine.
//!
//! All values have defaults matching the rig's observed behavior and can be
//! overridden from a JSON file; missing fields keep their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::acquisition::DurationModel;
use crate::sync::PollIntervals;

/// Calibration stage thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Images required before a distortion calibration may be saved.
    pub min_distortion_images: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_distortion_images: 5,
        }
    }
}

/// Aggregate engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub calibration: CalibrationConfig,
    pub duration: DurationModel,
    pub polling: PollIntervals,
}

impl RigConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid rig configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&data)
    }
}
