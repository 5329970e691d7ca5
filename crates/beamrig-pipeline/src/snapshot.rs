//! Serialisable bundle of rig state.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use beamrig_core::{
    BeamRun, BeamRunId, BraggPeakDepth, Camera, CameraAnalysis, Experiment, Photo,
    RangeCalculation, Setup, SetupCamera,
};
use serde::{Deserialize, Serialize};

use crate::calibration::SetupCameraCalibration;

/// Newest snapshot layout this build reads.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// A camera binding together with its calibration progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupCameraRecord {
    pub binding: SetupCamera,
    pub calibration: SetupCameraCalibration,
}

impl SetupCameraRecord {
    pub fn new(binding: SetupCamera) -> Self {
        let calibration = SetupCameraCalibration::new(binding.id);
        Self {
            binding,
            calibration,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigSnapshot {
    pub schema_version: u32,
    #[serde(default)]
    pub setups: Vec<Setup>,
    #[serde(default)]
    pub cameras: Vec<Camera>,
    #[serde(default)]
    pub setup_cameras: Vec<SetupCameraRecord>,
    #[serde(default)]
    pub experiments: Vec<Experiment>,
    #[serde(default)]
    pub beam_runs: Vec<BeamRun>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub analyses: Vec<CameraAnalysis>,
    #[serde(default)]
    pub range_calculations: Vec<RangeCalculation>,
    #[serde(default)]
    pub bragg_peak_depths: Vec<BraggPeakDepth>,
    /// Backend-computed vector-complete flags; absent runs are unknown.
    #[serde(default)]
    pub vector_complete: BTreeMap<BeamRunId, bool>,
}

impl Default for RigSnapshot {
    fn default() -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            setups: Vec::new(),
            cameras: Vec::new(),
            setup_cameras: Vec::new(),
            experiments: Vec::new(),
            beam_runs: Vec::new(),
            photos: Vec::new(),
            analyses: Vec::new(),
            range_calculations: Vec::new(),
            bragg_peak_depths: Vec::new(),
            vector_complete: BTreeMap::new(),
        }
    }
}

impl RigSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialise snapshot")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json).context("invalid rig snapshot")?;
        if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
            bail!(
                "snapshot schema version {} is newer than supported version {}",
                snapshot.schema_version,
                SNAPSHOT_SCHEMA_VERSION
            );
        }
        Ok(snapshot)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write snapshot {}", path.display()))
    }
}
