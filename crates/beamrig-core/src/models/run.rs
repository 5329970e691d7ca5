use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BeamRunId, CameraId, CameraSettings, ExperimentId, GainSweep, SetupId};

/// A measurement campaign on one setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub name: String,
    pub setup_id: SetupId,
    /// Cameras taking part; read-only for the engine.
    pub camera_ids: Vec<CameraId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Test,
    Real,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Test => write!(f, "test"),
            RunKind::Real => write!(f, "real"),
        }
    }
}

/// Per-camera settings owned by a beam run; the variant fixes the run kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunSettings {
    /// Any number of gain sweeps per camera.
    Test { sweeps: Vec<GainSweep> },
    /// At most one record per camera.
    Real { settings: Vec<CameraSettings> },
}

/// One acquisition session within an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamRun {
    pub id: BeamRunId,
    pub experiment_id: ExperimentId,
    /// Operator-facing run number within the experiment.
    pub number: u32,
    /// Set once every planned photo was captured; gates the analyses.
    pub data_taken: bool,
    pub settings: RunSettings,
}

impl BeamRun {
    pub fn new_test(id: BeamRunId, experiment_id: ExperimentId, number: u32) -> Self {
        Self {
            id,
            experiment_id,
            number,
            data_taken: false,
            settings: RunSettings::Test { sweeps: Vec::new() },
        }
    }

    pub fn new_real(id: BeamRunId, experiment_id: ExperimentId, number: u32) -> Self {
        Self {
            id,
            experiment_id,
            number,
            data_taken: false,
            settings: RunSettings::Real {
                settings: Vec::new(),
            },
        }
    }

    pub fn kind(&self) -> RunKind {
        match self.settings {
            RunSettings::Test { .. } => RunKind::Test,
            RunSettings::Real { .. } => RunKind::Real,
        }
    }

    pub fn is_real(&self) -> bool {
        self.kind() == RunKind::Real
    }

    /// Gain sweeps recorded for `camera` (empty for real runs).
    pub fn sweeps_for(&self, camera: CameraId) -> Vec<&GainSweep> {
        match &self.settings {
            RunSettings::Test { sweeps } => {
                sweeps.iter().filter(|s| s.camera_id == camera).collect()
            }
            RunSettings::Real { .. } => Vec::new(),
        }
    }

    /// Settings record for `camera` (always `None` for test runs).
    pub fn real_settings_for(&self, camera: CameraId) -> Option<&CameraSettings> {
        match &self.settings {
            RunSettings::Real { settings } => settings.iter().find(|s| s.camera_id == camera),
            RunSettings::Test { .. } => None,
        }
    }
}
