//! Acquisition duration estimates.
//!
//! `duration = Σ 1/frame_rate + n·write_overhead + n·transfer_overhead` over
//! the `n` photos a run will capture. The overheads are empirical per-photo
//! costs of the rig; inputs are assumed validated (positive frame rates).

use beamrig_core::{
    require_positive, BeamRun, CameraId, CameraSettings, Experiment, Real, RigResult, RunKind,
    RunSettings,
};
use serde::{Deserialize, Serialize};

/// Empirical timing constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationModel {
    /// Seconds spent writing each photo.
    pub write_overhead_s: Real,
    /// Seconds spent transferring each photo.
    pub transfer_overhead_s: Real,
    /// Factor applied to real-run estimates when driving a progress display,
    /// so the indicator finishes after the capture rather than before.
    pub progress_scale: Real,
}

impl Default for DurationModel {
    fn default() -> Self {
        Self {
            write_overhead_s: 0.77,
            transfer_overhead_s: 1.0,
            progress_scale: 1.5,
        }
    }
}

/// Estimate for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDuration {
    pub kind: RunKind,
    pub per_camera: Vec<(CameraId, Real)>,
    /// Expected wall-clock seconds for the whole run.
    pub total_s: Real,
    /// Duration for a progress indicator.
    pub progress_s: Real,
}

impl DurationModel {
    /// Estimate for photos captured at `frame_rates`, one entry per photo.
    pub fn estimate(&self, frame_rates: &[Real]) -> Real {
        let exposure: Real = frame_rates.iter().map(|fr| 1.0 / fr).sum();
        exposure + self.overhead(frame_rates.len() as Real)
    }

    fn overhead(&self, photos: Real) -> Real {
        photos * self.write_overhead_s + photos * self.transfer_overhead_s
    }

    /// Estimate for a list of settings records, one photo each.
    pub fn estimate_settings(&self, settings: &[CameraSettings]) -> RigResult<Real> {
        let rates = settings
            .iter()
            .map(|s| require_positive("frame_rate", s.frame_rate))
            .collect::<RigResult<Vec<_>>>()?;
        Ok(self.estimate(&rates))
    }

    /// One real-run camera: `number_of_images` photos at its frame rate.
    pub fn estimate_real_camera(&self, settings: &CameraSettings) -> RigResult<Real> {
        let frame_rate = require_positive("frame_rate", settings.frame_rate)?;
        let count = Real::from(settings.number_of_images.unwrap_or(1));
        Ok(count / frame_rate + self.overhead(count))
    }

    /// Scale a real-run estimate for progress display.
    pub fn progress_duration(&self, estimate_s: Real) -> Real {
        estimate_s * self.progress_scale
    }

    /// Estimate a run from its current settings.
    ///
    /// Test runs count every gain-sweep point of every camera. Real-run
    /// cameras capture in parallel, so the run takes as long as its slowest
    /// camera. Cameras without settings are skipped.
    pub fn estimate_run(&self, run: &BeamRun, experiment: &Experiment) -> RigResult<RunDuration> {
        let mut per_camera = Vec::new();
        match &run.settings {
            RunSettings::Test { .. } => {
                let mut all = Vec::new();
                for &camera in &experiment.camera_ids {
                    let mut points = Vec::new();
                    for sweep in run.sweeps_for(camera) {
                        points.extend(sweep.photo_settings()?);
                    }
                    if points.is_empty() {
                        continue;
                    }
                    per_camera.push((camera, self.estimate_settings(&points)?));
                    all.extend(points);
                }
                let total_s = self.estimate_settings(&all)?;
                Ok(RunDuration {
                    kind: RunKind::Test,
                    per_camera,
                    total_s,
                    progress_s: total_s,
                })
            }
            RunSettings::Real { .. } => {
                for &camera in &experiment.camera_ids {
                    if let Some(settings) = run.real_settings_for(camera) {
                        per_camera.push((camera, self.estimate_real_camera(settings)?));
                    }
                }
                let total_s = per_camera.iter().map(|(_, s)| *s).fold(0.0, Real::max);
                Ok(RunDuration {
                    kind: RunKind::Real,
                    per_camera,
                    total_s,
                    progress_s: self.progress_duration(total_s),
                })
            }
        }
    }
}
