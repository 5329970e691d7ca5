//! Typed storage capabilities the engine depends on.
//!
//! Each trait covers one family of entities. Reads return owned copies;
//! writes replace whole records so a rejected operation never leaves a
//! half-applied change behind. [`InMemoryRig`] implements every trait over a
//! [`RigSnapshot`].

use beamrig_core::{
    BeamRun, BeamRunId, BraggPeakDepth, CameraAnalysis, CameraId, CameraSettings, Experiment,
    ExperimentId, Photo, PhotoId, RangeCalculation, RigError, RigResult, Setup, SetupCamera,
    SetupCameraId, SetupId,
};

use crate::calibration::SetupCameraCalibration;
use crate::snapshot::RigSnapshot;

pub trait SetupCameraRepository {
    fn setup(&self, id: SetupId) -> RigResult<Setup>;

    fn setup_camera(&self, id: SetupCameraId) -> RigResult<SetupCamera>;

    /// Bindings of every camera mounted in `setup`.
    fn setup_cameras(&self, setup: SetupId) -> Vec<SetupCamera>;

    fn calibration(&self, id: SetupCameraId) -> RigResult<SetupCameraCalibration>;

    fn store_calibration(&mut self, calibration: SetupCameraCalibration) -> RigResult<()>;
}

pub trait SettingsRepository {
    fn experiment(&self, id: ExperimentId) -> RigResult<Experiment>;

    fn beam_run(&self, id: BeamRunId) -> RigResult<BeamRun>;

    fn store_beam_run(&mut self, run: BeamRun) -> RigResult<()>;

    /// Real-run settings of one camera, if recorded.
    fn settings_for_camera(
        &self,
        run: BeamRunId,
        camera: CameraId,
    ) -> RigResult<Option<CameraSettings>> {
        Ok(self.beam_run(run)?.real_settings_for(camera).cloned())
    }
}

pub trait PhotoRepository {
    fn photos(&self, run: BeamRunId) -> Vec<Photo>;

    fn add_photos(&mut self, photos: Vec<Photo>);

    fn delete_photo(&mut self, id: PhotoId) -> RigResult<Photo>;
}

pub trait AnalysisRepository {
    fn analyses(&self, run: BeamRunId) -> Vec<CameraAnalysis>;

    fn store_analyses(&mut self, run: BeamRunId, analyses: Vec<CameraAnalysis>);

    fn range_calculations(&self, run: BeamRunId) -> Vec<RangeCalculation>;

    fn store_range_calculations(&mut self, run: BeamRunId, ranges: Vec<RangeCalculation>);

    fn bragg_peak_depths(&self, run: BeamRunId) -> Vec<BraggPeakDepth>;

    fn store_bragg_peak_depths(&mut self, run: BeamRunId, records: Vec<BraggPeakDepth>);

    /// Backend vector-complete flag; `None` when not reported.
    fn vector_complete(&self, run: BeamRunId) -> Option<bool>;
}

/// Every capability the engine needs.
pub trait RigRepository:
    SetupCameraRepository + SettingsRepository + PhotoRepository + AnalysisRepository
{
}

impl<T> RigRepository for T where
    T: SetupCameraRepository + SettingsRepository + PhotoRepository + AnalysisRepository
{
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory implementation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InMemoryRig {
    snapshot: RigSnapshot,
}

impl InMemoryRig {
    pub fn new(snapshot: RigSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &RigSnapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> RigSnapshot {
        self.snapshot
    }

    pub fn set_vector_complete(&mut self, run: BeamRunId, complete: bool) {
        self.snapshot.vector_complete.insert(run, complete);
    }
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> RigError {
    RigError::validation(format!("unknown {kind} {id}"))
}

/// Replace the records of `run` in `all` with `records`.
fn replace_for_run<T>(
    all: &mut Vec<T>,
    run: BeamRunId,
    records: Vec<T>,
    run_of: impl Fn(&T) -> BeamRunId,
) {
    all.retain(|r| run_of(r) != run);
    all.extend(records);
}

impl SetupCameraRepository for InMemoryRig {
    fn setup(&self, id: SetupId) -> RigResult<Setup> {
        self.snapshot
            .setups
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| not_found("setup", id))
    }

    fn setup_camera(&self, id: SetupCameraId) -> RigResult<SetupCamera> {
        self.snapshot
            .setup_cameras
            .iter()
            .find(|r| r.binding.id == id)
            .map(|r| r.binding.clone())
            .ok_or_else(|| not_found("setup camera", id))
    }

    fn setup_cameras(&self, setup: SetupId) -> Vec<SetupCamera> {
        self.snapshot
            .setup_cameras
            .iter()
            .filter(|r| r.binding.setup_id == setup)
            .map(|r| r.binding.clone())
            .collect()
    }

    fn calibration(&self, id: SetupCameraId) -> RigResult<SetupCameraCalibration> {
        self.snapshot
            .setup_cameras
            .iter()
            .find(|r| r.binding.id == id)
            .map(|r| r.calibration.clone())
            .ok_or_else(|| not_found("setup camera", id))
    }

    fn store_calibration(&mut self, calibration: SetupCameraCalibration) -> RigResult<()> {
        let id = calibration.setup_camera_id;
        let record = self
            .snapshot
            .setup_cameras
            .iter_mut()
            .find(|r| r.binding.id == id)
            .ok_or_else(|| not_found("setup camera", id))?;
        record.calibration = calibration;
        Ok(())
    }
}

impl SettingsRepository for InMemoryRig {
    fn experiment(&self, id: ExperimentId) -> RigResult<Experiment> {
        self.snapshot
            .experiments
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| not_found("experiment", id))
    }

    fn beam_run(&self, id: BeamRunId) -> RigResult<BeamRun> {
        self.snapshot
            .beam_runs
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| not_found("beam run", id))
    }

    fn store_beam_run(&mut self, run: BeamRun) -> RigResult<()> {
        let slot = self
            .snapshot
            .beam_runs
            .iter_mut()
            .find(|r| r.id == run.id)
            .ok_or_else(|| not_found("beam run", run.id))?;
        *slot = run;
        Ok(())
    }
}

impl PhotoRepository for InMemoryRig {
    fn photos(&self, run: BeamRunId) -> Vec<Photo> {
        self.snapshot
            .photos
            .iter()
            .filter(|p| p.beam_run_id == run)
            .cloned()
            .collect()
    }

    fn add_photos(&mut self, photos: Vec<Photo>) {
        self.snapshot.photos.extend(photos);
    }

    fn delete_photo(&mut self, id: PhotoId) -> RigResult<Photo> {
        let index = self
            .snapshot
            .photos
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| not_found("photo", id))?;
        Ok(self.snapshot.photos.remove(index))
    }
}

impl AnalysisRepository for InMemoryRig {
    fn analyses(&self, run: BeamRunId) -> Vec<CameraAnalysis> {
        self.snapshot
            .analyses
            .iter()
            .filter(|a| a.beam_run_id == run)
            .cloned()
            .collect()
    }

    fn store_analyses(&mut self, run: BeamRunId, analyses: Vec<CameraAnalysis>) {
        replace_for_run(&mut self.snapshot.analyses, run, analyses, |a| {
            a.beam_run_id
        });
    }

    fn range_calculations(&self, run: BeamRunId) -> Vec<RangeCalculation> {
        self.snapshot
            .range_calculations
            .iter()
            .filter(|r| r.beam_run_id == run)
            .cloned()
            .collect()
    }

    fn store_range_calculations(&mut self, run: BeamRunId, ranges: Vec<RangeCalculation>) {
        replace_for_run(&mut self.snapshot.range_calculations, run, ranges, |r| {
            r.beam_run_id
        });
    }

    fn bragg_peak_depths(&self, run: BeamRunId) -> Vec<BraggPeakDepth> {
        self.snapshot
            .bragg_peak_depths
            .iter()
            .filter(|r| r.beam_run_id == run)
            .cloned()
            .collect()
    }

    fn store_bragg_peak_depths(&mut self, run: BeamRunId, records: Vec<BraggPeakDepth>) {
        replace_for_run(&mut self.snapshot.bragg_peak_depths, run, records, |r| {
            r.beam_run_id
        });
    }

    fn vector_complete(&self, run: BeamRunId) -> Option<bool> {
        self.snapshot.vector_complete.get(&run).copied()
    }
}
