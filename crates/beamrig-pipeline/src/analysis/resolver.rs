//! Gating of single-camera analyses and the aggregates built on them.
//!
//! Every predicate is a pure function of the entities passed in; callers
//! re-evaluate after each mutation instead of caching results.

use std::collections::BTreeMap;

use beamrig_core::{
    AnalysisId, BeamRun, BeamRunId, BraggPeakDepth, BraggPeakDepthId, CameraAnalysis, CameraId,
    CameraRole, Photo, RangeCalculation, RigError, RigResult, SetupCamera, SetupId,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Camera roles of one setup.
pub fn camera_roles(setup: SetupId, setup_cameras: &[SetupCamera]) -> BTreeMap<CameraId, CameraRole> {
    setup_cameras
        .iter()
        .filter(|sc| sc.setup_id == setup)
        .filter_map(|sc| sc.role.map(|role| (sc.camera_id, role)))
        .collect()
}

/// Data is taken for the run and `camera` has at least one photo in it.
pub fn can_run_single_camera_analysis(run: &BeamRun, camera: CameraId, photos: &[Photo]) -> bool {
    run.data_taken
        && photos
            .iter()
            .any(|p| p.beam_run_id == run.id && p.camera_id == camera)
}

pub fn is_analysis_complete(analysis: &CameraAnalysis) -> bool {
    analysis.is_complete()
}

/// Range calculation follows the backend's vector-complete flag alone.
/// An unknown flag counts as incomplete.
pub fn can_compute_range(vector_complete: Option<bool>) -> bool {
    vector_complete == Some(true)
}

/// Cameras of a run whose analysis is complete, split by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOverview {
    pub top_complete: Vec<CameraId>,
    pub side_complete: Vec<CameraId>,
}

impl AnalysisOverview {
    pub fn evaluate(
        run: &BeamRun,
        analyses: &[CameraAnalysis],
        roles: &BTreeMap<CameraId, CameraRole>,
    ) -> Self {
        let mut overview = Self::default();
        for analysis in analyses
            .iter()
            .filter(|a| a.beam_run_id == run.id && is_analysis_complete(a))
        {
            match roles.get(&analysis.camera_id) {
                Some(CameraRole::Top) => overview.top_complete.push(analysis.camera_id),
                Some(CameraRole::Side) => overview.side_complete.push(analysis.camera_id),
                None => {}
            }
        }
        overview
    }

    /// At least one complete top and one complete side analysis.
    pub fn can_compute_global_bragg_peak(&self) -> bool {
        !self.top_complete.is_empty() && !self.side_complete.is_empty()
    }
}

pub fn can_compute_global_bragg_peak(
    run: &BeamRun,
    analyses: &[CameraAnalysis],
    roles: &BTreeMap<CameraId, CameraRole>,
) -> bool {
    AnalysisOverview::evaluate(run, analyses, roles).can_compute_global_bragg_peak()
}

// ─────────────────────────────────────────────────────────────────────────────
// Mutations
// ─────────────────────────────────────────────────────────────────────────────

fn ensure_real_run(run: &BeamRun) -> RigResult<()> {
    if run.is_real() {
        Ok(())
    } else {
        Err(RigError::precondition(format!(
            "run {} is a test run; analyses apply to real runs",
            run.number
        )))
    }
}

fn ensure_same_run(record: &str, record_run: BeamRunId, run: &BeamRun) -> RigResult<()> {
    if record_run == run.id {
        Ok(())
    } else {
        Err(RigError::validation(format!(
            "{record} belongs to run {record_run}, not {}",
            run.id
        )))
    }
}

/// Store a single-camera analysis; one per camera and run.
pub fn create_analysis(
    run: &BeamRun,
    photos: &[Photo],
    analyses: &mut Vec<CameraAnalysis>,
    analysis: CameraAnalysis,
) -> RigResult<()> {
    ensure_real_run(run)?;
    ensure_same_run("analysis", analysis.beam_run_id, run)?;
    if !can_run_single_camera_analysis(run, analysis.camera_id, photos) {
        return Err(RigError::precondition(format!(
            "camera {} has no photos for run {}",
            analysis.camera_id, run.number
        )));
    }
    if analyses
        .iter()
        .any(|a| a.beam_run_id == run.id && a.camera_id == analysis.camera_id)
    {
        return Err(RigError::precondition(format!(
            "camera {} already has an analysis for run {}",
            analysis.camera_id, run.number
        )));
    }
    debug!(
        "run {}: analysis {} for camera {} (complete={})",
        run.number,
        analysis.id,
        analysis.camera_id,
        analysis.is_complete()
    );
    analyses.push(analysis);
    Ok(())
}

pub fn delete_analysis(
    run: &BeamRun,
    analyses: &mut Vec<CameraAnalysis>,
    id: AnalysisId,
) -> RigResult<CameraAnalysis> {
    ensure_real_run(run)?;
    let index = analyses
        .iter()
        .position(|a| a.id == id && a.beam_run_id == run.id)
        .ok_or_else(|| RigError::validation(format!("no analysis {id} in run {}", run.number)))?;
    let removed = analyses.remove(index);
    info!(
        "run {}: deleted analysis {} of camera {}",
        run.number, removed.id, removed.camera_id
    );
    Ok(removed)
}

/// Store a range calculation; needs data taken and a complete vector.
pub fn create_range_calculation(
    run: &BeamRun,
    vector_complete: Option<bool>,
    ranges: &mut Vec<RangeCalculation>,
    range: RangeCalculation,
) -> RigResult<()> {
    ensure_real_run(run)?;
    ensure_same_run("range calculation", range.beam_run_id, run)?;
    if !run.data_taken {
        return Err(RigError::precondition(format!(
            "no data taken for run {}",
            run.number
        )));
    }
    if !can_compute_range(vector_complete) {
        return Err(RigError::precondition(format!(
            "beam vector for run {} is not complete",
            run.number
        )));
    }
    if ranges
        .iter()
        .any(|r| r.beam_run_id == run.id && r.camera_id == range.camera_id)
    {
        return Err(RigError::precondition(format!(
            "camera {} already has a range calculation for run {}",
            range.camera_id, run.number
        )));
    }
    ranges.push(range);
    Ok(())
}

/// Store the run's Bragg-peak depth; one per run.
pub fn create_bragg_peak_depth(
    run: &BeamRun,
    overview: &AnalysisOverview,
    records: &mut Vec<BraggPeakDepth>,
    record: BraggPeakDepth,
) -> RigResult<()> {
    ensure_real_run(run)?;
    ensure_same_run("Bragg-peak depth", record.beam_run_id, run)?;
    if !overview.can_compute_global_bragg_peak() {
        return Err(RigError::precondition(format!(
            "run {} needs a complete top and a complete side analysis \
             (top: {}, side: {})",
            run.number,
            overview.top_complete.len(),
            overview.side_complete.len()
        )));
    }
    if records.iter().any(|r| r.beam_run_id == run.id) {
        return Err(RigError::precondition(format!(
            "run {} already has a Bragg-peak depth; delete it first",
            run.number
        )));
    }
    records.push(record);
    info!("run {}: Bragg-peak depth created", run.number);
    Ok(())
}

pub fn delete_bragg_peak_depth(
    run: &BeamRun,
    records: &mut Vec<BraggPeakDepth>,
    id: BraggPeakDepthId,
) -> RigResult<BraggPeakDepth> {
    ensure_real_run(run)?;
    let index = records
        .iter()
        .position(|r| r.id == id && r.beam_run_id == run.id)
        .ok_or_else(|| {
            RigError::validation(format!("no Bragg-peak depth {id} in run {}", run.number))
        })?;
    Ok(records.remove(index))
}
