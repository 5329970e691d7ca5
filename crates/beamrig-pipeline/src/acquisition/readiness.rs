//! Beam-run readiness: which cameras still lack usable settings, and the
//! data-taking transition gated on that.

use beamrig_core::{
    BeamRun, CameraId, CameraSettings, Experiment, GainSweep, Photo, RigError, RigResult,
    RunSettings, SettingsId,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::backend::AcquisitionBackend;

/// Cameras of the run's experiment that cannot be captured yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsCompletedness {
    pub unset_camera_ids: Vec<CameraId>,
}

impl SettingsCompletedness {
    pub fn can_take_data(&self) -> bool {
        self.unset_camera_ids.is_empty()
    }
}

fn camera_is_set(run: &BeamRun, camera: CameraId) -> bool {
    match &run.settings {
        RunSettings::Test { .. } => {
            let sweeps = run.sweeps_for(camera);
            !sweeps.is_empty() && sweeps.iter().all(|s| s.is_complete())
        }
        RunSettings::Real { .. } => run
            .real_settings_for(camera)
            .is_some_and(CameraSettings::is_complete_for_real),
    }
}

/// Evaluate every camera bound to `experiment` against the run's settings.
///
/// A test-run camera is unset without any gain sweep or with any incomplete
/// sweep. A real-run camera is unset without a record or with a record that
/// misses `gain`, `frame_rate`, `number_of_images` or `take_raw_images`.
pub fn settings_completedness(run: &BeamRun, experiment: &Experiment) -> SettingsCompletedness {
    SettingsCompletedness {
        unset_camera_ids: experiment
            .camera_ids
            .iter()
            .copied()
            .filter(|&camera| !camera_is_set(run, camera))
            .collect(),
    }
}

pub fn can_take_data(run: &BeamRun, experiment: &Experiment) -> bool {
    settings_completedness(run, experiment).can_take_data()
}

/// Refuse data taking with the reason a disabled control would show.
pub fn ensure_can_take_data(run: &BeamRun, experiment: &Experiment) -> RigResult<()> {
    if run.data_taken {
        return Err(RigError::precondition(format!(
            "data already taken for run {}",
            run.number
        )));
    }
    let completeness = settings_completedness(run, experiment);
    if !completeness.can_take_data() {
        let ids = completeness
            .unset_camera_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(RigError::precondition(format!(
            "cameras without complete settings: {ids}"
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings mutations
// ─────────────────────────────────────────────────────────────────────────────

fn ensure_member(experiment: &Experiment, camera: CameraId) -> RigResult<()> {
    if experiment.camera_ids.contains(&camera) {
        Ok(())
    } else {
        Err(RigError::validation(format!(
            "camera {camera} is not part of experiment {}",
            experiment.name
        )))
    }
}

/// Create or replace the real-run settings of one camera and return the
/// recomputed completeness.
pub fn upsert_real_settings(
    run: &mut BeamRun,
    experiment: &Experiment,
    settings: CameraSettings,
) -> RigResult<SettingsCompletedness> {
    ensure_member(experiment, settings.camera_id)?;
    settings.validate()?;
    let RunSettings::Real { settings: records } = &mut run.settings else {
        return Err(RigError::precondition(format!(
            "run {} is a test run; use gain sweeps",
            run.number
        )));
    };
    match records.iter_mut().find(|s| s.camera_id == settings.camera_id) {
        Some(existing) => *existing = settings,
        None => records.push(settings),
    }
    let completeness = settings_completedness(run, experiment);
    debug!(
        "run {}: settings saved, unset cameras {:?}",
        run.number, completeness.unset_camera_ids
    );
    Ok(completeness)
}

/// Add a gain sweep to a test run, replacing one with the same id.
pub fn add_gain_sweep(
    run: &mut BeamRun,
    experiment: &Experiment,
    sweep: GainSweep,
) -> RigResult<SettingsCompletedness> {
    ensure_member(experiment, sweep.camera_id)?;
    sweep.validate()?;
    let RunSettings::Test { sweeps } = &mut run.settings else {
        return Err(RigError::precondition(format!(
            "run {} is a real run; gain sweeps only apply to test runs",
            run.number
        )));
    };
    match sweeps.iter_mut().find(|s| s.id == sweep.id) {
        Some(existing) => *existing = sweep,
        None => sweeps.push(sweep),
    }
    let completeness = settings_completedness(run, experiment);
    debug!(
        "run {}: gain sweep saved, unset cameras {:?}",
        run.number, completeness.unset_camera_ids
    );
    Ok(completeness)
}

pub fn remove_gain_sweep(
    run: &mut BeamRun,
    experiment: &Experiment,
    sweep: SettingsId,
) -> RigResult<SettingsCompletedness> {
    let RunSettings::Test { sweeps } = &mut run.settings else {
        return Err(RigError::precondition("real runs have no gain sweeps"));
    };
    let before = sweeps.len();
    sweeps.retain(|s| s.id != sweep);
    if sweeps.len() == before {
        return Err(RigError::validation(format!("no gain sweep {sweep}")));
    }
    Ok(settings_completedness(run, experiment))
}

// ─────────────────────────────────────────────────────────────────────────────
// Data taking
// ─────────────────────────────────────────────────────────────────────────────

/// Settings of every photo the run will capture, in capture order.
///
/// Real runs repeat each camera's record `number_of_images` times; test runs
/// expand each sweep to one photo per gain point.
pub fn capture_plan(run: &BeamRun, experiment: &Experiment) -> RigResult<Vec<CameraSettings>> {
    let mut plan = Vec::new();
    for &camera in &experiment.camera_ids {
        match &run.settings {
            RunSettings::Test { .. } => {
                for sweep in run.sweeps_for(camera) {
                    plan.extend(sweep.photo_settings()?);
                }
            }
            RunSettings::Real { .. } => {
                let settings = run.real_settings_for(camera).ok_or_else(|| {
                    RigError::precondition(format!("camera {camera} has no settings"))
                })?;
                settings.validate()?;
                let count = settings.number_of_images.unwrap_or(0);
                plan.extend((0..count).map(|_| settings.clone()));
            }
        }
    }
    Ok(plan)
}

/// Capture every photo of the run and mark its data as taken.
///
/// If any capture fails the photos already taken in this attempt are
/// discarded and the run stays untaken.
pub fn take_data<B: AcquisitionBackend + ?Sized>(
    run: &mut BeamRun,
    experiment: &Experiment,
    backend: &B,
) -> RigResult<Vec<Photo>> {
    ensure_can_take_data(run, experiment)?;
    let plan = capture_plan(run, experiment)?;

    let mut photos = Vec::with_capacity(plan.len());
    for settings in &plan {
        match backend.capture_photo(run.id, settings.camera_id, settings) {
            Ok(photo) => photos.push(photo),
            Err(err) => {
                warn!(
                    "run {}: capture failed after {} of {} photos: {err}",
                    run.number,
                    photos.len(),
                    plan.len()
                );
                for photo in &photos {
                    if let Err(discard) = backend.discard_photo(photo.id) {
                        warn!("run {}: could not discard photo {}: {discard}", run.number, photo.id);
                    }
                }
                return Err(err);
            }
        }
    }

    run.data_taken = true;
    info!("run {}: data taken ({} photos)", run.number, photos.len());
    Ok(photos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamrig_core::{BeamRunId, ExperimentId, PhotoId, SetupId};
    use std::cell::{Cell, RefCell};

    fn experiment(cameras: &[u64]) -> Experiment {
        Experiment {
            id: ExperimentId(1),
            name: "depth scan".to_string(),
            setup_id: SetupId(1),
            camera_ids: cameras.iter().map(|&c| CameraId(c)).collect(),
        }
    }

    fn complete_real(camera: u64) -> CameraSettings {
        CameraSettings {
            gain: Some(4.0),
            frame_rate: Some(10.0),
            number_of_images: Some(2),
            take_raw_images: Some(false),
            ..CameraSettings::new(SettingsId(camera * 10), CameraId(camera))
        }
    }

    fn sweep(id: u64, camera: u64) -> GainSweep {
        GainSweep {
            frame_rate: Some(15.0),
            lowest_gain: Some(10.0),
            highest_gain: Some(30.0),
            gain_increment: Some(10.0),
            ..GainSweep::new(SettingsId(id), CameraId(camera))
        }
    }

    #[test]
    fn real_run_lists_missing_and_incomplete_cameras() {
        let exp = experiment(&[1, 2, 3]);
        let mut run = BeamRun::new_real(BeamRunId(1), exp.id, 1);
        upsert_real_settings(&mut run, &exp, complete_real(1)).unwrap();
        let partial = CameraSettings {
            gain: Some(2.0),
            ..CameraSettings::new(SettingsId(20), CameraId(2))
        };
        let completeness = upsert_real_settings(&mut run, &exp, partial).unwrap();
        assert_eq!(completeness.unset_camera_ids, vec![CameraId(2), CameraId(3)]);
        assert!(!completeness.can_take_data());
    }

    #[test]
    fn last_camera_flips_readiness() {
        let exp = experiment(&[1, 2]);
        let mut run = BeamRun::new_real(BeamRunId(1), exp.id, 1);
        assert!(!upsert_real_settings(&mut run, &exp, complete_real(1))
            .unwrap()
            .can_take_data());
        assert!(upsert_real_settings(&mut run, &exp, complete_real(2))
            .unwrap()
            .can_take_data());
        assert!(can_take_data(&run, &exp));
    }

    #[test]
    fn invalid_settings_leave_run_untouched() {
        let exp = experiment(&[1]);
        let mut run = BeamRun::new_real(BeamRunId(1), exp.id, 1);
        let bad = CameraSettings {
            frame_rate: Some(0.0),
            ..complete_real(1)
        };
        assert!(matches!(
            upsert_real_settings(&mut run, &exp, bad),
            Err(RigError::Validation(_))
        ));
        assert!(run.real_settings_for(CameraId(1)).is_none());
    }

    #[test]
    fn settings_for_foreign_camera_rejected() {
        let exp = experiment(&[1]);
        let mut run = BeamRun::new_real(BeamRunId(1), exp.id, 1);
        assert!(upsert_real_settings(&mut run, &exp, complete_real(9)).is_err());
    }

    #[test]
    fn test_run_needs_complete_sweep_per_camera() {
        let exp = experiment(&[1, 2]);
        let mut run = BeamRun::new_test(BeamRunId(2), exp.id, 2);
        let completeness = add_gain_sweep(&mut run, &exp, sweep(1, 1)).unwrap();
        assert_eq!(completeness.unset_camera_ids, vec![CameraId(2)]);

        let incomplete = GainSweep {
            highest_gain: None,
            ..sweep(2, 2)
        };
        let completeness = add_gain_sweep(&mut run, &exp, incomplete).unwrap();
        assert_eq!(completeness.unset_camera_ids, vec![CameraId(2)]);

        assert!(add_gain_sweep(&mut run, &exp, sweep(2, 2))
            .unwrap()
            .can_take_data());
        assert!(!remove_gain_sweep(&mut run, &exp, SettingsId(2))
            .unwrap()
            .can_take_data());
    }

    #[test]
    fn kind_mismatch_is_a_precondition() {
        let exp = experiment(&[1]);
        let mut test_run = BeamRun::new_test(BeamRunId(1), exp.id, 1);
        let mut real_run = BeamRun::new_real(BeamRunId(2), exp.id, 2);
        assert!(matches!(
            upsert_real_settings(&mut test_run, &exp, complete_real(1)),
            Err(RigError::PreconditionNotMet(_))
        ));
        assert!(matches!(
            add_gain_sweep(&mut real_run, &exp, sweep(1, 1)),
            Err(RigError::PreconditionNotMet(_))
        ));
    }

    #[test]
    fn capture_plan_expands_sweeps_and_image_counts() {
        let exp = experiment(&[1]);
        let mut test_run = BeamRun::new_test(BeamRunId(1), exp.id, 1);
        add_gain_sweep(&mut test_run, &exp, sweep(1, 1)).unwrap();
        let gains: Vec<_> = capture_plan(&test_run, &exp)
            .unwrap()
            .iter()
            .map(|s| s.gain.unwrap())
            .collect();
        assert_eq!(gains, vec![10.0, 20.0, 30.0]);

        let mut real_run = BeamRun::new_real(BeamRunId(2), exp.id, 2);
        upsert_real_settings(&mut real_run, &exp, complete_real(1)).unwrap();
        assert_eq!(capture_plan(&real_run, &exp).unwrap().len(), 2);
    }

    #[test]
    fn unbounded_sweep_is_rejected_before_planning() {
        let exp = experiment(&[1]);
        let mut run = BeamRun::new_test(BeamRunId(1), exp.id, 1);
        let unbounded = GainSweep {
            lowest_gain: Some(1.0),
            highest_gain: Some(f64::INFINITY),
            gain_increment: Some(1.0),
            ..sweep(1, 1)
        };
        assert!(matches!(
            add_gain_sweep(&mut run, &exp, unbounded.clone()),
            Err(RigError::Validation(_))
        ));
        assert!(!can_take_data(&run, &exp));

        // A sweep that bypassed validation, e.g. from a hand-edited snapshot.
        if let RunSettings::Test { sweeps } = &mut run.settings {
            sweeps.push(unbounded);
        }
        assert!(matches!(
            capture_plan(&run, &exp),
            Err(RigError::Validation(_))
        ));
    }

    struct Camera {
        fail_at: Option<usize>,
        taken: Cell<usize>,
        discarded: RefCell<Vec<PhotoId>>,
    }

    impl Camera {
        fn new(fail_at: Option<usize>) -> Self {
            Self {
                fail_at,
                taken: Cell::new(0),
                discarded: RefCell::new(Vec::new()),
            }
        }
    }

    impl AcquisitionBackend for Camera {
        fn save_settings(
            &self,
            _run: BeamRunId,
            settings: &CameraSettings,
        ) -> RigResult<CameraSettings> {
            Ok(settings.clone())
        }

        fn capture_photo(
            &self,
            run: BeamRunId,
            camera: CameraId,
            settings: &CameraSettings,
        ) -> RigResult<Photo> {
            let n = self.taken.get();
            if self.fail_at == Some(n) {
                return Err(RigError::remote("camera disconnected"));
            }
            self.taken.set(n + 1);
            Ok(Photo {
                id: PhotoId(n as u64 + 1),
                beam_run_id: run,
                camera_id: camera,
                settings_id: Some(settings.id),
                gain: settings.gain,
            })
        }

        fn discard_photo(&self, photo: PhotoId) -> RigResult<()> {
            self.discarded.borrow_mut().push(photo);
            Ok(())
        }
    }

    #[test]
    fn take_data_refused_while_cameras_unset() {
        let exp = experiment(&[1, 2]);
        let mut run = BeamRun::new_real(BeamRunId(1), exp.id, 1);
        upsert_real_settings(&mut run, &exp, complete_real(1)).unwrap();
        let backend = Camera::new(None);
        let err = take_data(&mut run, &exp, &backend).unwrap_err();
        assert!(matches!(err, RigError::PreconditionNotMet(ref m) if m.contains('2')));
        assert_eq!(backend.taken.get(), 0);
        assert!(!run.data_taken);
    }

    #[test]
    fn take_data_marks_run_and_returns_photos() {
        let exp = experiment(&[1, 2]);
        let mut run = BeamRun::new_real(BeamRunId(1), exp.id, 1);
        upsert_real_settings(&mut run, &exp, complete_real(1)).unwrap();
        upsert_real_settings(&mut run, &exp, complete_real(2)).unwrap();
        let photos = take_data(&mut run, &exp, &Camera::new(None)).unwrap();
        assert_eq!(photos.len(), 4);
        assert!(run.data_taken);
        assert!(take_data(&mut run, &exp, &Camera::new(None)).is_err());
    }

    #[test]
    fn failed_capture_discards_attempt() {
        let exp = experiment(&[1]);
        let mut run = BeamRun::new_test(BeamRunId(1), exp.id, 1);
        add_gain_sweep(&mut run, &exp, sweep(1, 1)).unwrap();
        let backend = Camera::new(Some(2));
        assert!(matches!(
            take_data(&mut run, &exp, &backend),
            Err(RigError::RemoteOperation(_))
        ));
        assert!(!run.data_taken);
        assert_eq!(*backend.discarded.borrow(), vec![PhotoId(1), PhotoId(2)]);
    }
}
