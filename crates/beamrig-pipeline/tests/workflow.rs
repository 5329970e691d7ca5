use std::cell::Cell;
use std::collections::BTreeMap;

use beamrig_core::{
    AnalysisId, BeamRun, BeamRunId, BraggPeakDepth, BraggPeakDepthId, CalibrationImage,
    CameraAnalysis, CameraId, CameraRole, CameraSettings, ColourChannel, DistortionCalibration,
    DistortionSettings, Experiment, ExperimentId, GainSweep, HomographyOutcome, HomographyPlane,
    HomographySettings, ImageId, ImageSize, Photo, PhotoId, RangeCalculation, RangeCalculationId,
    RigError, RigResult, Roi, Setup, SetupCamera, SetupCameraId, SetupId, SettingsId,
};
use beamrig_pipeline::session::StageStatus;
use beamrig_pipeline::{
    AcquisitionBackend, CalibrationBackend, DurationModel, InMemoryRig, RigConfig, RigEngine,
    RigSnapshot, SetupCameraRecord, StageKind,
};

const RUN: BeamRunId = BeamRunId(10);
const TEST_RUN: BeamRunId = BeamRunId(11);

/// Backend double that answers every call successfully.
#[derive(Default)]
struct Rig {
    counter: Cell<u64>,
}

impl Rig {
    fn next(&self) -> u64 {
        self.counter.set(self.counter.get() + 1);
        self.counter.get()
    }
}

impl CalibrationBackend for Rig {
    fn capture_calibration_image(
        &self,
        _setup_camera: SetupCameraId,
        _stage: StageKind,
    ) -> RigResult<CalibrationImage> {
        Ok(CalibrationImage {
            id: ImageId(self.next()),
            size: ImageSize::new(800, 600),
        })
    }

    fn solve_distortion(
        &self,
        _setup_camera: SetupCameraId,
        _settings: &DistortionSettings,
        _images: &[CalibrationImage],
    ) -> RigResult<DistortionCalibration> {
        Ok(DistortionCalibration {
            camera_matrix: [[1000.0, 0.0, 400.0], [0.0, 1000.0, 300.0], [0.0, 0.0, 1.0]],
            coefficients: vec![0.02, -0.001, 0.0, 0.0, 0.0],
        })
    }

    fn solve_homography(
        &self,
        _setup_camera: SetupCameraId,
        plane: HomographyPlane,
        _settings: &HomographySettings,
        _image: &CalibrationImage,
    ) -> RigResult<HomographyOutcome> {
        Ok(HomographyOutcome {
            success: true,
            message: format!("{plane} plane fitted"),
        })
    }
}

impl AcquisitionBackend for Rig {
    fn save_settings(&self, _run: BeamRunId, settings: &CameraSettings) -> RigResult<CameraSettings> {
        Ok(settings.clone())
    }

    fn capture_photo(
        &self,
        run: BeamRunId,
        camera: CameraId,
        settings: &CameraSettings,
    ) -> RigResult<Photo> {
        Ok(Photo {
            id: PhotoId(self.next()),
            beam_run_id: run,
            camera_id: camera,
            settings_id: Some(settings.id),
            gain: settings.gain,
        })
    }

    fn discard_photo(&self, _photo: PhotoId) -> RigResult<()> {
        Ok(())
    }
}

/// Setup with distortion calibration, cameras top1 = 1, side1 = 2, side2 = 3.
fn snapshot() -> RigSnapshot {
    let mut snapshot = RigSnapshot::default();
    snapshot.setups.push(Setup {
        id: SetupId(1),
        name: "gantry 2".to_string(),
        do_distortion_calibration: true,
        parameters: BTreeMap::from([("block_depth_mm".to_string(), 120.0)]),
    });
    for (id, role) in [
        (1, CameraRole::Top),
        (2, CameraRole::Side),
        (3, CameraRole::Side),
    ] {
        snapshot.setup_cameras.push(SetupCameraRecord::new(SetupCamera {
            id: SetupCameraId(id),
            setup_id: SetupId(1),
            camera_id: CameraId(id),
            role: Some(role),
            image_size: ImageSize::new(800, 600),
        }));
    }
    snapshot.experiments.push(Experiment {
        id: ExperimentId(1),
        name: "bragg peak".to_string(),
        setup_id: SetupId(1),
        camera_ids: vec![CameraId(1), CameraId(2), CameraId(3)],
    });
    snapshot
        .beam_runs
        .push(BeamRun::new_real(RUN, ExperimentId(1), 1));
    snapshot
        .beam_runs
        .push(BeamRun::new_test(TEST_RUN, ExperimentId(1), 2));
    snapshot
}

fn engine() -> RigEngine<InMemoryRig> {
    RigEngine::new(InMemoryRig::new(snapshot()), RigConfig::default())
}

fn pattern() -> DistortionSettings {
    DistortionSettings {
        grid_columns: Some(9),
        grid_rows: Some(6),
        pattern_spacing: Some(2.5),
        gain: Some(1.0),
    }
}

fn plane_settings() -> HomographySettings {
    HomographySettings {
        grid_columns: Some(9),
        grid_rows: Some(6),
        pattern_spacing: Some(2.5),
        gain: Some(1.0),
        offset: Some(15.0),
    }
}

fn real_settings(camera: u64) -> CameraSettings {
    CameraSettings {
        gain: Some(5.0),
        frame_rate: Some(10.0),
        number_of_images: Some(2),
        take_raw_images: Some(false),
        ..CameraSettings::new(SettingsId(camera), CameraId(camera))
    }
}

fn analysis(id: u64, camera: u64, complete: bool) -> CameraAnalysis {
    CameraAnalysis {
        id: AnalysisId(id),
        beam_run_id: RUN,
        camera_id: CameraId(camera),
        colour_channel: ColourChannel::Red,
        average_image: true,
        beam_angle: Some(2.0),
        beam_angle_uncertainty: complete.then_some(0.2),
        bragg_peak_pixel: [Some(410.0), Some(220.0)],
        bragg_peak_pixel_uncertainty: [Some(3.0), Some(3.0)],
        plots: Vec::new(),
    }
}

fn status(engine: &RigEngine<InMemoryRig>, stage: StageKind) -> (StageStatus, bool) {
    let actions = engine.calibration_actions(SetupCameraId(1)).unwrap();
    let action = actions.into_iter().find(|a| a.stage == stage).unwrap();
    (action.status, action.available)
}

fn calibrate_distortion(engine: &mut RigEngine<InMemoryRig>, rig: &Rig) {
    let sc = SetupCameraId(1);
    engine.create_distortion_settings(sc, pattern()).unwrap();
    for _ in 0..5 {
        engine
            .capture_calibration_image(sc, StageKind::Distortion, rig)
            .unwrap();
    }
    engine.calibrate_distortion(sc, rig).unwrap();
}

#[test]
fn homography_unlocks_when_distortion_saved() {
    let mut engine = engine();
    let rig = Rig::default();
    let near = StageKind::Homography(HomographyPlane::Near);

    assert!(!status(&engine, near).1);
    assert!(matches!(
        engine.create_homography_settings(SetupCameraId(1), HomographyPlane::Near, plane_settings()),
        Err(RigError::PreconditionNotMet(_))
    ));

    engine
        .create_distortion_settings(SetupCameraId(1), pattern())
        .unwrap();
    for _ in 0..4 {
        engine
            .capture_calibration_image(SetupCameraId(1), StageKind::Distortion, &rig)
            .unwrap();
    }
    assert!(engine.calibrate_distortion(SetupCameraId(1), &rig).is_err());
    assert!(!status(&engine, near).1);

    engine
        .capture_calibration_image(SetupCameraId(1), StageKind::Distortion, &rig)
        .unwrap();
    engine.calibrate_distortion(SetupCameraId(1), &rig).unwrap();
    assert_eq!(status(&engine, StageKind::Distortion).0, StageStatus::Finalized);
    assert!(status(&engine, near).1);
}

#[test]
fn distortion_reset_clears_dependent_stages() {
    let mut engine = engine();
    let rig = Rig::default();
    let sc = SetupCameraId(1);
    calibrate_distortion(&mut engine, &rig);

    engine
        .create_homography_settings(sc, HomographyPlane::Near, plane_settings())
        .unwrap();
    engine
        .capture_calibration_image(sc, StageKind::Homography(HomographyPlane::Near), &rig)
        .unwrap();
    engine
        .calibrate_homography(sc, HomographyPlane::Near, &rig)
        .unwrap();
    engine
        .capture_calibration_image(sc, StageKind::ScintillatorEdges, &rig)
        .unwrap();
    engine
        .select_roi(sc, Roi::new(100.0, 700.0, 50.0, 500.0))
        .unwrap();

    let cleared = engine.reset_stage(sc, StageKind::Distortion).unwrap();
    assert_eq!(cleared.len(), 4);

    let calibration = engine.repo().snapshot().setup_cameras[0].calibration.clone();
    for stage in StageKind::ALL {
        assert!(calibration.is_initial(stage), "{stage} not cleared");
    }
    assert!(!status(&engine, StageKind::ScintillatorEdges).1);
}

#[test]
fn scintillator_roi_is_stored_flipped() {
    let mut engine = engine();
    let rig = Rig::default();
    let sc = SetupCameraId(1);
    calibrate_distortion(&mut engine, &rig);
    engine
        .capture_calibration_image(sc, StageKind::ScintillatorEdges, &rig)
        .unwrap();

    assert!(matches!(
        engine.select_roi(sc, Roi::new(100.0, 900.0, 50.0, 500.0)),
        Err(RigError::InvalidRoi(_))
    ));
    let stored = engine
        .select_roi(sc, Roi::new(100.0, 700.0, 50.0, 500.0))
        .unwrap();
    assert_eq!(stored, Roi::new(100.0, 700.0, 550.0, 100.0));
}

#[test]
fn last_camera_settings_flip_readiness() {
    let mut engine = engine();
    let rig = Rig::default();
    for camera in [1, 2] {
        let completeness = engine
            .save_real_settings(RUN, real_settings(camera), &rig)
            .unwrap();
        assert!(!completeness.can_take_data());
    }
    assert!(engine.take_data(RUN, &rig).is_err());

    let completeness = engine
        .save_real_settings(RUN, real_settings(3), &rig)
        .unwrap();
    assert!(completeness.unset_camera_ids.is_empty());
    assert!(completeness.can_take_data());

    assert_eq!(engine.take_data(RUN, &rig).unwrap(), 6);
    assert!(engine.repo().snapshot().beam_runs[0].data_taken);
}

#[test]
fn test_run_sweep_waits_for_other_cameras() {
    let mut engine = engine();
    let sweep = |id: u64, camera: u64| GainSweep {
        frame_rate: Some(15.0),
        lowest_gain: Some(10.0),
        highest_gain: Some(30.0),
        gain_increment: Some(10.0),
        ..GainSweep::new(SettingsId(id), CameraId(camera))
    };

    let completeness = engine.add_gain_sweep(TEST_RUN, sweep(1, 1)).unwrap();
    assert_eq!(completeness.unset_camera_ids, vec![CameraId(2), CameraId(3)]);
    engine.add_gain_sweep(TEST_RUN, sweep(2, 2)).unwrap();
    let completeness = engine.add_gain_sweep(TEST_RUN, sweep(3, 3)).unwrap();
    assert!(completeness.can_take_data());

    // Three gain points per camera.
    let estimate = engine.estimate_duration(TEST_RUN).unwrap();
    let model = DurationModel::default();
    assert!((estimate.total_s - model.estimate(&[15.0; 9])).abs() < 1e-9);

    let rig = Rig::default();
    assert_eq!(engine.take_data(TEST_RUN, &rig).unwrap(), 9);
}

#[test]
fn bragg_peak_gating_follows_analyses() {
    let mut engine = engine();
    let rig = Rig::default();
    for camera in [1, 2, 3] {
        engine
            .save_real_settings(RUN, real_settings(camera), &rig)
            .unwrap();
    }
    engine.take_data(RUN, &rig).unwrap();

    engine.create_analysis(analysis(1, 1, true)).unwrap();
    engine.create_analysis(analysis(2, 2, false)).unwrap();
    let overview = engine.create_analysis(analysis(3, 3, true)).unwrap();
    assert!(overview.can_compute_global_bragg_peak());

    let overview = engine.delete_analysis(RUN, AnalysisId(3)).unwrap();
    assert!(!overview.can_compute_global_bragg_peak());

    let record = BraggPeakDepth {
        id: BraggPeakDepthId(1),
        beam_run_id: RUN,
        depth: Some(151.0),
        depth_uncertainty: Some(0.8),
    };
    assert!(engine.create_bragg_peak_depth(record.clone()).is_err());
    engine.create_analysis(analysis(4, 3, true)).unwrap();
    engine.create_bragg_peak_depth(record).unwrap();
}

#[test]
fn range_waits_for_vector_flag() {
    let mut engine = engine();
    let rig = Rig::default();
    for camera in [1, 2, 3] {
        engine
            .save_real_settings(RUN, real_settings(camera), &rig)
            .unwrap();
    }
    engine.take_data(RUN, &rig).unwrap();
    let range = RangeCalculation {
        id: RangeCalculationId(1),
        beam_run_id: RUN,
        camera_id: CameraId(1),
        plots: Vec::new(),
    };
    assert!(!engine.can_compute_range(RUN).unwrap());
    assert!(engine.create_range_calculation(range.clone()).is_err());

    let mut repo = engine.into_repo();
    repo.set_vector_complete(RUN, true);
    let mut engine = RigEngine::new(repo, RigConfig::default());
    assert!(engine.can_compute_range(RUN).unwrap());
    engine.create_range_calculation(range).unwrap();
}

#[test]
fn duration_for_two_photos() {
    let estimate = DurationModel::default().estimate(&[10.0, 20.0]);
    assert!((estimate - 3.69).abs() < 1e-9);
}
