//! Stateful front over the repositories.
//!
//! [`RigEngine`] loads entities from its repository, applies the pure gating
//! rules of the calibration, acquisition and analysis modules, and writes the
//! result back only when the operation succeeded. Long-running remote work
//! goes through explicit pending/settled state instead of blocking.

use std::collections::BTreeMap;

use beamrig_core::{
    AnalysisId, BeamRun, BeamRunId, BraggPeakDepth, BraggPeakDepthId, CameraAnalysis, CameraId,
    CameraRole, CameraSettings, DistortionSettings, Experiment, GainSweep, HomographyPlane,
    HomographySettings, Photo, PhotoId, RangeCalculation, RigError, RigResult, Roi, Setup,
    SettingsId, SetupCameraId,
};
use log::{debug, info, warn};

use crate::acquisition::{self, RunDuration, SettingsCompletedness};
use crate::analysis::{self, AnalysisOverview};
use crate::backend::{AcquisitionBackend, CalibrationBackend};
use crate::calibration::{
    step_calibrate_distortion, step_calibrate_homography, step_capture_image,
    SetupCameraCalibration, StageAvailability, StageKind,
};
use crate::config::RigConfig;
use crate::repository::RigRepository;
use crate::sync::{
    ConnectionStatus, OptimisticStore, PendingId, PollSlot, RequestLifecycle, TrackedRequest,
};

type RunCamera = (BeamRunId, CameraId);

pub struct RigEngine<R> {
    repo: R,
    config: RigConfig,
    settings_overlay: OptimisticStore<RunCamera, CameraSettings>,
    analysis_requests: BTreeMap<RunCamera, TrackedRequest<CameraAnalysis>>,
    connections: BTreeMap<CameraId, PollSlot<ConnectionStatus>>,
}

impl<R: RigRepository> RigEngine<R> {
    pub fn new(repo: R, config: RigConfig) -> Self {
        Self {
            repo,
            config,
            settings_overlay: OptimisticStore::new(),
            analysis_requests: BTreeMap::new(),
            connections: BTreeMap::new(),
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn into_repo(self) -> R {
        self.repo
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calibration
    // ─────────────────────────────────────────────────────────────────────────

    fn load_calibration(&self, id: SetupCameraId) -> RigResult<(Setup, SetupCameraCalibration)> {
        let binding = self.repo.setup_camera(id)?;
        let setup = self.repo.setup(binding.setup_id)?;
        let calibration = self.repo.calibration(id)?;
        Ok((setup, calibration))
    }

    /// Run `op` on a copy of the calibration and store it afterwards.
    ///
    /// Stage operations are atomic, so the copy is stored on failure too; the
    /// only change a failed operation leaves behind is its audit entry.
    fn with_calibration<T>(
        &mut self,
        id: SetupCameraId,
        op: impl FnOnce(&mut SetupCameraCalibration, &Setup, &RigConfig) -> RigResult<T>,
    ) -> RigResult<T> {
        let (setup, mut calibration) = self.load_calibration(id)?;
        let result = op(&mut calibration, &setup, &self.config);
        self.repo.store_calibration(calibration)?;
        result
    }

    pub fn calibration_actions(&self, id: SetupCameraId) -> RigResult<Vec<StageAvailability>> {
        let (setup, calibration) = self.load_calibration(id)?;
        Ok(calibration.available_actions(&setup))
    }

    pub fn create_distortion_settings(
        &mut self,
        id: SetupCameraId,
        settings: DistortionSettings,
    ) -> RigResult<()> {
        self.with_calibration(id, |calib, _, _| calib.create_distortion_settings(settings))
    }

    pub fn update_distortion_settings(
        &mut self,
        id: SetupCameraId,
        settings: DistortionSettings,
    ) -> RigResult<()> {
        self.with_calibration(id, |calib, _, _| calib.update_distortion_settings(settings))
    }

    pub fn create_homography_settings(
        &mut self,
        id: SetupCameraId,
        plane: HomographyPlane,
        settings: HomographySettings,
    ) -> RigResult<()> {
        self.with_calibration(id, |calib, setup, _| {
            calib.create_homography_settings(setup, plane, settings)
        })
    }

    pub fn update_homography_settings(
        &mut self,
        id: SetupCameraId,
        plane: HomographyPlane,
        settings: HomographySettings,
    ) -> RigResult<()> {
        self.with_calibration(id, |calib, setup, _| {
            calib.update_homography_settings(setup, plane, settings)
        })
    }

    pub fn capture_calibration_image<B: CalibrationBackend + ?Sized>(
        &mut self,
        id: SetupCameraId,
        stage: StageKind,
        backend: &B,
    ) -> RigResult<usize> {
        let image_size = self.repo.setup_camera(id)?.image_size;
        self.with_calibration(id, |calib, setup, _| {
            step_capture_image(calib, setup, image_size, stage, backend)
        })
    }

    pub fn calibrate_distortion<B: CalibrationBackend + ?Sized>(
        &mut self,
        id: SetupCameraId,
        backend: &B,
    ) -> RigResult<()> {
        self.with_calibration(id, |calib, _, config| {
            step_calibrate_distortion(calib, &config.calibration, backend)
        })
    }

    pub fn calibrate_homography<B: CalibrationBackend + ?Sized>(
        &mut self,
        id: SetupCameraId,
        plane: HomographyPlane,
        backend: &B,
    ) -> RigResult<()> {
        self.with_calibration(id, |calib, setup, config| {
            step_calibrate_homography(calib, setup, plane, &config.calibration, backend)
        })
    }

    /// Save a scintillator ROI selected in display coordinates; returns the
    /// stored rectangle.
    pub fn select_roi(&mut self, id: SetupCameraId, display: Roi) -> RigResult<Roi> {
        self.with_calibration(id, |calib, setup, config| {
            calib.select_roi(setup, &display, &config.calibration)
        })
    }

    pub fn reset_stage(&mut self, id: SetupCameraId, stage: StageKind) -> RigResult<Vec<StageKind>> {
        self.with_calibration(id, |calib, _, _| Ok(calib.reset(stage)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Acquisition
    // ─────────────────────────────────────────────────────────────────────────

    fn load_run(&self, id: BeamRunId) -> RigResult<(BeamRun, Experiment)> {
        let run = self.repo.beam_run(id)?;
        let experiment = self.repo.experiment(run.experiment_id)?;
        Ok((run, experiment))
    }

    pub fn settings_completedness(&self, run: BeamRunId) -> RigResult<SettingsCompletedness> {
        let (run, experiment) = self.load_run(run)?;
        Ok(acquisition::settings_completedness(&run, &experiment))
    }

    /// Settings shown for a camera: a pending save if one is in flight,
    /// else the stored record.
    pub fn view_settings(
        &self,
        run: BeamRunId,
        camera: CameraId,
    ) -> RigResult<Option<CameraSettings>> {
        let key = (run, camera);
        if self.settings_overlay.is_pending(&key) {
            return Ok(self.settings_overlay.view(&key).cloned());
        }
        self.repo.settings_for_camera(run, camera)
    }

    /// Validate `settings` and show them tentatively until the backend answers.
    pub fn begin_settings_save(
        &mut self,
        run: BeamRunId,
        settings: CameraSettings,
    ) -> RigResult<PendingId> {
        let (mut draft, experiment) = self.load_run(run)?;
        acquisition::upsert_real_settings(&mut draft, &experiment, settings.clone())?;
        Ok(self
            .settings_overlay
            .apply((run, settings.camera_id), settings))
    }

    /// Store the backend's copy of a pending save and return the new
    /// completeness of the run.
    pub fn confirm_settings_save(
        &mut self,
        pending: PendingId,
        server: CameraSettings,
    ) -> RigResult<SettingsCompletedness> {
        let (run_id, camera) = *self
            .settings_overlay
            .pending_key(pending)
            .ok_or_else(|| RigError::precondition(format!("unknown settings save {pending:?}")))?;
        match self.store_server_settings(run_id, camera, server.clone()) {
            Ok(completeness) => {
                self.settings_overlay.confirm(pending, server)?;
                Ok(completeness)
            }
            Err(err) => {
                warn!("run {run_id}: server settings for camera {camera} rejected: {err}");
                self.settings_overlay.rollback(pending)?;
                Err(err)
            }
        }
    }

    fn store_server_settings(
        &mut self,
        run: BeamRunId,
        camera: CameraId,
        server: CameraSettings,
    ) -> RigResult<SettingsCompletedness> {
        if server.camera_id != camera {
            return Err(RigError::validation(format!(
                "server returned settings for camera {}, expected {camera}",
                server.camera_id
            )));
        }
        let (mut run, experiment) = self.load_run(run)?;
        let completeness = acquisition::upsert_real_settings(&mut run, &experiment, server)?;
        self.repo.store_beam_run(run)?;
        Ok(completeness)
    }

    pub fn rollback_settings_save(&mut self, pending: PendingId) -> RigResult<()> {
        self.settings_overlay.rollback(pending)
    }

    /// Save real-run settings through `backend`, rolling back on failure.
    pub fn save_real_settings<B: AcquisitionBackend + ?Sized>(
        &mut self,
        run: BeamRunId,
        settings: CameraSettings,
        backend: &B,
    ) -> RigResult<SettingsCompletedness> {
        let pending = self.begin_settings_save(run, settings.clone())?;
        match backend.save_settings(run, &settings) {
            Ok(server) => self.confirm_settings_save(pending, server),
            Err(err) => {
                warn!("run {run}: settings save for camera {} failed: {err}", settings.camera_id);
                self.rollback_settings_save(pending)?;
                Err(err)
            }
        }
    }

    pub fn add_gain_sweep(
        &mut self,
        run: BeamRunId,
        sweep: GainSweep,
    ) -> RigResult<SettingsCompletedness> {
        let (mut run, experiment) = self.load_run(run)?;
        let completeness = acquisition::add_gain_sweep(&mut run, &experiment, sweep)?;
        self.repo.store_beam_run(run)?;
        Ok(completeness)
    }

    pub fn remove_gain_sweep(
        &mut self,
        run: BeamRunId,
        sweep: SettingsId,
    ) -> RigResult<SettingsCompletedness> {
        let (mut run, experiment) = self.load_run(run)?;
        let completeness = acquisition::remove_gain_sweep(&mut run, &experiment, sweep)?;
        self.repo.store_beam_run(run)?;
        Ok(completeness)
    }

    /// Capture the run's photos. Returns the number of photos stored.
    pub fn take_data<B: AcquisitionBackend + ?Sized>(
        &mut self,
        run: BeamRunId,
        backend: &B,
    ) -> RigResult<usize> {
        let (mut run, experiment) = self.load_run(run)?;
        let photos = acquisition::take_data(&mut run, &experiment, backend)?;
        let count = photos.len();
        self.repo.store_beam_run(run)?;
        self.repo.add_photos(photos);
        Ok(count)
    }

    pub fn delete_photo(&mut self, id: PhotoId) -> RigResult<Photo> {
        self.repo.delete_photo(id)
    }

    pub fn estimate_duration(&self, run: BeamRunId) -> RigResult<RunDuration> {
        let (run, experiment) = self.load_run(run)?;
        self.config.duration.estimate_run(&run, &experiment)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Analysis
    // ─────────────────────────────────────────────────────────────────────────

    fn roles(&self, experiment: &Experiment) -> BTreeMap<CameraId, CameraRole> {
        analysis::camera_roles(
            experiment.setup_id,
            &self.repo.setup_cameras(experiment.setup_id),
        )
    }

    pub fn analysis_overview(&self, run: BeamRunId) -> RigResult<AnalysisOverview> {
        let (run, experiment) = self.load_run(run)?;
        let analyses = self.repo.analyses(run.id);
        Ok(AnalysisOverview::evaluate(
            &run,
            &analyses,
            &self.roles(&experiment),
        ))
    }

    pub fn can_run_single_camera_analysis(
        &self,
        run: BeamRunId,
        camera: CameraId,
    ) -> RigResult<bool> {
        let run = self.repo.beam_run(run)?;
        Ok(run.is_real()
            && analysis::can_run_single_camera_analysis(&run, camera, &self.repo.photos(run.id)))
    }

    pub fn can_compute_range(&self, run: BeamRunId) -> RigResult<bool> {
        let run = self.repo.beam_run(run)?;
        Ok(run.is_real()
            && run.data_taken
            && analysis::can_compute_range(self.repo.vector_complete(run.id)))
    }

    /// Start a single-camera analysis; returns the request epoch the
    /// backend's answer must carry.
    pub fn request_analysis(&mut self, run: BeamRunId, camera: CameraId) -> RigResult<u64> {
        if !self.can_run_single_camera_analysis(run, camera)? {
            return Err(RigError::precondition(format!(
                "camera {camera} has no photos for run {run} or data is not taken"
            )));
        }
        let epoch = self
            .analysis_requests
            .entry((run, camera))
            .or_default()
            .begin();
        debug!("run {run}: analysis of camera {camera} requested (epoch {epoch})");
        Ok(epoch)
    }

    /// Apply the backend's answer to an analysis request. Returns `false`
    /// when the answer is stale and was discarded.
    ///
    /// A successful answer replaces any earlier analysis of the camera. If
    /// it cannot be stored the request ends `Failed` and the error is
    /// returned; the stored analyses are left as they were.
    pub fn settle_analysis(
        &mut self,
        run: BeamRunId,
        camera: CameraId,
        epoch: u64,
        result: Result<CameraAnalysis, String>,
    ) -> RigResult<bool> {
        let key = (run, camera);
        let request = self.analysis_requests.get(&key).ok_or_else(|| {
            RigError::precondition(format!("no analysis requested for camera {camera}"))
        })?;
        if !request.accepts(epoch) {
            warn!("run {run}: discarding stale analysis of camera {camera} (epoch {epoch})");
            return Ok(false);
        }

        let mut store_error = None;
        let outcome = match result {
            Ok(analysis) => match self.replace_analysis(run, camera, analysis.clone()) {
                Ok(()) => Ok(analysis),
                Err(err) => {
                    let message = err.to_string();
                    store_error = Some(err);
                    Err(message)
                }
            },
            Err(message) => Err(message),
        };
        if let Some(request) = self.analysis_requests.get_mut(&key) {
            request.settle(epoch, outcome);
        }
        match store_error {
            Some(err) => Err(err),
            None => Ok(true),
        }
    }

    fn replace_analysis(
        &mut self,
        run: BeamRunId,
        camera: CameraId,
        analysis: CameraAnalysis,
    ) -> RigResult<()> {
        if analysis.beam_run_id != run || analysis.camera_id != camera {
            return Err(RigError::validation(format!(
                "analysis answer is for run {} camera {}, requested run {run} camera {camera}",
                analysis.beam_run_id, analysis.camera_id
            )));
        }
        let beam_run = self.repo.beam_run(run)?;
        let photos = self.repo.photos(run);
        let mut analyses = self.repo.analyses(run);
        analyses.retain(|a| a.camera_id != camera);
        analysis::create_analysis(&beam_run, &photos, &mut analyses, analysis)?;
        self.repo.store_analyses(run, analyses);
        info!("run {run}: analysis of camera {camera} stored");
        Ok(())
    }

    pub fn analysis_request(
        &self,
        run: BeamRunId,
        camera: CameraId,
    ) -> Option<&RequestLifecycle<CameraAnalysis>> {
        self.analysis_requests
            .get(&(run, camera))
            .map(TrackedRequest::state)
    }

    /// Store an analysis computed elsewhere.
    pub fn create_analysis(&mut self, analysis: CameraAnalysis) -> RigResult<AnalysisOverview> {
        let run = analysis.beam_run_id;
        let beam_run = self.repo.beam_run(run)?;
        let mut analyses = self.repo.analyses(run);
        analysis::create_analysis(&beam_run, &self.repo.photos(run), &mut analyses, analysis)?;
        self.repo.store_analyses(run, analyses);
        self.analysis_overview(run)
    }

    /// Delete an analysis and return the re-evaluated overview.
    pub fn delete_analysis(
        &mut self,
        run: BeamRunId,
        id: AnalysisId,
    ) -> RigResult<AnalysisOverview> {
        let beam_run = self.repo.beam_run(run)?;
        let mut analyses = self.repo.analyses(run);
        analysis::delete_analysis(&beam_run, &mut analyses, id)?;
        self.repo.store_analyses(run, analyses);
        self.analysis_overview(run)
    }

    pub fn create_range_calculation(&mut self, range: RangeCalculation) -> RigResult<()> {
        let run = range.beam_run_id;
        let beam_run = self.repo.beam_run(run)?;
        let mut ranges = self.repo.range_calculations(run);
        analysis::create_range_calculation(
            &beam_run,
            self.repo.vector_complete(run),
            &mut ranges,
            range,
        )?;
        self.repo.store_range_calculations(run, ranges);
        Ok(())
    }

    pub fn create_bragg_peak_depth(&mut self, record: BraggPeakDepth) -> RigResult<()> {
        let run = record.beam_run_id;
        let overview = self.analysis_overview(run)?;
        let beam_run = self.repo.beam_run(run)?;
        let mut records = self.repo.bragg_peak_depths(run);
        analysis::create_bragg_peak_depth(&beam_run, &overview, &mut records, record)?;
        self.repo.store_bragg_peak_depths(run, records);
        Ok(())
    }

    pub fn delete_bragg_peak_depth(
        &mut self,
        run: BeamRunId,
        id: BraggPeakDepthId,
    ) -> RigResult<BraggPeakDepth> {
        let beam_run = self.repo.beam_run(run)?;
        let mut records = self.repo.bragg_peak_depths(run);
        let removed = analysis::delete_bragg_peak_depth(&beam_run, &mut records, id)?;
        self.repo.store_bragg_peak_depths(run, records);
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connectivity
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a polled connection status; the latest received one wins.
    pub fn receive_connection_status(&mut self, camera: CameraId, status: ConnectionStatus) {
        self.connections.entry(camera).or_default().receive(status);
    }

    pub fn connection_status(&self, camera: CameraId) -> Option<ConnectionStatus> {
        self.connections
            .get(&camera)
            .and_then(|slot| slot.latest().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamrig_core::{
        CalibrationImage, ColourChannel, DistortionCalibration, HomographyOutcome, ImageId,
        ImageSize, SetupCamera, SetupId,
    };
    use std::cell::Cell;

    use crate::repository::{AnalysisRepository, InMemoryRig, SettingsRepository};
    use crate::snapshot::{RigSnapshot, SetupCameraRecord};

    struct Bench {
        fail_saves: bool,
        zero_frame_rate_on_save: bool,
        images: Cell<u64>,
        photos: Cell<u64>,
    }

    impl Bench {
        fn new() -> Self {
            Self {
                fail_saves: false,
                zero_frame_rate_on_save: false,
                images: Cell::new(0),
                photos: Cell::new(0),
            }
        }
    }

    impl CalibrationBackend for Bench {
        fn capture_calibration_image(
            &self,
            _setup_camera: SetupCameraId,
            _stage: StageKind,
        ) -> RigResult<CalibrationImage> {
            self.images.set(self.images.get() + 1);
            Ok(CalibrationImage {
                id: ImageId(self.images.get()),
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
                camera_matrix: [[900.0, 0.0, 400.0], [0.0, 900.0, 300.0], [0.0, 0.0, 1.0]],
                coefficients: vec![0.01, -0.002],
            })
        }

        fn solve_homography(
            &self,
            _setup_camera: SetupCameraId,
            _plane: HomographyPlane,
            _settings: &HomographySettings,
            _image: &CalibrationImage,
        ) -> RigResult<HomographyOutcome> {
            Ok(HomographyOutcome {
                success: true,
                message: "ok".to_string(),
            })
        }
    }

    impl AcquisitionBackend for Bench {
        fn save_settings(
            &self,
            _run: BeamRunId,
            settings: &CameraSettings,
        ) -> RigResult<CameraSettings> {
            if self.fail_saves {
                return Err(RigError::remote("settings endpoint unavailable"));
            }
            let frame_rate = if self.zero_frame_rate_on_save {
                Some(0.0)
            } else {
                settings.frame_rate
            };
            Ok(CameraSettings {
                is_optimal: Some(false),
                frame_rate,
                ..settings.clone()
            })
        }

        fn capture_photo(
            &self,
            run: BeamRunId,
            camera: CameraId,
            settings: &CameraSettings,
        ) -> RigResult<Photo> {
            self.photos.set(self.photos.get() + 1);
            Ok(Photo {
                id: PhotoId(self.photos.get()),
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

    fn engine() -> RigEngine<InMemoryRig> {
        let mut snapshot = RigSnapshot::default();
        snapshot.setups.push(Setup {
            id: SetupId(1),
            name: "treatment room".to_string(),
            do_distortion_calibration: false,
            parameters: Default::default(),
        });
        for (id, role) in [(1, CameraRole::Top), (2, CameraRole::Side)] {
            snapshot.setup_cameras.push(SetupCameraRecord::new(SetupCamera {
                id: SetupCameraId(id),
                setup_id: SetupId(1),
                camera_id: CameraId(id),
                role: Some(role),
                image_size: ImageSize::new(800, 600),
            }));
        }
        snapshot.experiments.push(Experiment {
            id: beamrig_core::ExperimentId(1),
            name: "range check".to_string(),
            setup_id: SetupId(1),
            camera_ids: vec![CameraId(1), CameraId(2)],
        });
        snapshot.beam_runs.push(BeamRun::new_real(
            BeamRunId(1),
            beamrig_core::ExperimentId(1),
            1,
        ));
        RigEngine::new(InMemoryRig::new(snapshot), RigConfig::default())
    }

    fn settings(camera: u64) -> CameraSettings {
        CameraSettings {
            gain: Some(3.0),
            frame_rate: Some(10.0),
            number_of_images: Some(1),
            take_raw_images: Some(true),
            ..CameraSettings::new(SettingsId(camera), CameraId(camera))
        }
    }

    fn complete_analysis(id: u64, camera: u64) -> CameraAnalysis {
        CameraAnalysis {
            id: AnalysisId(id),
            beam_run_id: BeamRunId(1),
            camera_id: CameraId(camera),
            colour_channel: ColourChannel::Green,
            average_image: false,
            beam_angle: Some(1.2),
            beam_angle_uncertainty: Some(0.1),
            bragg_peak_pixel: [Some(300.0), Some(200.0)],
            bragg_peak_pixel_uncertainty: [Some(1.0), Some(1.0)],
            plots: Vec::new(),
        }
    }

    #[test]
    fn edge_roi_selected_without_distortion_requirement() {
        let mut engine = engine();
        let bench = Bench::new();
        engine
            .capture_calibration_image(SetupCameraId(1), StageKind::ScintillatorEdges, &bench)
            .unwrap();
        let stored = engine
            .select_roi(
                SetupCameraId(1),
                Roi {
                    h_start: 100.0,
                    h_end: 700.0,
                    v_start: 50.0,
                    v_end: 500.0,
                },
            )
            .unwrap();
        assert_eq!(stored.v_start, 550.0);
        assert_eq!(stored.v_end, 100.0);
        let actions = engine.calibration_actions(SetupCameraId(1)).unwrap();
        assert!(actions.iter().all(|a| a.available));
    }

    #[test]
    fn failed_settings_save_rolls_back() {
        let mut engine = engine();
        let failing = Bench {
            fail_saves: true,
            ..Bench::new()
        };
        assert!(engine
            .save_real_settings(BeamRunId(1), settings(1), &failing)
            .is_err());
        assert_eq!(engine.view_settings(BeamRunId(1), CameraId(1)).unwrap(), None);

        let completeness = engine
            .save_real_settings(BeamRunId(1), settings(1), &Bench::new())
            .unwrap();
        assert_eq!(completeness.unset_camera_ids, vec![CameraId(2)]);
        let stored = engine.view_settings(BeamRunId(1), CameraId(1)).unwrap().unwrap();
        assert_eq!(stored.is_optimal, Some(false));
    }

    #[test]
    fn rejected_server_copy_rolls_back() {
        let mut engine = engine();
        let corrupting = Bench {
            zero_frame_rate_on_save: true,
            ..Bench::new()
        };
        let err = engine
            .save_real_settings(BeamRunId(1), settings(1), &corrupting)
            .unwrap_err();
        assert!(matches!(err, RigError::Validation(_)));
        assert_eq!(engine.view_settings(BeamRunId(1), CameraId(1)).unwrap(), None);
        assert!(engine
            .repo()
            .settings_for_camera(BeamRunId(1), CameraId(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn server_copy_for_other_camera_rolls_back() {
        let mut engine = engine();
        let pending = engine.begin_settings_save(BeamRunId(1), settings(1)).unwrap();
        assert!(matches!(
            engine.confirm_settings_save(pending, settings(2)),
            Err(RigError::Validation(_))
        ));
        assert_eq!(engine.view_settings(BeamRunId(1), CameraId(1)).unwrap(), None);
        assert_eq!(engine.view_settings(BeamRunId(1), CameraId(2)).unwrap(), None);
    }

    #[test]
    fn pending_save_is_visible_until_settled() {
        let mut engine = engine();
        let pending = engine.begin_settings_save(BeamRunId(1), settings(2)).unwrap();
        assert!(engine.view_settings(BeamRunId(1), CameraId(2)).unwrap().is_some());
        assert!(engine
            .repo()
            .settings_for_camera(BeamRunId(1), CameraId(2))
            .unwrap()
            .is_none());
        engine.rollback_settings_save(pending).unwrap();
        assert!(engine.view_settings(BeamRunId(1), CameraId(2)).unwrap().is_none());
    }

    #[test]
    fn stale_analysis_answer_is_dropped() {
        let mut engine = engine();
        let bench = Bench::new();
        for camera in [1, 2] {
            engine
                .save_real_settings(BeamRunId(1), settings(camera), &bench)
                .unwrap();
        }
        assert_eq!(engine.take_data(BeamRunId(1), &bench).unwrap(), 2);

        let old = engine.request_analysis(BeamRunId(1), CameraId(1)).unwrap();
        let new = engine.request_analysis(BeamRunId(1), CameraId(1)).unwrap();
        assert!(engine
            .settle_analysis(BeamRunId(1), CameraId(1), new, Ok(complete_analysis(2, 1)))
            .unwrap());
        assert!(!engine
            .settle_analysis(BeamRunId(1), CameraId(1), old, Ok(complete_analysis(1, 1)))
            .unwrap());
        let overview = engine.analysis_overview(BeamRunId(1)).unwrap();
        assert_eq!(overview.top_complete, vec![CameraId(1)]);
        assert_eq!(
            engine.analysis_request(BeamRunId(1), CameraId(1)),
            Some(&RequestLifecycle::Settled(complete_analysis(2, 1)))
        );
    }

    #[test]
    fn unstorable_analysis_answer_fails_request() {
        let mut engine = engine();
        let bench = Bench::new();
        for camera in [1, 2] {
            engine
                .save_real_settings(BeamRunId(1), settings(camera), &bench)
                .unwrap();
        }
        engine.take_data(BeamRunId(1), &bench).unwrap();
        engine.create_analysis(complete_analysis(1, 1)).unwrap();

        let epoch = engine.request_analysis(BeamRunId(1), CameraId(1)).unwrap();
        engine.delete_photo(PhotoId(1)).unwrap();
        let err = engine
            .settle_analysis(BeamRunId(1), CameraId(1), epoch, Ok(complete_analysis(2, 1)))
            .unwrap_err();
        assert!(matches!(err, RigError::PreconditionNotMet(_)));
        assert!(matches!(
            engine.analysis_request(BeamRunId(1), CameraId(1)),
            Some(RequestLifecycle::Failed(_))
        ));
        let kept = engine.repo().analyses(BeamRunId(1));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, AnalysisId(1));
    }

    #[test]
    fn analysis_answer_for_other_camera_is_rejected() {
        let mut engine = engine();
        let bench = Bench::new();
        for camera in [1, 2] {
            engine
                .save_real_settings(BeamRunId(1), settings(camera), &bench)
                .unwrap();
        }
        engine.take_data(BeamRunId(1), &bench).unwrap();

        let epoch = engine.request_analysis(BeamRunId(1), CameraId(1)).unwrap();
        let err = engine
            .settle_analysis(BeamRunId(1), CameraId(1), epoch, Ok(complete_analysis(5, 2)))
            .unwrap_err();
        assert!(matches!(err, RigError::Validation(_)));
        assert!(matches!(
            engine.analysis_request(BeamRunId(1), CameraId(1)),
            Some(RequestLifecycle::Failed(_))
        ));
        assert!(engine.repo().analyses(BeamRunId(1)).is_empty());
    }

    #[test]
    fn bragg_peak_relocks_after_side_analysis_deleted() {
        let mut engine = engine();
        let bench = Bench::new();
        for camera in [1, 2] {
            engine
                .save_real_settings(BeamRunId(1), settings(camera), &bench)
                .unwrap();
        }
        engine.take_data(BeamRunId(1), &bench).unwrap();
        engine.create_analysis(complete_analysis(1, 1)).unwrap();
        let overview = engine.create_analysis(complete_analysis(2, 2)).unwrap();
        assert!(overview.can_compute_global_bragg_peak());

        let overview = engine.delete_analysis(BeamRunId(1), AnalysisId(2)).unwrap();
        assert!(!overview.can_compute_global_bragg_peak());
        let record = BraggPeakDepth {
            id: BraggPeakDepthId(1),
            beam_run_id: BeamRunId(1),
            depth: None,
            depth_uncertainty: None,
        };
        assert!(matches!(
            engine.create_bragg_peak_depth(record),
            Err(RigError::PreconditionNotMet(_))
        ));
    }

    #[test]
    fn analysis_request_needs_photos() {
        let mut engine = engine();
        assert!(engine.request_analysis(BeamRunId(1), CameraId(1)).is_err());
        assert!(engine.analysis_request(BeamRunId(1), CameraId(1)).is_none());
    }

    #[test]
    fn connection_status_keeps_latest_received() {
        let mut engine = engine();
        assert_eq!(engine.connection_status(CameraId(1)), None);
        engine.receive_connection_status(CameraId(1), ConnectionStatus::PendingDisconnect);
        engine.receive_connection_status(CameraId(1), ConnectionStatus::Connected);
        assert_eq!(
            engine.connection_status(CameraId(1)),
            Some(ConnectionStatus::Connected)
        );
    }
}
