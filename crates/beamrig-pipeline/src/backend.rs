//! Remote operations the engine delegates to the rig backend.
//!
//! Implementations perform the actual capture and computer-vision work and
//! report failures as [`RigError::RemoteOperation`](beamrig_core::RigError).
//! The engine only moves entity state once a call has succeeded.

use beamrig_core::{
    BeamRunId, CalibrationImage, CameraId, CameraSettings, DistortionCalibration,
    DistortionSettings, HomographyOutcome, HomographyPlane, HomographySettings, Photo, PhotoId,
    RigResult, SetupCameraId,
};

use crate::calibration::StageKind;

/// Calibration captures and solvers.
pub trait CalibrationBackend {
    /// Take one frame for `stage` with that stage's current settings.
    fn capture_calibration_image(
        &self,
        setup_camera: SetupCameraId,
        stage: StageKind,
    ) -> RigResult<CalibrationImage>;

    fn solve_distortion(
        &self,
        setup_camera: SetupCameraId,
        settings: &DistortionSettings,
        images: &[CalibrationImage],
    ) -> RigResult<DistortionCalibration>;

    /// A solver that runs but cannot fit the pattern returns
    /// `Ok(HomographyOutcome { success: false, .. })`.
    fn solve_homography(
        &self,
        setup_camera: SetupCameraId,
        plane: HomographyPlane,
        settings: &HomographySettings,
        image: &CalibrationImage,
    ) -> RigResult<HomographyOutcome>;
}

/// Settings persistence and photo capture for beam runs.
pub trait AcquisitionBackend {
    /// Persist a settings record; returns the authoritative copy.
    fn save_settings(&self, run: BeamRunId, settings: &CameraSettings) -> RigResult<CameraSettings>;

    /// Capture one photo with `settings`.
    fn capture_photo(
        &self,
        run: BeamRunId,
        camera: CameraId,
        settings: &CameraSettings,
    ) -> RigResult<Photo>;

    /// Remove a photo captured by an attempt that did not complete.
    fn discard_photo(&self, photo: PhotoId) -> RigResult<()>;
}
