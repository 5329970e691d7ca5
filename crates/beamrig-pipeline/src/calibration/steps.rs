//! Step functions driving calibration stages through the backend.
//!
//! Each step checks every local precondition before the remote call, so a
//! refused step never reaches the backend, and only touches the tracker once
//! the backend has answered successfully.

use beamrig_core::{HomographyPlane, ImageSize, RigError, RigResult, Setup};
use log::warn;

use super::tracker::{SetupCameraCalibration, StageKind};
use crate::backend::CalibrationBackend;
use crate::config::CalibrationConfig;

/// Capture a frame for `stage` and record it. Returns the image count held
/// by the stage afterwards.
///
/// The frame must have the camera's `image_size`; ROI validation relies on it.
pub fn step_capture_image<B: CalibrationBackend + ?Sized>(
    calib: &mut SetupCameraCalibration,
    setup: &Setup,
    image_size: ImageSize,
    stage: StageKind,
    backend: &B,
) -> RigResult<usize> {
    calib.ensure_available(stage, setup)?;
    let missing_settings = match stage {
        StageKind::Distortion => calib.distortion.settings().is_none(),
        StageKind::Homography(plane) => calib.homography(plane).settings().is_none(),
        StageKind::ScintillatorEdges => false,
    };
    if missing_settings {
        return Err(RigError::precondition(format!(
            "{stage} needs settings before capturing"
        )));
    }
    if stage == StageKind::Distortion && calib.distortion.is_finalized() {
        return Err(RigError::precondition(
            "distortion is saved; reset before capturing more images",
        ));
    }

    let image = match backend.capture_calibration_image(calib.setup_camera_id, stage) {
        Ok(image) => image,
        Err(err) => {
            warn!(
                "setup camera {}: {stage} capture failed: {err}",
                calib.setup_camera_id
            );
            log_capture_failure(calib, stage, &err);
            return Err(err);
        }
    };
    if image.size != image_size {
        let err = RigError::validation(format!(
            "{stage} image {} is {}x{}, camera frame is {}x{}",
            image.id, image.size.width, image.size.height, image_size.width, image_size.height
        ));
        warn!("setup camera {}: {err}", calib.setup_camera_id);
        log_capture_failure(calib, stage, &err);
        return Err(err);
    }

    match stage {
        StageKind::Distortion => calib.record_distortion_image(image),
        StageKind::Homography(plane) => calib.record_homography_image(setup, plane, image),
        StageKind::ScintillatorEdges => calib.record_edge_image(setup, image),
    }
}

fn log_capture_failure(calib: &mut SetupCameraCalibration, stage: StageKind, err: &RigError) {
    let message = err.to_string();
    match stage {
        StageKind::Distortion => calib.distortion.log_failure("capture_image", message),
        StageKind::Homography(plane) => calib
            .homography_mut(plane)
            .log_failure("capture_image", message),
        StageKind::ScintillatorEdges => calib
            .scintillator_edges
            .log_failure("capture_image", message),
    }
}

/// Solve and save the distortion calibration from the recorded images.
pub fn step_calibrate_distortion<B: CalibrationBackend + ?Sized>(
    calib: &mut SetupCameraCalibration,
    config: &CalibrationConfig,
    backend: &B,
) -> RigResult<()> {
    let settings = calib
        .distortion
        .settings()
        .cloned()
        .ok_or_else(|| RigError::precondition("distortion settings not created"))?;
    if calib.distortion.is_finalized() {
        return Err(RigError::precondition("distortion is already saved"));
    }
    let have = calib.distortion.images().len();
    if have < config.min_distortion_images {
        return Err(RigError::precondition(format!(
            "distortion needs at least {} images (got {have})",
            config.min_distortion_images
        )));
    }

    match backend.solve_distortion(calib.setup_camera_id, &settings, calib.distortion.images()) {
        Ok(result) => calib.finalize_distortion(result, config),
        Err(err) => {
            warn!(
                "setup camera {}: distortion solve failed: {err}",
                calib.setup_camera_id
            );
            calib.distortion.log_failure("solve_distortion", err.to_string());
            Err(err)
        }
    }
}

/// Solve the homography for `plane` from its latest image and store the
/// outcome, successful or not.
pub fn step_calibrate_homography<B: CalibrationBackend + ?Sized>(
    calib: &mut SetupCameraCalibration,
    setup: &Setup,
    plane: HomographyPlane,
    config: &CalibrationConfig,
    backend: &B,
) -> RigResult<()> {
    calib.ensure_available(StageKind::Homography(plane), setup)?;
    let session = calib.homography(plane);
    let settings = session
        .settings()
        .cloned()
        .ok_or_else(|| RigError::precondition(format!("{plane} homography settings not created")))?;
    if session.is_finalized() {
        return Err(RigError::precondition(format!(
            "{plane} homography is already calibrated; retake the image to recalibrate"
        )));
    }
    let image = *session
        .latest_image()
        .ok_or_else(|| RigError::precondition(format!("{plane} homography image not captured")))?;

    match backend.solve_homography(calib.setup_camera_id, plane, &settings, &image) {
        Ok(outcome) => calib.finalize_homography(setup, plane, outcome, config),
        Err(err) => {
            warn!(
                "setup camera {}: {plane} homography solve failed: {err}",
                calib.setup_camera_id
            );
            calib
                .homography_mut(plane)
                .log_failure("solve_homography", err.to_string());
            Err(err)
        }
    }
}
