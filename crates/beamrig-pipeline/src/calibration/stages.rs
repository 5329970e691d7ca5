//! [`CalibrationStage`] implementations for the three calibration stages.

use beamrig_core::{
    CalibrationImage, DistortionCalibration, DistortionSettings, HomographyOutcome,
    HomographySettings, RigError, RigResult, Roi, RoiMapper,
};

use crate::config::CalibrationConfig;
use crate::session::{CalibrationStage, RecapturePolicy};

/// Lens distortion from a series of pattern images.
///
/// Images accumulate; once saved the stage only moves again through a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistortionStage;

impl CalibrationStage for DistortionStage {
    type Settings = DistortionSettings;
    type Image = CalibrationImage;
    type Output = DistortionCalibration;

    fn name() -> &'static str {
        "distortion"
    }

    fn min_images(config: &CalibrationConfig) -> usize {
        config.min_distortion_images
    }

    fn validate_settings(settings: &Self::Settings) -> RigResult<()> {
        settings.validate()
    }

    fn validate_output(_images: &[Self::Image], output: &Self::Output) -> RigResult<()> {
        let finite_matrix = output.camera_matrix.iter().flatten().all(|v| v.is_finite());
        if !finite_matrix || !output.coefficients.iter().all(|v| v.is_finite()) {
            return Err(RigError::validation(
                "distortion result contains non-finite values",
            ));
        }
        if output.coefficients.is_empty() {
            return Err(RigError::validation(
                "distortion result has no coefficients",
            ));
        }
        Ok(())
    }
}

/// Near/far plane homography from a single pattern image.
///
/// Retaking the image drops a stored outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomographyStage;

impl CalibrationStage for HomographyStage {
    type Settings = HomographySettings;
    type Image = CalibrationImage;
    type Output = HomographyOutcome;

    fn name() -> &'static str {
        "homography"
    }

    fn keeps_single_image() -> bool {
        true
    }

    fn on_recapture() -> RecapturePolicy {
        RecapturePolicy::Invalidate
    }

    fn validate_settings(settings: &Self::Settings) -> RigResult<()> {
        settings.validate()
    }
}

/// Scintillator edge rectangle selected on a captured frame.
///
/// Takes no settings. The output is the ROI in the stored frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScintillatorEdgeStage;

impl CalibrationStage for ScintillatorEdgeStage {
    type Settings = ();
    type Image = CalibrationImage;
    type Output = Roi;

    fn name() -> &'static str {
        "scintillator_edges"
    }

    fn requires_settings() -> bool {
        false
    }

    fn keeps_single_image() -> bool {
        true
    }

    fn on_recapture() -> RecapturePolicy {
        RecapturePolicy::Invalidate
    }

    fn validate_output(images: &[Self::Image], output: &Self::Output) -> RigResult<()> {
        let image = images
            .last()
            .ok_or_else(|| RigError::precondition("no scintillator image captured"))?;
        RoiMapper::new(image.size).validate(output)
    }
}
