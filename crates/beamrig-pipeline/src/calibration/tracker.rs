//! Per setup-camera calibration state and stage gating.

use beamrig_core::{
    CalibrationImage, DistortionCalibration, DistortionSettings, GuideSegment, HomographyOutcome,
    HomographyPlane, HomographySettings, RigError, RigResult, Roi, RoiMapper, Setup,
    SetupCameraId,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::stages::{DistortionStage, HomographyStage, ScintillatorEdgeStage};
use crate::config::CalibrationConfig;
use crate::session::{StageSession, StageStatus};

/// Identifies one calibration stage of a setup camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", content = "plane", rename_all = "snake_case")]
pub enum StageKind {
    Distortion,
    Homography(HomographyPlane),
    ScintillatorEdges,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Distortion,
        StageKind::Homography(HomographyPlane::Near),
        StageKind::Homography(HomographyPlane::Far),
        StageKind::ScintillatorEdges,
    ];

    /// Stages cleared together with this one on reset.
    pub fn dependents(self) -> &'static [StageKind] {
        match self {
            StageKind::Distortion => &[
                StageKind::Homography(HomographyPlane::Near),
                StageKind::Homography(HomographyPlane::Far),
                StageKind::ScintillatorEdges,
            ],
            _ => &[],
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Distortion => write!(f, "distortion"),
            StageKind::Homography(plane) => write!(f, "homography ({plane})"),
            StageKind::ScintillatorEdges => write!(f, "scintillator edges"),
        }
    }
}

/// Whether a stage action may be offered, and why not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAvailability {
    pub stage: StageKind,
    pub status: StageStatus,
    pub available: bool,
    /// Explanation for a locked stage, suitable for a tooltip.
    pub reason: Option<String>,
}

/// Calibration artifacts of one camera in one setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupCameraCalibration {
    pub setup_camera_id: SetupCameraId,
    pub distortion: StageSession<DistortionStage>,
    pub homography_near: StageSession<HomographyStage>,
    pub homography_far: StageSession<HomographyStage>,
    pub scintillator_edges: StageSession<ScintillatorEdgeStage>,
}

impl SetupCameraCalibration {
    pub fn new(setup_camera_id: SetupCameraId) -> Self {
        Self {
            setup_camera_id,
            distortion: StageSession::new(),
            homography_near: StageSession::new(),
            homography_far: StageSession::new(),
            scintillator_edges: StageSession::new(),
        }
    }

    pub fn homography(&self, plane: HomographyPlane) -> &StageSession<HomographyStage> {
        match plane {
            HomographyPlane::Near => &self.homography_near,
            HomographyPlane::Far => &self.homography_far,
        }
    }

    pub fn homography_mut(&mut self, plane: HomographyPlane) -> &mut StageSession<HomographyStage> {
        match plane {
            HomographyPlane::Near => &mut self.homography_near,
            HomographyPlane::Far => &mut self.homography_far,
        }
    }

    pub fn status(&self, stage: StageKind) -> StageStatus {
        match stage {
            StageKind::Distortion => self.distortion.status(),
            StageKind::Homography(plane) => self.homography(plane).status(),
            StageKind::ScintillatorEdges => self.scintillator_edges.status(),
        }
    }

    pub fn is_initial(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::Distortion => self.distortion.is_initial(),
            StageKind::Homography(plane) => self.homography(plane).is_initial(),
            StageKind::ScintillatorEdges => self.scintillator_edges.is_initial(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gating
    // ─────────────────────────────────────────────────────────────────────────

    /// Distortion is always available; homography and edge stages need a
    /// saved distortion calibration when the setup asks for one.
    pub fn is_available(&self, stage: StageKind, setup: &Setup) -> bool {
        self.lock_reason(stage, setup).is_none()
    }

    pub fn availability(&self, stage: StageKind, setup: &Setup) -> StageAvailability {
        let reason = self.lock_reason(stage, setup);
        StageAvailability {
            stage,
            status: self.status(stage),
            available: reason.is_none(),
            reason,
        }
    }

    /// Availability of every stage, in workflow order.
    pub fn available_actions(&self, setup: &Setup) -> Vec<StageAvailability> {
        StageKind::ALL
            .iter()
            .map(|&stage| self.availability(stage, setup))
            .collect()
    }

    pub fn ensure_available(&self, stage: StageKind, setup: &Setup) -> RigResult<()> {
        match self.lock_reason(stage, setup) {
            None => Ok(()),
            Some(reason) => Err(RigError::precondition(reason)),
        }
    }

    /// Every stage the setup needs is finalized and both homography planes
    /// succeeded.
    pub fn is_calibrated(&self, setup: &Setup) -> bool {
        let distortion_ok = !setup.do_distortion_calibration || self.distortion.is_finalized();
        let planes_ok = HomographyPlane::ALL.iter().all(|&plane| {
            self.homography(plane)
                .output()
                .is_some_and(|outcome| outcome.success)
        });
        distortion_ok && planes_ok && self.scintillator_edges.is_finalized()
    }

    fn lock_reason(&self, stage: StageKind, setup: &Setup) -> Option<String> {
        match stage {
            StageKind::Distortion => None,
            StageKind::Homography(_) | StageKind::ScintillatorEdges => {
                if setup.do_distortion_calibration && !self.distortion.is_finalized() {
                    Some(format!(
                        "{stage} requires a saved distortion calibration for setup camera {}",
                        self.setup_camera_id
                    ))
                } else {
                    None
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Distortion
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_distortion_settings(&mut self, settings: DistortionSettings) -> RigResult<()> {
        self.distortion.create_settings(settings)
    }

    pub fn update_distortion_settings(&mut self, settings: DistortionSettings) -> RigResult<()> {
        self.distortion.update_settings(settings)
    }

    pub fn record_distortion_image(&mut self, image: CalibrationImage) -> RigResult<usize> {
        self.distortion.record_image(image)
    }

    pub fn finalize_distortion(
        &mut self,
        result: DistortionCalibration,
        config: &CalibrationConfig,
    ) -> RigResult<()> {
        self.distortion.finalize(result, config)?;
        info!(
            "setup camera {}: distortion calibration saved from {} images",
            self.setup_camera_id,
            self.distortion.images().len()
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Homography
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_homography_settings(
        &mut self,
        setup: &Setup,
        plane: HomographyPlane,
        settings: HomographySettings,
    ) -> RigResult<()> {
        self.ensure_available(StageKind::Homography(plane), setup)?;
        self.homography_mut(plane).create_settings(settings)
    }

    pub fn update_homography_settings(
        &mut self,
        setup: &Setup,
        plane: HomographyPlane,
        settings: HomographySettings,
    ) -> RigResult<()> {
        self.ensure_available(StageKind::Homography(plane), setup)?;
        self.homography_mut(plane).update_settings(settings)
    }

    /// Record a homography image. A retake replaces the previous image and
    /// drops a stored outcome.
    pub fn record_homography_image(
        &mut self,
        setup: &Setup,
        plane: HomographyPlane,
        image: CalibrationImage,
    ) -> RigResult<usize> {
        self.ensure_available(StageKind::Homography(plane), setup)?;
        self.homography_mut(plane).record_image(image)
    }

    pub fn finalize_homography(
        &mut self,
        setup: &Setup,
        plane: HomographyPlane,
        outcome: HomographyOutcome,
        config: &CalibrationConfig,
    ) -> RigResult<()> {
        self.ensure_available(StageKind::Homography(plane), setup)?;
        let success = outcome.success;
        self.homography_mut(plane).finalize(outcome, config)?;
        info!(
            "setup camera {}: {plane} homography calibrated (success={success})",
            self.setup_camera_id
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scintillator edges
    // ─────────────────────────────────────────────────────────────────────────

    pub fn record_edge_image(&mut self, setup: &Setup, image: CalibrationImage) -> RigResult<usize> {
        self.ensure_available(StageKind::ScintillatorEdges, setup)?;
        self.scintillator_edges.record_image(image)
    }

    /// Convert a display-frame selection to the stored frame and save it.
    pub fn select_roi(
        &mut self,
        setup: &Setup,
        display: &Roi,
        config: &CalibrationConfig,
    ) -> RigResult<Roi> {
        self.ensure_available(StageKind::ScintillatorEdges, setup)?;
        let mapper = self.edge_mapper().ok_or_else(|| {
            RigError::precondition("capture a scintillator image before selecting edges")
        })?;
        let stored = mapper.to_stored(display)?;
        self.scintillator_edges.finalize(stored, config)?;
        info!(
            "setup camera {}: scintillator ROI selected {:?}",
            self.setup_camera_id, stored
        );
        Ok(stored)
    }

    /// Mapper for the most recent scintillator image.
    pub fn edge_mapper(&self) -> Option<RoiMapper> {
        self.scintillator_edges
            .latest_image()
            .map(|image| RoiMapper::new(image.size))
    }

    /// Saved ROI converted back to the display frame.
    pub fn display_roi(&self) -> Option<Roi> {
        let mapper = self.edge_mapper()?;
        self.scintillator_edges
            .output()
            .map(|stored| mapper.to_display(stored))
    }

    /// Guide lines for the saved ROI.
    pub fn roi_overlay(&self) -> Option<[GuideSegment; 4]> {
        let mapper = self.edge_mapper()?;
        self.display_roi().map(|roi| mapper.overlay_lines(&roi))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reset
    // ─────────────────────────────────────────────────────────────────────────

    /// Clear `stage` and every stage gated on it. Returns the stages cleared.
    pub fn reset(&mut self, stage: StageKind) -> Vec<StageKind> {
        let mut cleared = vec![stage];
        cleared.extend_from_slice(stage.dependents());
        self.reset_single(stage, None);
        for &kind in stage.dependents() {
            self.reset_single(kind, Some(stage));
        }
        info!(
            "setup camera {}: reset {}",
            self.setup_camera_id,
            cleared
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        cleared
    }

    fn reset_single(&mut self, stage: StageKind, origin: Option<StageKind>) {
        match (stage, origin) {
            (StageKind::Distortion, None) => self.distortion.reset(),
            (StageKind::Distortion, Some(origin)) => self.distortion.reset_cascaded(origin),
            (StageKind::Homography(plane), None) => self.homography_mut(plane).reset(),
            (StageKind::Homography(plane), Some(origin)) => {
                self.homography_mut(plane).reset_cascaded(origin)
            }
            (StageKind::ScintillatorEdges, None) => self.scintillator_edges.reset(),
            (StageKind::ScintillatorEdges, Some(origin)) => {
                self.scintillator_edges.reset_cascaded(origin)
            }
        }
    }
}
