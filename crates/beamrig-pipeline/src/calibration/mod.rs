//! Per-camera calibration stages and their gating.
//!
//! # Stages
//!
//! 1. **Distortion**: pattern settings, a series of images, then the saved
//!    camera matrix and coefficients.
//! 2. **Homography** (near and far plane, independent of each other): settings,
//!    one image, then the solver outcome.
//! 3. **Scintillator edges**: one image, then the selected ROI.
//!
//! When the setup asks for distortion calibration, stages 2 and 3 stay locked
//! until distortion is saved, and resetting distortion clears them as well.

mod stages;
mod steps;
mod tracker;

pub use stages::{DistortionStage, HomographyStage, ScintillatorEdgeStage};
pub use steps::{step_calibrate_distortion, step_calibrate_homography, step_capture_image};
pub use tracker::{SetupCameraCalibration, StageAvailability, StageKind};
