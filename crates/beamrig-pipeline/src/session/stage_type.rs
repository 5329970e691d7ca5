//! Stage trait for calibration stage sessions.
//!
//! Defines the minimal interface a calibration stage implements to work with
//! [`StageSession`](super::StageSession).

use beamrig_core::RigResult;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;

use crate::config::CalibrationConfig;

/// What recording an image does to a stage that is already finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecapturePolicy {
    /// Refuse the image; the stage must be reset first.
    Reject,
    /// Accept the image and drop the stored output.
    Invalidate,
}

/// Progress of one stage session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage needs a settings record before images can be taken.
    NoSettings,
    /// Settings exist (or are not needed) and no image is recorded yet.
    AwaitingImage,
    /// At least one image is recorded but no result is stored.
    Collecting { images: usize },
    /// A result is stored.
    Finalized,
}

/// Trait defining one calibration stage.
///
/// Each stage (distortion, homography, scintillator edges) implements this
/// trait to specify its settings, image handle and output types together
/// with the rules for moving between [`StageStatus`] values.
///
/// Stage-specific behavior that needs the backend lives in step functions
/// operating on the owning tracker rather than in the trait.
pub trait CalibrationStage: Sized + 'static {
    /// Capture and pattern parameters. Use `()` when the stage has none.
    type Settings: Clone + Serialize + DeserializeOwned + Debug + PartialEq;

    /// Handle to a recorded image.
    type Image: Clone + Serialize + DeserializeOwned + Debug + PartialEq;

    /// Stored result of the stage.
    type Output: Clone + Serialize + DeserializeOwned + Debug + PartialEq;

    /// Stable, snake_case identifier used in logs and snapshots.
    fn name() -> &'static str;

    /// Whether a settings record must exist before images are accepted.
    fn requires_settings() -> bool {
        true
    }

    /// Minimum number of recorded images before the stage may finalize.
    fn min_images(_config: &CalibrationConfig) -> usize {
        1
    }

    /// Keep only the most recent image instead of accumulating.
    fn keeps_single_image() -> bool {
        false
    }

    /// Behavior when an image arrives after finalization.
    fn on_recapture() -> RecapturePolicy {
        RecapturePolicy::Reject
    }

    /// Validate a settings record before it is stored.
    fn validate_settings(_settings: &Self::Settings) -> RigResult<()> {
        Ok(())
    }

    /// Validate an output against the recorded images before it is stored.
    fn validate_output(_images: &[Self::Image], _output: &Self::Output) -> RigResult<()> {
        Ok(())
    }
}
