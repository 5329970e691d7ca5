use serde::{Deserialize, Serialize};

use crate::{
    AnalysisId, BeamRunId, BraggPeakDepthId, CameraId, PhotoId, PlotId, RangeCalculationId,
    Real, SettingsId,
};

/// Capture artifact. The image payload stays on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub beam_run_id: BeamRunId,
    pub camera_id: CameraId,
    /// Settings or gain sweep the photo was taken with.
    #[serde(default)]
    pub settings_id: Option<SettingsId>,
    /// Gain point for test-run sweep photos.
    #[serde(default)]
    pub gain: Option<Real>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColourChannel {
    Red,
    Green,
    Blue,
    Grey,
}

/// Single-camera analysis of a real run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraAnalysis {
    pub id: AnalysisId,
    pub beam_run_id: BeamRunId,
    pub camera_id: CameraId,
    /// Channel the beam profile was extracted from.
    pub colour_channel: ColourChannel,
    /// Analysed the mean of all run photos instead of a single photo.
    pub average_image: bool,
    /// Beam angle fitted in the image plane.
    pub beam_angle: Option<Real>,
    pub beam_angle_uncertainty: Option<Real>,
    /// Bragg-peak position `[x, y]` in image pixels.
    pub bragg_peak_pixel: [Option<Real>; 2],
    pub bragg_peak_pixel_uncertainty: [Option<Real>; 2],
    /// Plots rendered by the backend for this analysis.
    #[serde(default)]
    pub plots: Vec<PlotId>,
}

impl CameraAnalysis {
    /// Beam angle, both Bragg-peak pixel components and all their
    /// uncertainties are present.
    pub fn is_complete(&self) -> bool {
        self.beam_angle.is_some()
            && self.beam_angle_uncertainty.is_some()
            && self.bragg_peak_pixel.iter().all(Option::is_some)
            && self.bragg_peak_pixel_uncertainty.iter().all(Option::is_some)
    }
}

/// Range computed for one camera of a real run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeCalculation {
    pub id: RangeCalculationId,
    pub beam_run_id: BeamRunId,
    pub camera_id: CameraId,
    /// Plots rendered by the backend for this range.
    #[serde(default)]
    pub plots: Vec<PlotId>,
}

/// Run-level Bragg-peak depth combining top and side cameras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BraggPeakDepth {
    pub id: BraggPeakDepthId,
    pub beam_run_id: BeamRunId,
    /// Unset until the backend has computed it.
    #[serde(default)]
    pub depth: Option<Real>,
    #[serde(default)]
    pub depth_uncertainty: Option<Real>,
}
