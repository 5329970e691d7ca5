use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CameraId, ImageSize, Real, SetupCameraId, SetupId};

/// Physical rig configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub id: SetupId,
    pub name: String,
    /// When set, homography and edge stages stay locked until the distortion
    /// calibration of the same camera is saved.
    pub do_distortion_calibration: bool,
    /// Box geometry and refractive index; opaque to the engine.
    #[serde(default)]
    pub parameters: BTreeMap<String, Real>,
}

/// Physical camera device identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    pub id: CameraId,
    /// Login on the camera's host.
    pub username: String,
    pub ip_address: String,
    pub model: String,
}

/// Viewing direction of a camera relative to the beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraRole {
    Top,
    Side,
}

/// One camera mounted in one setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupCamera {
    pub id: SetupCameraId,
    pub setup_id: SetupId,
    pub camera_id: CameraId,
    /// Unset cameras count toward neither side of the Bragg-peak check.
    #[serde(default)]
    pub role: Option<CameraRole>,
    /// Sensor frame size used for ROI conversion.
    pub image_size: ImageSize,
}
