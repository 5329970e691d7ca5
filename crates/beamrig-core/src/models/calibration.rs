use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{require_positive, ImageId, ImageSize, Real, RigError, RigResult};

/// Reference plane for the homography stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomographyPlane {
    Near,
    Far,
}

impl HomographyPlane {
    pub const ALL: [HomographyPlane; 2] = [HomographyPlane::Near, HomographyPlane::Far];
}

impl fmt::Display for HomographyPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HomographyPlane::Near => write!(f, "near"),
            HomographyPlane::Far => write!(f, "far"),
        }
    }
}

/// Pattern and exposure parameters for distortion calibration images.
///
/// Fields are optional so a half-filled form can be represented; validation
/// rejects missing or non-positive values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistortionSettings {
    pub grid_columns: Option<u32>,
    pub grid_rows: Option<u32>,
    /// Distance between pattern features in millimetres.
    pub pattern_spacing: Option<Real>,
    pub gain: Option<Real>,
}

impl DistortionSettings {
    pub fn validate(&self) -> RigResult<()> {
        require_positive("grid_columns", self.grid_columns.map(Real::from))?;
        require_positive("grid_rows", self.grid_rows.map(Real::from))?;
        require_positive("pattern_spacing", self.pattern_spacing)?;
        require_positive("gain", self.gain)?;
        Ok(())
    }
}

/// Pattern, exposure and plane placement for one homography plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomographySettings {
    pub grid_columns: Option<u32>,
    pub grid_rows: Option<u32>,
    pub pattern_spacing: Option<Real>,
    pub gain: Option<Real>,
    /// Offset of the pattern plane from the scintillator face, in millimetres.
    pub offset: Option<Real>,
}

impl HomographySettings {
    pub fn validate(&self) -> RigResult<()> {
        require_positive("grid_columns", self.grid_columns.map(Real::from))?;
        require_positive("grid_rows", self.grid_rows.map(Real::from))?;
        require_positive("pattern_spacing", self.pattern_spacing)?;
        require_positive("gain", self.gain)?;
        match self.offset {
            None => Err(RigError::validation("offset is required")),
            Some(v) if !v.is_finite() => Err(RigError::validation("offset must be finite")),
            Some(_) => Ok(()),
        }
    }
}

/// Handle to an image captured by the backend for a calibration stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationImage {
    pub id: ImageId,
    pub size: ImageSize,
}

/// Saved lens distortion result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistortionCalibration {
    pub camera_matrix: [[Real; 3]; 3],
    pub coefficients: Vec<Real>,
}

/// Backend verdict for a homography plane, stored whether or not it succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomographyOutcome {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distortion() -> DistortionSettings {
        DistortionSettings {
            grid_columns: Some(9),
            grid_rows: Some(6),
            pattern_spacing: Some(2.5),
            gain: Some(4.0),
        }
    }

    #[test]
    fn distortion_settings_require_all_fields() {
        assert!(distortion().validate().is_ok());

        let missing_rows = DistortionSettings {
            grid_rows: None,
            ..distortion()
        };
        let err = missing_rows.validate().unwrap_err();
        assert!(err.to_string().contains("grid_rows"));

        let zero_spacing = DistortionSettings {
            pattern_spacing: Some(0.0),
            ..distortion()
        };
        assert!(zero_spacing.validate().is_err());
    }

    #[test]
    fn homography_settings_need_offset() {
        let settings = HomographySettings {
            grid_columns: Some(9),
            grid_rows: Some(6),
            pattern_spacing: Some(2.5),
            gain: Some(4.0),
            offset: None,
        };
        assert!(settings.validate().unwrap_err().to_string().contains("offset"));

        let with_offset = HomographySettings {
            offset: Some(-12.0),
            ..settings
        };
        assert!(with_offset.validate().is_ok());
    }

    #[test]
    fn plane_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&HomographyPlane::Far).unwrap(),
            "\"far\""
        );
        assert_eq!(HomographyPlane::Near.to_string(), "near");
    }
}
