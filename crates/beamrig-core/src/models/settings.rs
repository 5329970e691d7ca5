use serde::{Deserialize, Serialize};

use crate::{reject_non_positive, CameraId, Real, RigError, RigResult, SettingsId};

/// Most photos one real-run settings record may request.
pub const MAX_IMAGES_PER_RECORD: u32 = 10_000;

/// Most gain points one sweep may expand into.
pub const MAX_SWEEP_POINTS: usize = 1_000;

/// Exposure settings for one camera in one beam run.
///
/// Real runs hold exactly one record per camera. Test runs expand their gain
/// sweeps into one record per gain point (see [`GainSweep::photo_settings`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub id: SettingsId,
    pub camera_id: CameraId,
    pub gain: Option<Real>,
    pub frame_rate: Option<Real>,
    #[serde(default)]
    pub lens_position: Option<Real>,
    #[serde(default)]
    pub number_of_images: Option<u32>,
    #[serde(default)]
    pub take_raw_images: Option<bool>,
    #[serde(default)]
    pub is_optimal: Option<bool>,
}

impl CameraSettings {
    /// Empty record for `camera_id`.
    pub fn new(id: SettingsId, camera_id: CameraId) -> Self {
        Self {
            id,
            camera_id,
            gain: None,
            frame_rate: None,
            lens_position: None,
            number_of_images: None,
            take_raw_images: None,
            is_optimal: None,
        }
    }

    /// Fields a real run needs that are still null.
    pub fn missing_real_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.gain.is_none() {
            missing.push("gain");
        }
        if self.frame_rate.is_none() {
            missing.push("frame_rate");
        }
        if self.number_of_images.is_none() {
            missing.push("number_of_images");
        }
        if self.take_raw_images.is_none() {
            missing.push("take_raw_images");
        }
        missing
    }

    pub fn is_complete_for_real(&self) -> bool {
        self.missing_real_fields().is_empty()
    }

    /// Reject values no capture could use. Missing fields are allowed; they
    /// only make the record incomplete.
    pub fn validate(&self) -> RigResult<()> {
        reject_non_positive("gain", self.gain)?;
        reject_non_positive("frame_rate", self.frame_rate)?;
        match self.number_of_images {
            Some(0) => return Err(RigError::validation("number_of_images must be positive")),
            Some(n) if n > MAX_IMAGES_PER_RECORD => {
                return Err(RigError::validation(format!(
                    "number_of_images {n} exceeds {MAX_IMAGES_PER_RECORD}"
                )))
            }
            _ => {}
        }
        if let Some(lens) = self.lens_position {
            if !lens.is_finite() {
                return Err(RigError::validation("lens_position must be finite"));
            }
        }
        Ok(())
    }
}

/// Gain sweep requested for one camera in a test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainSweep {
    pub id: SettingsId,
    pub camera_id: CameraId,
    pub frame_rate: Option<Real>,
    pub lowest_gain: Option<Real>,
    pub highest_gain: Option<Real>,
    pub gain_increment: Option<Real>,
    #[serde(default)]
    pub lens_position: Option<Real>,
}

impl GainSweep {
    pub fn new(id: SettingsId, camera_id: CameraId) -> Self {
        Self {
            id,
            camera_id,
            frame_rate: None,
            lowest_gain: None,
            highest_gain: None,
            gain_increment: None,
            lens_position: None,
        }
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.frame_rate.is_none() {
            missing.push("frame_rate");
        }
        if self.lowest_gain.is_none() {
            missing.push("lowest_gain");
        }
        if self.highest_gain.is_none() {
            missing.push("highest_gain");
        }
        if self.gain_increment.is_none() {
            missing.push("gain_increment");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn validate(&self) -> RigResult<()> {
        reject_non_positive("frame_rate", self.frame_rate)?;
        reject_non_positive("lowest_gain", self.lowest_gain)?;
        reject_non_positive("highest_gain", self.highest_gain)?;
        reject_non_positive("gain_increment", self.gain_increment)?;
        if let (Some(lo), Some(hi)) = (self.lowest_gain, self.highest_gain) {
            if lo > hi {
                return Err(RigError::validation(format!(
                    "lowest_gain {lo} exceeds highest_gain {hi}"
                )));
            }
            if let Some(inc) = self.gain_increment {
                let points = sweep_steps(lo, hi, inc) + 1.0;
                if points > MAX_SWEEP_POINTS as Real {
                    return Err(RigError::validation(format!(
                        "gain sweep {} expands to {points} points, more than {MAX_SWEEP_POINTS}",
                        self.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Gains `lowest, lowest + increment, ...` up to and including `highest`.
    pub fn gain_points(&self) -> RigResult<Vec<Real>> {
        self.validate()?;
        let (Some(lo), Some(hi), Some(inc)) =
            (self.lowest_gain, self.highest_gain, self.gain_increment)
        else {
            return Err(RigError::validation(format!(
                "gain sweep {} incomplete: missing {}",
                self.id,
                self.missing_fields().join(", ")
            )));
        };
        // Bounded by MAX_SWEEP_POINTS through validate().
        let steps = sweep_steps(lo, hi, inc) as usize;
        Ok((0..=steps).map(|i| lo + i as Real * inc).collect())
    }

    /// One settings record per gain point, each standing for one photo.
    pub fn photo_settings(&self) -> RigResult<Vec<CameraSettings>> {
        let frame_rate = self.frame_rate;
        Ok(self
            .gain_points()?
            .into_iter()
            .map(|gain| CameraSettings {
                id: self.id,
                camera_id: self.camera_id,
                gain: Some(gain),
                frame_rate,
                lens_position: self.lens_position,
                number_of_images: Some(1),
                take_raw_images: None,
                is_optimal: None,
            })
            .collect())
    }
}

/// Whole increments between `lo` and `hi`. The tolerance keeps `hi` when
/// `(hi - lo) / inc` lands a hair under an integer.
fn sweep_steps(lo: Real, hi: Real, inc: Real) -> Real {
    ((hi - lo) / inc + 1e-9).floor()
}
