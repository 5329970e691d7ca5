use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(
    /// Physical rig configuration.
    SetupId
);
entity_id!(
    /// Physical camera device.
    CameraId
);
entity_id!(
    /// One camera mounted in one setup.
    SetupCameraId
);
entity_id!(ExperimentId);
entity_id!(BeamRunId);
entity_id!(
    /// Camera settings record or test-run gain sweep.
    SettingsId
);
entity_id!(PhotoId);
entity_id!(
    /// Calibration image held by the backend.
    ImageId
);
entity_id!(AnalysisId);
entity_id!(PlotId);
entity_id!(RangeCalculationId);
entity_id!(BraggPeakDepthId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&CameraId(7)).unwrap();
        assert_eq!(json, "7");
        let back: CameraId = serde_json::from_str("7").unwrap();
        assert_eq!(back, CameraId(7));
    }

    #[test]
    fn ids_display_inner_value() {
        assert_eq!(BeamRunId(42).to_string(), "42");
    }
}
