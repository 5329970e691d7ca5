//! Stage session framework.
//!
//! A [`StageSession`] is a mutable state container parameterized over a
//! [`CalibrationStage`]. It stores the stage's settings record, recorded
//! images and final output; transitions mutate it in place and either apply
//! fully or not at all.
//!
//! ```
//! use beamrig_pipeline::calibration::DistortionStage;
//! use beamrig_pipeline::session::{StageSession, StageStatus};
//!
//! let session = StageSession::<DistortionStage>::new();
//! assert_eq!(session.status(), StageStatus::NoSettings);
//! ```

pub mod stage_session;
pub mod stage_type;
pub mod types;

pub use stage_session::StageSession;
pub use stage_type::{CalibrationStage, RecapturePolicy, StageStatus};
pub use types::{current_timestamp, AuditOutcome, LogEntry};
