//! Stage gating, acquisition readiness and analysis dependencies for the
//! proton-beam camera rig.
//!
//! ## Stage API
//!
//! Each setup camera carries a [`SetupCameraCalibration`] with one
//! [`StageSession`](session::StageSession) per calibration stage. Step
//! functions drive a stage through the [`CalibrationBackend`] and only move
//! state once the backend call succeeded.
//!
//! ```no_run
//! use beamrig_pipeline::calibration::{step_capture_image, SetupCameraCalibration, StageKind};
//! use beamrig_pipeline::CalibrationBackend;
//! # fn main() -> beamrig_core::RigResult<()> {
//! # let setup: beamrig_core::Setup = unimplemented!();
//! # let backend: Box<dyn CalibrationBackend> = unimplemented!();
//!
//! let mut calib = SetupCameraCalibration::new(beamrig_core::SetupCameraId(1));
//! for action in calib.available_actions(&setup) {
//!     println!("{}: available={}", action.stage, action.available);
//! }
//! let frame = beamrig_core::ImageSize::new(1920, 1080);
//! step_capture_image(&mut calib, &setup, frame, StageKind::ScintillatorEdges, backend.as_ref())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Engine API
//!
//! [`RigEngine`] wraps a repository and applies the same rules to stored
//! entities: settings saves are shown optimistically and rolled back on
//! failure, analysis answers carry request epochs so stale ones are dropped.

pub mod acquisition;
pub mod analysis;
pub mod backend;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod repository;
pub mod session;
pub mod snapshot;
pub mod sync;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::acquisition::{DurationModel, RunDuration, SettingsCompletedness};
pub use crate::analysis::AnalysisOverview;
pub use crate::backend::{AcquisitionBackend, CalibrationBackend};
pub use crate::calibration::{SetupCameraCalibration, StageAvailability, StageKind};
pub use crate::config::{CalibrationConfig, RigConfig};
pub use crate::engine::RigEngine;
pub use crate::repository::{
    AnalysisRepository, InMemoryRig, PhotoRepository, RigRepository, SettingsRepository,
    SetupCameraRepository,
};
pub use crate::snapshot::{RigSnapshot, SetupCameraRecord, SNAPSHOT_SCHEMA_VERSION};
pub use crate::sync::{OptimisticStore, PendingId, PollIntervals, RequestLifecycle};
