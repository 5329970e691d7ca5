//! Core entity model and geometry for the proton-beam camera rig.
//!
//! This crate contains:
//! - strongly typed entity identifiers (`CameraId`, `BeamRunId`, ...),
//! - the rig data model (setups, cameras, beam runs, settings, analyses),
//! - the [`RigError`] taxonomy shared by every engine operation,
//! - the [`RoiMapper`] converting scintillator-edge rectangles between the
//!   display frame (origin top-left) and the stored frame (origin bottom-left).
//!
//! Nothing here talks to the backend; the pipeline crate layers the stage
//! gating and readiness rules on top of these types.

/// Error taxonomy for rejected transitions.
pub mod error;
/// Entity identifier newtypes.
pub mod ids;
/// Scalar and point aliases.
pub mod math;
/// Rig entities.
pub mod models;
/// Display/stored ROI conversion and overlay geometry.
pub mod roi;

pub use error::*;
pub use ids::*;
pub use math::*;
pub use models::*;
pub use roi::*;
