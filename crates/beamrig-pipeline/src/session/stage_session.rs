//! Stage session container with mutable state.
//!
//! A stage session stores the settings record, recorded images and final
//! output of one calibration stage. Every operation either applies fully or
//! leaves the session untouched, and is appended to the audit log.

use beamrig_core::{RigError, RigResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::stage_type::{CalibrationStage, RecapturePolicy, StageStatus};
use super::types::LogEntry;
use crate::config::CalibrationConfig;

/// Calibration state of one stage for one setup camera.
///
/// # Transitions
///
/// - `create_settings`: `NoSettings -> AwaitingImage`
/// - `record_image`: `AwaitingImage | Collecting -> Collecting`; on a
///   finalized stage the [`RecapturePolicy`] decides
/// - `finalize`: `Collecting -> Finalized` once enough images are recorded
/// - `reset`: any state back to the initial one
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "S: CalibrationStage")]
pub struct StageSession<S: CalibrationStage> {
    /// Settings record. `None` until created.
    settings: Option<S::Settings>,

    /// Recorded images in capture order.
    #[serde(default)]
    images: Vec<S::Image>,

    /// Stored result. `None` until finalized.
    output: Option<S::Output>,

    /// Operation log (lightweight audit trail).
    #[serde(default)]
    pub log: Vec<LogEntry>,
}

impl<S: CalibrationStage> StageSession<S> {
    pub fn new() -> Self {
        Self {
            settings: None,
            images: Vec::new(),
            output: None,
            log: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn settings(&self) -> Option<&S::Settings> {
        self.settings.as_ref()
    }

    pub fn images(&self) -> &[S::Image] {
        &self.images
    }

    pub fn latest_image(&self) -> Option<&S::Image> {
        self.images.last()
    }

    pub fn output(&self) -> Option<&S::Output> {
        self.output.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.output.is_some()
    }

    pub fn status(&self) -> StageStatus {
        if self.output.is_some() {
            StageStatus::Finalized
        } else if !self.images.is_empty() {
            StageStatus::Collecting {
                images: self.images.len(),
            }
        } else if S::requires_settings() && self.settings.is_none() {
            StageStatus::NoSettings
        } else {
            StageStatus::AwaitingImage
        }
    }

    /// No settings, images or output are stored.
    pub fn is_initial(&self) -> bool {
        self.settings.is_none() && self.images.is_empty() && self.output.is_none()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Store the first settings record.
    ///
    /// # Errors
    ///
    /// - [`RigError::PreconditionNotMet`] if the stage takes no settings or
    ///   already has a record.
    /// - [`RigError::Validation`] if the stage rejects the record.
    pub fn create_settings(&mut self, settings: S::Settings) -> RigResult<()> {
        let result = if !S::requires_settings() {
            Err(RigError::precondition(format!(
                "{} takes no settings",
                S::name()
            )))
        } else if self.settings.is_some() {
            Err(RigError::precondition(format!(
                "{} settings already exist; update or reset the stage",
                S::name()
            )))
        } else {
            S::validate_settings(&settings)
        };
        if result.is_ok() {
            self.transition(|s| s.settings = Some(settings));
        }
        self.record("create_settings", result)
    }

    /// Replace the settings record of a stage that is not finalized yet.
    pub fn update_settings(&mut self, settings: S::Settings) -> RigResult<()> {
        let result = if self.settings.is_none() {
            Err(RigError::precondition(format!(
                "{} has no settings to update",
                S::name()
            )))
        } else if self.is_finalized() {
            Err(RigError::precondition(format!(
                "{} is finalized; reset before changing settings",
                S::name()
            )))
        } else {
            S::validate_settings(&settings)
        };
        if result.is_ok() {
            self.settings = Some(settings);
        }
        self.record("update_settings", result)
    }

    /// Record a captured image and return the number of images held.
    pub fn record_image(&mut self, image: S::Image) -> RigResult<usize> {
        let result = if S::requires_settings() && self.settings.is_none() {
            Err(RigError::precondition(format!(
                "{} needs settings before images can be recorded",
                S::name()
            )))
        } else if self.is_finalized() && S::on_recapture() == RecapturePolicy::Reject {
            Err(RigError::precondition(format!(
                "{} is finalized; reset before recording more images",
                S::name()
            )))
        } else {
            Ok(())
        };
        let result = result.map(|()| {
            self.transition(|s| {
                // Only reachable for `RecapturePolicy::Invalidate` once finalized.
                s.output = None;
                if S::keeps_single_image() {
                    s.images.clear();
                }
                s.images.push(image);
            });
            self.images.len()
        });
        self.record("record_image", result)
    }

    /// Store the stage result.
    ///
    /// # Errors
    ///
    /// - [`RigError::PreconditionNotMet`] if the stage is already finalized or
    ///   fewer than [`CalibrationStage::min_images`] images are recorded.
    /// - Whatever [`CalibrationStage::validate_output`] reports.
    pub fn finalize(&mut self, output: S::Output, config: &CalibrationConfig) -> RigResult<()> {
        let needed = S::min_images(config).max(1);
        let result = if self.is_finalized() {
            Err(RigError::precondition(format!(
                "{} is already finalized",
                S::name()
            )))
        } else if self.images.len() < needed {
            Err(RigError::precondition(format!(
                "{} needs at least {} image(s) (got {})",
                S::name(),
                needed,
                self.images.len()
            )))
        } else {
            S::validate_output(&self.images, &output)
        };
        if result.is_ok() {
            self.transition(|s| s.output = Some(output));
        }
        self.record("finalize", result)
    }

    /// Clear settings, images and output. The audit log is kept.
    pub fn reset(&mut self) {
        self.clear();
        self.log.push(LogEntry::accepted("reset"));
    }

    /// Reset triggered by clearing an upstream stage.
    pub fn reset_cascaded(&mut self, origin: impl fmt::Display) {
        self.clear();
        self.log
            .push(LogEntry::accepted_with("reset", format!("cascaded from {origin}")));
    }

    /// Log a failed operation.
    pub fn log_failure(&mut self, operation: impl Into<String>, error: impl Into<String>) {
        self.log.push(LogEntry::rejected(operation, error));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn clear(&mut self) {
        self.transition(|s| {
            s.settings = None;
            s.images.clear();
            s.output = None;
        });
    }

    fn transition(&mut self, apply: impl FnOnce(&mut Self)) {
        let before = self.status();
        apply(self);
        let after = self.status();
        if before != after {
            debug!("{}: {:?} -> {:?}", S::name(), before, after);
        }
    }

    fn record<T>(&mut self, operation: &str, result: RigResult<T>) -> RigResult<T> {
        match &result {
            Ok(_) => self.log.push(LogEntry::accepted(operation)),
            Err(err) => {
                warn!("{} {} rejected: {}", S::name(), operation, err);
                self.log.push(LogEntry::rejected(operation, err.to_string()));
            }
        }
        result
    }
}

impl<S: CalibrationStage> Default for StageSession<S> {
    fn default() -> Self {
        Self::new()
    }
}
