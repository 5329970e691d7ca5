//! Beam-run readiness and acquisition duration.

mod duration;
mod readiness;

pub use duration::{DurationModel, RunDuration};
pub use readiness::{
    add_gain_sweep, can_take_data, capture_plan, ensure_can_take_data, remove_gain_sweep,
    settings_completedness, take_data, upsert_real_settings, SettingsCompletedness,
};
