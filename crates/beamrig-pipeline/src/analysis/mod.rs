//! Analysis dependencies for real beam runs.

mod resolver;

pub use resolver::{
    camera_roles, can_compute_global_bragg_peak, can_compute_range,
    can_run_single_camera_analysis, create_analysis, create_bragg_peak_depth,
    create_range_calculation, delete_analysis, delete_bragg_peak_depth, is_analysis_complete,
    AnalysisOverview,
};
