mod analysis;
mod calibration;
mod run;
mod settings;
mod setup;

pub use analysis::*;
pub use calibration::*;
pub use run::*;
pub use settings::*;
pub use setup::*;
