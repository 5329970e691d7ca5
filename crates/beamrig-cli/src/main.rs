use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use beamrig_core::{
    BeamRunId, CameraId, CameraRole, ImageSize, Roi, RoiMapper, RunKind, SetupCameraId,
};
use beamrig_pipeline::{
    AnalysisOverview, InMemoryRig, RigConfig, RigEngine, RigSnapshot, RunDuration,
    StageAvailability,
};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

/// Inspect beam-rig snapshots: calibration gating, readiness and estimates.
#[derive(Debug, Parser)]
#[command(author, version, about = "Beam-rig stage gating and readiness")]
struct Args {
    /// Optional path to a JSON RigConfig. Defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at info level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stage availability per setup camera and readiness per beam run.
    Status {
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Acquisition duration of one beam run.
    Estimate {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        run: u64,
    },
    /// Convert a scintillator ROI between display and stored frames.
    Roi {
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long, allow_hyphen_values = true)]
        h_start: f64,
        #[arg(long, allow_hyphen_values = true)]
        h_end: f64,
        #[arg(long, allow_hyphen_values = true)]
        v_start: f64,
        #[arg(long, allow_hyphen_values = true)]
        v_end: f64,
        /// Input is a stored ROI; print it in display coordinates.
        #[arg(long)]
        to_display: bool,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SetupCameraStatus {
    setup_camera_id: SetupCameraId,
    camera_id: CameraId,
    role: Option<CameraRole>,
    calibrated: bool,
    stages: Vec<StageAvailability>,
}

#[derive(Debug, Serialize)]
struct AnalysisStatus {
    #[serde(flatten)]
    overview: AnalysisOverview,
    can_compute_global_bragg_peak: bool,
    can_compute_range: bool,
}

#[derive(Debug, Serialize)]
struct RunStatus {
    id: BeamRunId,
    number: u32,
    kind: RunKind,
    data_taken: bool,
    unset_camera_ids: Vec<CameraId>,
    can_take_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<AnalysisStatus>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    setup_cameras: Vec<SetupCameraStatus>,
    beam_runs: Vec<RunStatus>,
}

#[derive(Debug, Serialize)]
struct RoiReport {
    frame: &'static str,
    roi: Roi,
}

fn load_config(path: Option<&Path>) -> Result<RigConfig> {
    match path {
        Some(path) => RigConfig::load(path),
        None => Ok(RigConfig::default()),
    }
}

fn load_engine(snapshot: &Path, config: RigConfig) -> Result<RigEngine<InMemoryRig>> {
    let snapshot = RigSnapshot::load(snapshot)?;
    info!(
        "loaded snapshot: {} setup cameras, {} beam runs",
        snapshot.setup_cameras.len(),
        snapshot.beam_runs.len()
    );
    Ok(RigEngine::new(InMemoryRig::new(snapshot), config))
}

fn status_report(engine: &RigEngine<InMemoryRig>) -> Result<StatusReport> {
    let snapshot = engine.repo().snapshot();

    let mut setup_cameras = Vec::new();
    for record in &snapshot.setup_cameras {
        let binding = &record.binding;
        let setup = snapshot
            .setups
            .iter()
            .find(|s| s.id == binding.setup_id)
            .with_context(|| format!("setup camera {} refers to a missing setup", binding.id))?;
        setup_cameras.push(SetupCameraStatus {
            setup_camera_id: binding.id,
            camera_id: binding.camera_id,
            role: binding.role,
            calibrated: record.calibration.is_calibrated(setup),
            stages: engine.calibration_actions(binding.id)?,
        });
    }

    let mut beam_runs = Vec::new();
    for run in &snapshot.beam_runs {
        let completeness = engine.settings_completedness(run.id)?;
        let analysis = if run.is_real() {
            let overview = engine.analysis_overview(run.id)?;
            Some(AnalysisStatus {
                can_compute_global_bragg_peak: overview.can_compute_global_bragg_peak(),
                can_compute_range: engine.can_compute_range(run.id)?,
                overview,
            })
        } else {
            None
        };
        beam_runs.push(RunStatus {
            id: run.id,
            number: run.number,
            kind: run.kind(),
            data_taken: run.data_taken,
            can_take_data: completeness.can_take_data(),
            unset_camera_ids: completeness.unset_camera_ids,
            analysis,
        });
    }

    Ok(StatusReport {
        setup_cameras,
        beam_runs,
    })
}

fn status_json(snapshot: &Path, config: RigConfig) -> Result<String> {
    let engine = load_engine(snapshot, config)?;
    let report = status_report(&engine)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

fn estimate_json(snapshot: &Path, run: u64, config: RigConfig) -> Result<String> {
    let engine = load_engine(snapshot, config)?;
    let duration: RunDuration = engine.estimate_duration(BeamRunId(run))?;
    Ok(serde_json::to_string_pretty(&duration)?)
}

fn roi_json(size: ImageSize, roi: Roi, to_display: bool) -> Result<String> {
    let mapper = RoiMapper::new(size);
    let report = if to_display {
        mapper.validate(&roi)?;
        RoiReport {
            frame: "display",
            roi: mapper.to_display(&roi),
        }
    } else {
        RoiReport {
            frame: "stored",
            roi: mapper.to_stored(&roi)?,
        }
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let config = load_config(args.config.as_deref())?;

    let json = match args.command {
        Command::Status { snapshot } => status_json(&snapshot, config)?,
        Command::Estimate { snapshot, run } => estimate_json(&snapshot, run, config)?,
        Command::Roi {
            width,
            height,
            h_start,
            h_end,
            v_start,
            v_end,
            to_display,
        } => roi_json(
            ImageSize::new(width, height),
            Roi::new(h_start, h_end, v_start, v_end),
            to_display,
        )
        .context("ROI conversion failed")?,
    };
    println!("{json}");
    Ok(())
}
