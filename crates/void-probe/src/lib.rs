//! External telemetry collaborator for a [`void_core::MemoryManager`]: drives
//! synthetic load, samples manager health each window, and checks the run
//! for reward collapse or heat blowups (`spec.md` §6).

mod drive;
mod error;
mod report;
mod sample;
mod thresholds;

pub use drive::{drive_manager_for_telemetry, DriveConfig, DriveRun};
pub use error::ProbeError;
pub use report::{
    ensure_reports_directory, generate_report, render_json_report, render_markdown_report,
    summarize_samples, tally_events, EventTotals, TelemetryReport,
};
pub use sample::{collect_sample, TelemetrySample};
pub use thresholds::{detect_anomalies, AnomalyThresholds, Severity, TelemetryAnomaly};
