//! Summarizing a run of samples into a report, and rendering that report as
//! Markdown for a human to read.

use std::path::Path;

use serde::{Deserialize, Serialize};

use void_core::{Event, EventKind};

use crate::error::ProbeError;
use crate::sample::TelemetrySample;
use crate::thresholds::{self, AnomalyThresholds, TelemetryAnomaly};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub windows: usize,
    pub register_events: usize,
    pub reinforce_events: usize,
    pub degrade_events: usize,
    pub evict_events: usize,
    pub heat_trend: f64,
    pub final_reward_ema: f64,
    pub final_frontier_size: usize,
    pub max_territory_span: usize,
    pub anomalies: Vec<TelemetryAnomaly>,
    pub status: &'static str,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EventTotals {
    pub register: usize,
    pub reinforce: usize,
    pub degrade: usize,
    pub evict: usize,
}

/// Fold a run of samples (plus the raw event totals already tallied by the
/// caller) into a single report.
pub fn summarize_samples(
    samples: &[TelemetrySample],
    totals: EventTotals,
    thresholds: &AnomalyThresholds,
) -> TelemetryReport {
    let heat_trend = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => last.average_heat - first.average_heat,
        _ => 0.0,
    };
    let final_reward_ema = samples.last().map(|s| s.reward_ema).unwrap_or(0.0);
    let final_frontier_size = samples.last().map(|s| s.frontier_size).unwrap_or(0);
    let max_territory_span = samples
        .iter()
        .map(|s| s.max_territory_span)
        .max()
        .unwrap_or(0);
    let anomalies = thresholds::detect_anomalies(samples, thresholds);
    let status = if anomalies.is_empty() { "ok" } else { "alert" };
    if status == "alert" {
        tracing::warn!(count = anomalies.len(), "telemetry run flagged anomalies");
    }

    TelemetryReport {
        windows: samples.len(),
        register_events: totals.register,
        reinforce_events: totals.reinforce,
        degrade_events: totals.degrade,
        evict_events: totals.evict,
        heat_trend,
        final_reward_ema,
        final_frontier_size,
        max_territory_span,
        anomalies,
        status,
    }
}

pub fn generate_report(
    samples: &[TelemetrySample],
    totals: EventTotals,
    thresholds: &AnomalyThresholds,
) -> TelemetryReport {
    summarize_samples(samples, totals, thresholds)
}

/// Tally the event kinds a drive run emitted into the totals
/// [`summarize_samples`] expects.
pub fn tally_events(events: &[Event]) -> EventTotals {
    let mut totals = EventTotals::default();
    for event in events {
        match &event.kind {
            EventKind::Register { .. } => totals.register += 1,
            EventKind::Reinforce { .. } => totals.reinforce += 1,
            EventKind::Degrade { .. } => totals.degrade += 1,
            EventKind::Evict { .. } => totals.evict += 1,
            _ => {}
        }
    }
    totals
}

/// Ensure the directory a report will be written into exists.
pub fn ensure_reports_directory(dir: &Path) -> Result<(), ProbeError> {
    tracing::debug!(dir = %dir.display(), "ensuring reports directory exists");
    std::fs::create_dir_all(dir).map_err(|source| ProbeError::CreateReportsDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Render a report as pretty-printed JSON, the machine-readable counterpart
/// to [`render_markdown_report`].
pub fn render_json_report(report: &TelemetryReport) -> Result<String, ProbeError> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render_markdown_report(report: &TelemetryReport) -> String {
    let mut out = String::new();
    out.push_str("# Telemetry Report\n\n");
    out.push_str(&format!("Status: **{}**\n\n", report.status));
    out.push_str("| metric | value |\n|---|---|\n");
    out.push_str(&format!("| windows | {} |\n", report.windows));
    out.push_str(&format!("| register events | {} |\n", report.register_events));
    out.push_str(&format!("| reinforce events | {} |\n", report.reinforce_events));
    out.push_str(&format!("| degrade events | {} |\n", report.degrade_events));
    out.push_str(&format!("| evict events | {} |\n", report.evict_events));
    out.push_str(&format!("| heat trend | {:.4} |\n", report.heat_trend));
    out.push_str(&format!("| final reward ema | {:.4} |\n", report.final_reward_ema));
    out.push_str(&format!(
        "| final frontier size | {} |\n",
        report.final_frontier_size
    ));
    out.push_str(&format!(
        "| max territory span | {} |\n",
        report.max_territory_span
    ));

    if report.anomalies.is_empty() {
        out.push_str("\nNo anomalies detected.\n");
    } else {
        out.push_str("\n## Anomalies\n\n");
        for anomaly in &report.anomalies {
            out.push_str(&format!(
                "- window {} [{:?}] {}: {}\n",
                anomaly.window, anomaly.severity, anomaly.metric, anomaly.detail
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::TelemetrySample;

    fn sample(window: usize, reward_ema: f64, average_heat: f64) -> TelemetrySample {
        TelemetrySample {
            window,
            tick: window as i64,
            count: 1,
            territory_count: 1,
            reward_ema,
            average_heat,
            max_territory_span: 1,
            frontier_size: 0,
            pending_condense: 0,
        }
    }

    #[test]
    fn clean_run_reports_ok_status() {
        let samples = vec![sample(0, 0.5, 0.2), sample(1, 0.5, 0.2)];
        let report = summarize_samples(&samples, EventTotals::default(), &AnomalyThresholds::default());
        assert_eq!(report.status, "ok");
    }

    #[test]
    fn json_report_round_trips_status() {
        let samples = vec![sample(0, 0.5, 0.2)];
        let report = summarize_samples(&samples, EventTotals::default(), &AnomalyThresholds::default());
        let json = render_json_report(&report).unwrap();
        let parsed: TelemetryReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, report.status);
    }

    #[test]
    fn ensure_reports_directory_creates_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_reports_directory(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn markdown_report_includes_status_and_table() {
        let samples = vec![sample(0, 0.5, 0.2)];
        let report = summarize_samples(&samples, EventTotals::default(), &AnomalyThresholds::default());
        let markdown = render_markdown_report(&report);
        assert!(markdown.contains("# Telemetry Report"));
        assert!(markdown.contains("| windows | 1 |"));
    }
}
