//! Anomaly detection over a run of [`crate::sample::TelemetrySample`]s.

use serde::{Deserialize, Serialize};

use crate::sample::TelemetrySample;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyThresholds {
    pub min_reward_ema: f64,
    pub max_avg_heat_delta: f64,
    pub max_heat: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            min_reward_ema: 0.12,
            max_avg_heat_delta: 2.5,
            max_heat: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Critical,
}

/// One anomalous reading; `metric` names which of `{reward_ema,
/// avg_heat_delta, max_heat}` tripped (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryAnomaly {
    pub window: usize,
    pub metric: &'static str,
    pub severity: Severity,
    pub detail: String,
}

/// Scan a run of samples for reward collapse, heat-delta blowups, and
/// per-sample heat ceiling breaches (escalating to critical above 1.2x the
/// configured ceiling).
pub fn detect_anomalies(
    samples: &[TelemetrySample],
    thresholds: &AnomalyThresholds,
) -> Vec<TelemetryAnomaly> {
    let mut anomalies = Vec::new();

    if let Some(last) = samples.last() {
        if last.reward_ema < thresholds.min_reward_ema {
            anomalies.push(TelemetryAnomaly {
                window: last.window,
                metric: "reward_ema",
                severity: Severity::Warning,
                detail: format!(
                    "reward_ema {:.4} below floor {:.4}",
                    last.reward_ema, thresholds.min_reward_ema
                ),
            });
        }
    }

    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        let delta = last.average_heat - first.average_heat;
        if delta.abs() > thresholds.max_avg_heat_delta {
            anomalies.push(TelemetryAnomaly {
                window: last.window,
                metric: "avg_heat_delta",
                severity: Severity::Warning,
                detail: format!(
                    "average heat moved {:.4} over the run (ceiling {:.4})",
                    delta, thresholds.max_avg_heat_delta
                ),
            });
        }
    }

    for sample in samples {
        if sample.average_heat > thresholds.max_heat {
            let severity = if sample.average_heat > thresholds.max_heat * 1.2 {
                Severity::Critical
            } else {
                Severity::Warning
            };
            anomalies.push(TelemetryAnomaly {
                window: sample.window,
                metric: "max_heat",
                severity,
                detail: format!(
                    "average heat {:.4} exceeds ceiling {:.4}",
                    sample.average_heat, thresholds.max_heat
                ),
            });
        }
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(window: usize, reward_ema: f64, average_heat: f64) -> TelemetrySample {
        TelemetrySample {
            window,
            tick: window as i64,
            count: 10,
            territory_count: 2,
            reward_ema,
            average_heat,
            max_territory_span: 5,
            frontier_size: 0,
            pending_condense: 0,
        }
    }

    #[test]
    fn flags_reward_floor_breach() {
        let samples = vec![sample(0, 0.5, 0.1), sample(1, 0.05, 0.1)];
        let anomalies = detect_anomalies(&samples, &AnomalyThresholds::default());
        assert!(anomalies.iter().any(|a| a.metric == "reward_ema"));
    }

    #[test]
    fn escalates_heat_ceiling_to_critical_above_1_2x() {
        let thresholds = AnomalyThresholds::default();
        let samples = vec![sample(0, 0.5, thresholds.max_heat * 1.3)];
        let anomalies = detect_anomalies(&samples, &thresholds);
        assert!(anomalies
            .iter()
            .any(|a| a.metric == "max_heat" && a.severity == Severity::Critical));
    }

    #[test]
    fn clean_run_has_no_anomalies() {
        let samples = vec![sample(0, 0.5, 0.2), sample(1, 0.5, 0.2)];
        assert!(detect_anomalies(&samples, &AnomalyThresholds::default()).is_empty());
    }
}
