//! Synthetic load generator: drives a manager through a fixed number of
//! windows, reinforcing (and periodically degrading) a rotating batch of
//! trace ids, collecting one sample per window.

use void_core::{Event, MemoryManager};

use crate::sample::{self, TelemetrySample};

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub iterations: usize,
    pub batch_size: usize,
    pub degrade_interval: usize,
    pub heat_gain: f64,
    pub ttl_boost: i64,
    pub ttl_floor: i64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            batch_size: 4,
            degrade_interval: 7,
            heat_gain: 0.8,
            ttl_boost: 180,
            ttl_floor: 30,
        }
    }
}

pub struct DriveRun {
    pub samples: Vec<TelemetrySample>,
    pub events: Vec<Event>,
}

/// Roll through `config.iterations` windows, each reinforcing a rotating
/// slice of `ids` (wrapping with `(window + offset) % ids.len()`) at a
/// synthetic distance that increases with the offset inside the batch, and
/// degrading that batch every `degrade_interval` windows. Stops immediately
/// if `ids` is empty — there is nothing to drive.
pub fn drive_manager_for_telemetry(
    manager: &MemoryManager,
    ids: &[String],
    config: &DriveConfig,
) -> DriveRun {
    let mut samples = Vec::with_capacity(config.iterations);
    let mut events = Vec::new();

    if ids.is_empty() {
        tracing::debug!("drive requested with no ids, skipping");
        return DriveRun { samples, events };
    }

    tracing::debug!(iterations = config.iterations, batch_size = config.batch_size, "driving manager for telemetry");

    for window in 0..config.iterations {
        let batch: Vec<String> = (0..config.batch_size)
            .map(|offset| ids[(window + offset) % ids.len()].clone())
            .collect();
        let distances: Vec<f64> = (0..config.batch_size)
            .map(|offset| 0.05 + 0.05 * offset as f64)
            .collect();

        let _ = manager.reinforce(&[batch.clone()], &[distances], config.heat_gain, config.ttl_boost);
        if config.degrade_interval > 0 && window % config.degrade_interval == 0 {
            if let Err(err) = manager.degrade(&batch, config.ttl_floor) {
                tracing::warn!(window, %err, "skipping degrade for this window");
            }
        }

        events.extend(manager.consume_events());
        samples.push(sample::collect_sample(manager, window));
    }

    tracing::debug!(windows = samples.len(), "telemetry drive complete");
    DriveRun { samples, events }
}
