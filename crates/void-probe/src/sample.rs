//! A single point-in-time reading of a manager's health (`spec.md` §6).

use serde::{Deserialize, Serialize};
use void_core::MemoryManager;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub window: usize,
    pub tick: i64,
    pub count: usize,
    pub territory_count: usize,
    pub reward_ema: f64,
    pub average_heat: f64,
    pub max_territory_span: usize,
    pub frontier_size: usize,
    pub pending_condense: usize,
}

/// Read the manager's current stats into a labeled sample.
pub fn collect_sample(manager: &MemoryManager, window: usize) -> TelemetrySample {
    let stats = manager.stats();
    TelemetrySample {
        window,
        tick: stats.tick,
        count: stats.count,
        territory_count: stats.territory_count,
        reward_ema: stats.reward_ema,
        average_heat: stats.average_heat,
        max_territory_span: stats.max_territory_span,
        frontier_size: stats.frontier_size,
        pending_condense: stats.pending_condense,
    }
}
