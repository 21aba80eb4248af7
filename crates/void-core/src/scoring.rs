//! Composite scoring, ranked retrieval, and the aggregate stats snapshot
//! (`spec.md` §4.H).

use serde::Serialize;

use crate::state::ManagerState;
use crate::trace::MemoryTrace;

/// `confidence·(1 − boredom_weight) + novelty·boredom_weight + 0.1·heat +
/// recency`, floored at zero, where `recency = exp(−ln2·Δt /
/// max(1, recency_half_life_ticks))` (`spec.md` §4.H).
pub(crate) fn composite_score_at(trace: &MemoryTrace, tick: i64, config: &crate::config::ManagerConfig) -> f64 {
    let delta_t = (tick - trace.last_touch_tick).max(0) as f64;
    let half_life = config.recency_half_life_ticks.max(1) as f64;
    let recency = (-std::f64::consts::LN_2 * delta_t / half_life).exp();
    let score = trace.confidence * (1.0 - config.boredom_weight)
        + trace.novelty * config.boredom_weight
        + 0.1 * trace.heat
        + recency;
    score.max(0.0)
}

pub(crate) fn composite_score(state: &ManagerState, trace: &MemoryTrace) -> f64 {
    composite_score_at(trace, state.tick, &state.config)
}

/// `clamp01(novelty·(1 − boredom))` (`spec.md` §4.H).
pub(crate) fn exploratory_weight(trace: &MemoryTrace) -> f64 {
    (trace.novelty * (1.0 - trace.boredom)).clamp(0.0, 1.0)
}

/// Top `k` traces by composite score, clamped to `[1, 100]`, most relevant
/// first (`spec.md` §4.H).
pub(crate) fn top(state: &ManagerState, k: usize) -> Vec<(String, f64)> {
    let k = k.clamp(1, 100);
    let mut scored: Vec<(String, f64)> = state
        .mem
        .iter()
        .map(|(id, trace)| (id.clone(), composite_score(state, trace)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    pub tick: i64,
    pub count: usize,
    pub territory_count: usize,
    pub reward_ema: f64,
    pub frontier_size: usize,
    pub pending_condense: usize,
    pub average_heat: f64,
    pub avg_confidence: f64,
    pub avg_novelty: f64,
    pub avg_boredom: f64,
    pub avg_mass: f64,
    pub max_territory_span: usize,
}

/// Aggregate stats over every trace; the empty-store case returns zeros
/// (`spec.md` §4.H).
pub(crate) fn stats(state: &ManagerState) -> ManagerStats {
    let count = state.mem.len();
    let (avg_confidence, avg_novelty, avg_boredom, avg_mass, average_heat) = if count == 0 {
        (0.0, 0.0, 0.0, 0.0, 0.0)
    } else {
        let n = count as f64;
        let mut confidence = 0.0;
        let mut novelty = 0.0;
        let mut boredom = 0.0;
        let mut mass = 0.0;
        let mut heat = 0.0;
        for trace in state.mem.values() {
            confidence += trace.confidence;
            novelty += trace.novelty;
            boredom += trace.boredom;
            mass += trace.mass;
            heat += trace.heat;
        }
        (confidence / n, novelty / n, boredom / n, mass / n, heat / n)
    };
    let max_territory_span = state
        .territories
        .values()
        .map(|t| t.member_count)
        .max()
        .unwrap_or(0);

    ManagerStats {
        tick: state.tick,
        count,
        territory_count: state.territories.len(),
        reward_ema: state.reward_ema,
        frontier_size: state.frontier.len(),
        pending_condense: state.pending_condense.len(),
        average_heat,
        avg_confidence,
        avg_novelty,
        avg_boredom,
        avg_mass,
        max_territory_span,
    }
}
