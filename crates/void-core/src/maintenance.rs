//! Maintenance cadence: exponential decay, capacity-triggered pruning, and
//! the periodic diffusion dispatch, run after every `register_chunks` and
//! `reinforce` call (never after `degrade`) — `spec.md` §4.C.

use rand::seq::SliceRandom;

use crate::events::EventKind;
use crate::state::ManagerState;
use crate::territory;

/// Runs the whole maintenance cadence for the current tick: decay, prune if
/// over capacity, then diffusion. Called with the lock already held.
pub(crate) fn after_operation(state: &mut ManagerState) {
    state.tick += 1;
    decay_pass(state);
    prune_if_needed(state);
    territory::maybe_diffuse(state);
}

/// `heat *= 0.5^(1/decay_half_life)`, `ttl -= 1`, `inhibition *= 0.98`
/// (`spec.md` §4.C). A trace is evicted once its ttl reaches zero and its
/// confidence and mass are both still low, rather than waiting for the next
/// prune pass.
fn decay_pass(state: &mut ManagerState) {
    let half_life = state.config.decay_half_life as f64;
    let decay_factor = 0.5f64.powf(1.0 / half_life.max(1.0));

    let mut expired = Vec::new();
    for (id, trace) in state.mem.iter_mut() {
        trace.heat *= decay_factor;
        trace.ttl -= 1;
        trace.inhibition *= 0.98;
        trace.clamp();
        if trace.ttl <= 0 && trace.confidence < 0.05 && trace.mass < 3.0 {
            expired.push(id.clone());
        }
    }

    for id in expired {
        evict(state, &id);
    }
}

/// Target eviction count: `max(1, min(|mem| - capacity, floor(max(1, |mem| *
/// prune_target_ratio - capacity))))`. Up to `prune_sample` ids are drawn by
/// a seeded shuffle of every id currently in the store, ranked ascending by
/// composite score, and the lowest-scoring `target` of that sample are
/// evicted (`spec.md` §4.C).
fn prune_if_needed(state: &mut ManagerState) {
    let count = state.mem.len();
    if count <= state.config.capacity {
        return;
    }

    let capacity = state.config.capacity as f64;
    let target = 1usize.max(
        (count - state.config.capacity).min(
            1usize.max((count as f64 * state.config.prune_target_ratio - capacity).floor().max(1.0) as usize),
        ),
    );

    let mut ids: Vec<String> = state.mem.keys().cloned().collect();
    ids.shuffle(&mut state.rng);
    ids.truncate(state.config.prune_sample.min(ids.len()));

    let mut candidates: Vec<(String, f64)> = ids
        .into_iter()
        .map(|id| {
            let score = state
                .mem
                .get(&id)
                .map(|trace| crate::scoring::composite_score(state, trace))
                .unwrap_or(0.0);
            (id, score)
        })
        .collect();
    candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let evict_count = target.min(candidates.len());
    let mut pruned = 0;
    for (id, _) in candidates.into_iter().take(evict_count) {
        if let Some(trace) = state.mem.shift_remove(&id) {
            state.frontier.shift_remove(&id);
            state.pending_condense.retain(|queued| queued != &id);
            if let Some(territory_id) = trace.territory_id {
                territory::release_trace(state, territory_id);
            }
            pruned += 1;
        }
    }

    if pruned > 0 {
        state.record_event(EventKind::Prune { count: pruned });
    }
}

fn evict(state: &mut ManagerState, id: &str) {
    if let Some(trace) = state.mem.shift_remove(id) {
        state.frontier.shift_remove(id);
        state.pending_condense.retain(|queued| queued != id);
        if let Some(territory_id) = trace.territory_id {
            territory::release_trace(state, territory_id);
        }
        state.record_event(EventKind::Evict { id: id.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::state::ManagerState;
    use crate::trace::MemoryTrace;

    fn seeded_state(capacity: usize) -> ManagerState {
        let config = ManagerConfig {
            capacity,
            prune_sample: 16,
            ..ManagerConfig::default()
        };
        ManagerState::new(config, crate::rng::build(Some(7)))
    }

    #[test]
    fn decay_pass_evicts_a_low_confidence_low_mass_trace_once_ttl_hits_zero() {
        let mut state = seeded_state(64);
        let mut trace = MemoryTrace::new("a".into(), "x".into(), None, None, 0, 1);
        trace.ttl = 1;
        trace.confidence = 0.0;
        trace.mass = 0.0;
        state.mem.insert("a".to_string(), trace);

        decay_pass(&mut state);

        assert!(!state.mem.contains_key("a"));
    }

    #[test]
    fn decay_pass_keeps_a_trace_with_zero_ttl_but_high_confidence() {
        let mut state = seeded_state(64);
        let mut trace = MemoryTrace::new("a".into(), "x".into(), None, None, 0, 1);
        trace.ttl = 1;
        trace.confidence = 0.9;
        state.mem.insert("a".to_string(), trace);

        decay_pass(&mut state);

        assert!(state.mem.contains_key("a"));
        assert_eq!(state.mem.get("a").unwrap().ttl, 0);
    }

    #[test]
    fn prune_does_nothing_under_capacity() {
        let mut state = seeded_state(64);
        state.mem.insert(
            "a".to_string(),
            MemoryTrace::new("a".into(), "x".into(), None, None, 0, 120),
        );
        prune_if_needed(&mut state);
        assert!(state.mem.contains_key("a"));
    }

    #[test]
    fn prune_evicts_down_toward_target_ratio_when_over_capacity() {
        let mut state = seeded_state(10);
        for i in 0..20 {
            state.mem.insert(
                format!("t{i}"),
                MemoryTrace::new(format!("t{i}"), "x".into(), None, None, 0, 120),
            );
        }
        prune_if_needed(&mut state);
        assert!(state.mem.len() < 20);
    }
}
