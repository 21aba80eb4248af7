//! Reinforcement and degradation: the two mutators that move a trace's
//! learning signals and, on the reinforcement path, drive territory
//! clustering and condensation eligibility (`spec.md` §4.D, §4.E).

use crate::events::EventKind;
use crate::state::{FrontierEntry, ManagerState};
use crate::territory;

/// Apply every row of a reinforcement batch in order (`spec.md` §4.D). Each
/// row is a set of trace ids observed together, paired with each trace's
/// distance from its territory's centroid at observation time; `heat_gain`
/// and `ttl_boost` are shared by every row in the call.
pub(crate) fn reinforce(
    state: &mut ManagerState,
    rows: &[(Vec<String>, Vec<f64>)],
    heat_gain: f64,
    ttl_boost: i64,
) {
    for (ids, distances) in rows {
        reinforce_row(state, ids, distances, heat_gain, ttl_boost);
    }
}

/// Apply a single reinforcement row (`spec.md` §4.D steps 1-9).
pub(crate) fn reinforce_row(
    state: &mut ManagerState,
    ids: &[String],
    distances: &[f64],
    heat_gain: f64,
    ttl_boost: i64,
) {
    let resolved: Vec<(String, f64)> = ids
        .iter()
        .zip(distances)
        .filter(|(id, _)| state.mem.contains_key(*id))
        .map(|(id, &distance)| (id.clone(), distance))
        .collect();
    if resolved.is_empty() {
        return;
    }

    let sims: Vec<f64> = resolved
        .iter()
        .map(|(_, distance)| (1.0 - distance).max(0.0))
        .collect();

    // Step 3: inhibition bump applies to every resolved trace before any
    // other field mutates.
    for (id, _) in &resolved {
        if let Some(trace) = state.mem.get_mut(id) {
            trace.inhibition = (trace.inhibition + 0.05).min(1.0);
        }
    }

    // Step 4: pair-churn metrics over the distinct territories touched.
    let touched_territories: Vec<i64> = resolved
        .iter()
        .filter_map(|(id, _)| state.mem.get(id).and_then(|t| t.territory_id))
        .collect();
    territory::update_pair_metrics(state, &touched_territories);

    // Step 5: reward EMA, smoothing factor 0.05.
    let mean_sim = sims.iter().sum::<f64>() / sims.len() as f64;
    state.reward_ema = 0.95 * state.reward_ema + 0.05 * mean_sim;

    let tick = state.tick;
    let habituation_start = state.config.habituation_start;
    let habituation_scale = state.config.habituation_scale;

    for (id, sim) in resolved.iter().zip(sims.iter().copied()) {
        let territory_id = state.mem.get(id).and_then(|t| t.territory_id);
        let has_embedding = state
            .mem
            .get(id)
            .map(|t| t.embedding.is_some())
            .unwrap_or(false);

        if let Some(trace) = state.mem.get_mut(id) {
            trace.last_touch_tick = tick;
            trace.use_count += 1;
            trace.heat += heat_gain;
            trace.mass += sim * (1.0 + heat_gain);

            let delta_boredom = if trace.use_count as i64 <= habituation_start {
                0.02
            } else {
                (trace.use_count as f64 / habituation_scale.max(trace.use_count as f64) * 0.05)
                    .min(0.2)
            };
            trace.boredom = (trace.boredom + delta_boredom).clamp(0.0, 1.0);

            trace.confidence = (trace.confidence + (1.0 - trace.confidence) * sim * 0.3)
                .clamp(0.0, 1.0);
            trace.novelty = (0.9 * trace.novelty + 0.1 * (1.0 - sim)).clamp(0.0, 1.0);

            trace.ttl = trace.ttl.max(ttl_boost.max(0));
            trace.clamp();
        }

        if has_embedding {
            if let Some(territory_id) = territory_id {
                territory::record_member_distance(state, territory_id, 1.0 - sim);
                territory::record_nn_distance(state, 1.0 - sim);
            }
        }

        update_frontier(state, id);
        maybe_enqueue_condensation(state, id);
    }

    state.record_event(EventKind::Reinforce {
        count: resolved.len(),
    });
}

/// Inverse of reinforcement (`spec.md` §4.E). Never advances the tick and
/// never triggers maintenance.
pub(crate) fn degrade(state: &mut ManagerState, ids: &[String], ttl_floor: i64) {
    let mut count = 0;
    for id in ids {
        if let Some(trace) = state.mem.get_mut(id) {
            trace.ttl = trace.ttl.min(ttl_floor);
            trace.boredom = (trace.boredom + 0.1).min(1.0);
            trace.clamp();
            count += 1;
        }
    }
    state.record_event(EventKind::Degrade { count });
}

/// Frontier accounting (`spec.md` §4.D step 7): a trace sustaining high
/// novelty while boredom stays moderate accrues hits; at `frontier_patience`
/// it triggers a territory split and resets.
fn update_frontier(state: &mut ManagerState, id: &str) {
    let Some(trace) = state.mem.get(id) else {
        return;
    };
    let novelty = trace.novelty;
    let boredom = trace.boredom;
    let territory_id = trace.territory_id;

    let sustained = novelty >= state.config.frontier_novelty_threshold && boredom < 0.5;
    if sustained {
        let hits = {
            let entry = state.frontier.entry(id.to_string()).or_insert(FrontierEntry {
                territory_id: territory_id.unwrap_or(0),
                hits: 0,
                novelty,
            });
            entry.hits += 1;
            entry.novelty = novelty;
            entry.territory_id = territory_id.unwrap_or(entry.territory_id);
            entry.hits
        };
        if let Some(trace) = state.mem.get_mut(id) {
            trace.frontier_hits = hits;
        }
        if hits >= state.config.frontier_patience {
            if let Some(territory_id) = territory_id {
                territory::maybe_split_territory(state, territory_id);
            }
            state.frontier.shift_remove(id);
            if let Some(trace) = state.mem.get_mut(id) {
                trace.frontier_hits = 0;
            }
        }
    } else {
        state.frontier.shift_remove(id);
        if let Some(trace) = state.mem.get_mut(id) {
            trace.frontier_hits = 0;
        }
    }
}

/// Condensation eligibility check (`spec.md` §4.D step 8).
fn maybe_enqueue_condensation(state: &mut ManagerState, id: &str) {
    let Some(trace) = state.mem.get(id) else {
        return;
    };
    let eligible = trace.boredom >= state.config.condensation_boredom
        && trace.confidence >= state.config.condensation_conf
        && trace.mass >= state.config.condensation_mass;
    if eligible && !trace.pending_condense {
        state.pending_condense.push(id.to_string());
        if let Some(trace) = state.mem.get_mut(id) {
            trace.pending_condense = true;
        }
    }
}
