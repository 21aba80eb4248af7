//! Territory clustering: assignment, centroid/window bookkeeping, periodic
//! diffusion (merge) and frontier-triggered split (`spec.md` §4.B).
//!
//! These are free functions over `&mut ManagerState` rather than methods on a
//! `Territory` type, since several operations (diffusion, split, pair
//! metrics) need simultaneous mutable access to more than one territory plus
//! the trace table — a borrow a method receiver can't express without an
//! internal `RefCell`, which the rest of the crate avoids.

use blake2::digest::{FixedOutput, KeyInit, Update};
use blake2::Blake2bMac;
use rand::Rng;

use crate::events::EventKind;
use crate::state::{ManagerState, Territory};

type Blake2b16 = Blake2bMac<blake2::digest::consts::U16>;

/// `true` while the manager is still in its warm-up phase, during which every
/// embedded registration gets its own territory rather than joining an
/// existing one (`spec.md` §4.B).
pub(crate) fn warmup_active(state: &ManagerState) -> bool {
    state.nn_distances.len() < 1000 && state.territories.len() < 50
}

pub(crate) fn normalize_embedding(embedding: &[f64]) -> Vec<f64> {
    let norm = embedding.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm <= f64::EPSILON {
        return vec![0.0; embedding.len()];
    }
    embedding.iter().map(|v| v / norm).collect()
}

/// Cosine distance between two (assumed normalized) vectors.
///
/// A mismatched or empty pair is treated as maximal dissimilarity rather
/// than a panic: a public mutator taking caller-supplied embeddings should
/// not crash on malformed input.
pub(crate) fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 1.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (1.0 - dot).clamp(0.0, 2.0)
}

fn hash_key(seed: Option<u64>) -> [u8; 16] {
    let mut key = [0u8; 16];
    if let Some(seed) = seed {
        key[..8].copy_from_slice(&seed.to_le_bytes());
    }
    key
}

/// Deterministic 16-byte keyed digest of `text`, hex-encoded (`spec.md`
/// §4.B step 1).
pub(crate) fn hash_text(text: &str, seed: Option<u64>) -> String {
    let key = hash_key(seed);
    let mut mac = Blake2b16::new_from_slice(&key).expect("16-byte key is valid for Blake2b16");
    Update::update(&mut mac, text.as_bytes());
    let digest = mac.finalize_fixed();
    hex::encode(digest)
}

/// Resolve (or create) the territory for a trace being registered.
/// `embedding`, when given, must already be L2-normalised.
pub(crate) fn assign_territory(
    state: &mut ManagerState,
    text: &str,
    embedding: Option<&[f64]>,
) -> i64 {
    match embedding {
        Some(embedding) => assign_embedded(state, embedding),
        None => deterministic_territory(state, text),
    }
}

/// The embedding path (`spec.md` §4.B step 2): warm-up allocates a fresh
/// territory per call; afterwards a trace joins its nearest centroid when
/// that distance falls within τ, else starts a new territory.
fn assign_embedded(state: &mut ManagerState, embedding: &[f64]) -> i64 {
    if warmup_active(state) {
        return create_territory(state, Some(embedding.to_vec()));
    }

    if let Some((best_id, best_distance)) = nearest_territory(state, embedding) {
        record_nn_distance(state, best_distance);
        if best_distance <= state.territory_tau {
            if let Some(territory) = state.territories.get_mut(&best_id) {
                update_centroid(territory, embedding);
                territory.member_count += 1;
            }
            return best_id;
        }
    }
    create_territory(state, Some(embedding.to_vec()))
}

/// Nearest centroid by cosine distance. Ties go to the first territory
/// encountered in the (insertion-ordered) territory map.
fn nearest_territory(state: &ManagerState, embedding: &[f64]) -> Option<(i64, f64)> {
    let mut best: Option<(i64, f64)> = None;
    for (id, territory) in state.territories.iter() {
        let Some(centroid) = territory.centroid.as_deref() else {
            continue;
        };
        let distance = cosine_distance(embedding, centroid);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((*id, distance)),
        }
    }
    best
}

/// The no-embedding path: a stable hash of the text maps to a territory,
/// reusing one an earlier registration already created for the same text.
pub(crate) fn deterministic_territory(state: &mut ManagerState, text: &str) -> i64 {
    let digest = hash_text(text, state.config.seed);
    if let Some(&id) = state.deterministic_ids.get(&digest) {
        if state.territories.contains_key(&id) {
            if let Some(territory) = state.territories.get_mut(&id) {
                territory.member_count += 1;
            }
            return id;
        }
    }
    let territory_id = create_territory(state, None);
    state.deterministic_ids.insert(digest, territory_id);
    territory_id
}

pub(crate) fn create_territory(state: &mut ManagerState, embedding: Option<Vec<f64>>) -> i64 {
    let id = state.next_territory_id;
    state.next_territory_id += 1;
    state.territories.insert(id, Territory::new(embedding));
    state.record_event(EventKind::TerritoryCreate { id });
    id
}

/// Running-mean centroid blend weighted by the territory's existing member
/// count, renormalised back to unit length.
pub(crate) fn update_centroid(territory: &mut Territory, embedding: &[f64]) {
    match &mut territory.centroid {
        Some(centroid) if centroid.len() == embedding.len() => {
            let n = territory.member_count as f64;
            for (c, e) in centroid.iter_mut().zip(embedding) {
                *c = (*c * n + e) / (n + 1.0);
            }
            let renormalized = normalize_embedding(centroid);
            *centroid = renormalized;
        }
        _ => territory.centroid = Some(normalize_embedding(embedding)),
    }
}

/// Push a distance into the global nearest-centroid window and refresh τ
/// as its clamped median (`spec.md` §3).
pub(crate) fn record_nn_distance(state: &mut ManagerState, distance: f64) {
    state.nn_distances.push(distance);
    if let Some(median) = state.nn_distances.median() {
        state.territory_tau = median.clamp(0.05, 0.6);
    }
}

/// Member-distance windows are only appended during reinforcement — initial
/// assignment only touches the global `nn_distances` window.
pub(crate) fn record_member_distance(state: &mut ManagerState, territory_id: i64, distance: f64) {
    if let Some(territory) = state.territories.get_mut(&territory_id) {
        territory.member_distances.push(distance);
    }
}

/// A trace just left `territory_id` (eviction or prune). Keeps
/// `territory_counts` equal to live membership (`spec.md` §3 invariant 3,
/// §4.C step 2) and drops the territory once it has no members left.
pub(crate) fn release_trace(state: &mut ManagerState, territory_id: i64) {
    let Some(territory) = state.territories.get_mut(&territory_id) else {
        return;
    };
    territory.member_count = territory.member_count.saturating_sub(1);
    if territory.member_count == 0 {
        state.territories.shift_remove(&territory_id);
    }
}

/// Max observed member distance in a territory's window — its radius for
/// diffusion purposes.
fn territory_radius(territory: &Territory) -> f64 {
    territory.member_distances.max()
}

/// Every unordered pair of distinct territory ids among the traces touched by
/// a single reinforcement row (`spec.md` §4.D step 4).
pub(crate) fn update_pair_metrics(state: &mut ManagerState, territory_ids: &[i64]) {
    let mut unique: Vec<i64> = territory_ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    let tick = state.tick;
    let window_capacity = state.config.exploration_churn_window;
    for i in 0..unique.len() {
        for j in (i + 1)..unique.len() {
            let key = (unique[i], unique[j]);
            state
                .pair_churn
                .entry(key)
                .or_insert_with(|| crate::ring::RingBuffer::new(window_capacity))
                .push(tick);
            state.pair_last_tick.insert(key, tick);
        }
    }
}

/// Periodic diffusion pass (`spec.md` §4.B): scan every unordered centroid
/// pair, accept the first merge candidate that draws below
/// `diffusion_kappa`, and stop — at most one merge per pass, so results stay
/// reproducible for a fixed seed and call sequence.
pub(crate) fn maybe_diffuse(state: &mut ManagerState) {
    if state.config.diffusion_interval == 0
        || state.tick % state.config.diffusion_interval as i64 != 0
    {
        return;
    }

    let ids: Vec<i64> = state.territories.keys().copied().collect();
    let tau = state.territory_tau;
    let tau_prime = tau.min(0.6);

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let (a, b) = (ids[i], ids[j]);
            let (Some(ta), Some(tb)) = (state.territories.get(&a), state.territories.get(&b))
            else {
                continue;
            };
            let (Some(ca), Some(cb)) = (ta.centroid.as_deref(), tb.centroid.as_deref()) else {
                continue;
            };
            let d = cosine_distance(ca, cb);
            let r = territory_radius(ta).max(territory_radius(tb));
            let is_candidate = d <= 0.5 * tau
                && r <= 1.25 * tau_prime
                && ta.member_count + tb.member_count < 500;
            if !is_candidate {
                continue;
            }
            if state.rng.gen::<f64>() < state.config.diffusion_kappa {
                merge_territories(state, a, b);
                return;
            }
        }
    }
}

/// Merge the smaller-count territory into the larger, reparenting every
/// trace that belonged to it. A second safety check rejects the merge if
/// the combined membership would exceed 1000.
pub(crate) fn merge_territories(state: &mut ManagerState, a: i64, b: i64) {
    let (Some(ta), Some(tb)) = (
        state.territories.get(&a).cloned(),
        state.territories.get(&b).cloned(),
    ) else {
        return;
    };
    if ta.member_count + tb.member_count > 1000 {
        return;
    }

    let (survivor, absorbed, survivor_territory, absorbed_territory) =
        if ta.member_count >= tb.member_count {
            (a, b, ta, tb)
        } else {
            (b, a, tb, ta)
        };

    let blended_centroid = match (&survivor_territory.centroid, &absorbed_territory.centroid) {
        (Some(sc), Some(ac)) if sc.len() == ac.len() => {
            let total = (survivor_territory.member_count + absorbed_territory.member_count) as f64;
            let blended: Vec<f64> = sc
                .iter()
                .zip(ac)
                .map(|(s, a)| {
                    (s * survivor_territory.member_count as f64
                        + a * absorbed_territory.member_count as f64)
                        / total
                })
                .collect();
            Some(normalize_embedding(&blended))
        }
        (Some(sc), None) => Some(sc.clone()),
        (None, Some(ac)) => Some(ac.clone()),
        _ => None,
    };

    let mut windows: Vec<f64> = survivor_territory.member_distances.to_vec();
    windows.extend(absorbed_territory.member_distances.to_vec());
    let mut merged_window = crate::ring::RingBuffer::new(crate::state::TERRITORY_WINDOW_CAPACITY);
    merged_window.extend_truncating(windows);

    let member_count = survivor_territory.member_count + absorbed_territory.member_count;

    for trace in state.mem.values_mut() {
        if trace.territory_id == Some(absorbed) {
            trace.territory_id = Some(survivor);
        }
    }
    state.deterministic_ids.values_mut().for_each(|id| {
        if *id == absorbed {
            *id = survivor;
        }
    });

    state.territories.insert(
        survivor,
        Territory {
            centroid: blended_centroid,
            member_count,
            member_distances: merged_window,
        },
    );
    state.territories.shift_remove(&absorbed);
    state.merge_counter += 1;
    state.record_event(EventKind::TerritoryMerge {
        from: absorbed,
        to: survivor,
    });
}

/// Frontier-triggered split (`spec.md` §4.B): when a territory's members
/// disagree enough — a strict minority above the novelty median with
/// moderate boredom — peel that subset off into a freshly seeded sibling.
pub(crate) fn maybe_split_territory(state: &mut ManagerState, territory_id: i64) {
    let member_ids: Vec<String> = state
        .mem
        .iter()
        .filter(|(_, trace)| trace.territory_id == Some(territory_id))
        .map(|(id, _)| id.clone())
        .collect();
    if member_ids.len() < 6 {
        return;
    }

    let mut novelties: Vec<f64> = member_ids
        .iter()
        .filter_map(|id| state.mem.get(id))
        .map(|t| t.novelty)
        .collect();
    novelties.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = novelties[novelties.len() / 2];

    let candidates: Vec<String> = member_ids
        .iter()
        .filter(|id| {
            state
                .mem
                .get(*id)
                .map(|t| t.novelty > median && t.boredom < 0.7)
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    if candidates.len() < 2 || candidates.len() >= member_ids.len() {
        return;
    }

    let seed_embedding = state
        .mem
        .get(&candidates[0])
        .and_then(|t| t.embedding.clone());
    let new_territory = create_territory(state, seed_embedding.clone());

    let candidate_embeddings: Vec<Vec<f64>> = candidates
        .iter()
        .filter_map(|id| state.mem.get(id).and_then(|t| t.embedding.clone()))
        .collect();
    if let Some(territory) = state.territories.get_mut(&new_territory) {
        if candidate_embeddings.is_empty() {
            territory.centroid = seed_embedding;
        } else {
            let dims = candidate_embeddings[0].len();
            let mut averaged = vec![0.0; dims];
            for embedding in &candidate_embeddings {
                if embedding.len() == dims {
                    for (acc, v) in averaged.iter_mut().zip(embedding) {
                        *acc += v;
                    }
                }
            }
            let n = candidate_embeddings.len() as f64;
            for v in &mut averaged {
                *v /= n;
            }
            territory.centroid = Some(normalize_embedding(&averaged));
        }
    }

    let moved = candidates.len();
    for id in &candidates {
        if let Some(trace) = state.mem.get_mut(id) {
            trace.territory_id = Some(new_territory);
        }
    }
    if let Some(parent) = state.territories.get_mut(&territory_id) {
        parent.member_count = parent.member_count.saturating_sub(moved);
    }
    if let Some(child) = state.territories.get_mut(&new_territory) {
        child.member_count = moved;
    }
    state.split_counter += 1;
    state.record_event(EventKind::TerritorySplit {
        from: territory_id,
        to: new_territory,
        count: moved,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::state::ManagerState;

    fn state_with_seed(seed: u64) -> ManagerState {
        ManagerState::new(ManagerConfig::default(), crate::rng::build(Some(seed)))
    }

    #[test]
    fn identical_text_without_embedding_reuses_territory() {
        let mut state = state_with_seed(7);
        let first = deterministic_territory(&mut state, "hello world");
        let second = deterministic_territory(&mut state, "hello world");
        assert_eq!(first, second);
    }

    #[test]
    fn different_text_creates_distinct_territories() {
        let mut state = state_with_seed(7);
        let first = deterministic_territory(&mut state, "alpha");
        let second = deterministic_territory(&mut state, "beta");
        assert_ne!(first, second);
    }

    #[test]
    fn cosine_distance_handles_mismatched_lengths_without_panicking() {
        assert_eq!(cosine_distance(&[1.0, 0.0], &[1.0]), 1.0);
        assert_eq!(cosine_distance(&[], &[]), 1.0);
    }

    #[test]
    fn cosine_distance_of_identical_normalized_vectors_is_zero() {
        let v = normalize_embedding(&[3.0, 4.0]);
        assert!(cosine_distance(&v, &v) < 1e-9);
    }

    #[test]
    fn warmup_allocates_new_territory_per_embedded_registration() {
        let mut state = state_with_seed(7);
        let a = assign_embedded(&mut state, &[1.0, 0.0]);
        let b = assign_embedded(&mut state, &[0.0, 1.0]);
        assert_ne!(a, b);
    }

    #[test]
    fn tau_stays_within_its_declared_bounds() {
        let mut state = state_with_seed(7);
        for i in 0..200 {
            record_nn_distance(&mut state, (i as f64 * 0.01).min(1.0));
        }
        assert!(state.territory_tau >= 0.05 && state.territory_tau <= 0.6);
    }
}
