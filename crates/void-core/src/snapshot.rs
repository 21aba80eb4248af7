//! Deterministic snapshot persistence (`spec.md` §4.G, §6).
//!
//! The on-disk shape is a plain JSON object with the exact key set the
//! spec's snapshot table names — `mem`, `territory_centroids`, `pair_churn`,
//! and so on — rather than a shape that merely happens to round-trip, since
//! external tooling built against the original format expects those keys.
//! Loading walks the raw JSON by hand and skips any entry that doesn't
//! parse, rather than failing the whole load on one bad field — a snapshot
//! is a cache, not a source of truth, so a partially corrupt file should
//! still come back with whatever is salvageable.

use std::io;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::config::ManagerConfig;
use crate::state::{FrontierEntry, ManagerState, Territory};
use crate::trace::MemoryTrace;

const SNAPSHOT_VERSION: u64 = 1;

/// A snapshot is exposed as a raw JSON value: the spec defines it by its key
/// set, not by a Rust type, and every consumer (CLI, probe, external
/// tooling) reads it as JSON anyway.
#[derive(Debug, Clone)]
pub struct Snapshot(pub Value);

pub(crate) fn to_snapshot(state: &ManagerState) -> Snapshot {
    let mem: Map<String, Value> = state
        .mem
        .iter()
        .map(|(id, trace)| (id.clone(), serde_json::to_value(trace).unwrap_or(Value::Null)))
        .collect();

    let engrams: Map<String, Value> = state
        .engrams
        .iter()
        .map(|(id, members)| (id.clone(), json!(members)))
        .collect();

    let frontier: Map<String, Value> = state
        .frontier
        .iter()
        .map(|(id, entry)| {
            (
                id.clone(),
                json!({
                    "territory_id": entry.territory_id,
                    "hits": entry.hits,
                    "novelty": entry.novelty,
                }),
            )
        })
        .collect();

    let territory_centroids: Map<String, Value> = state
        .territories
        .iter()
        .map(|(id, territory)| (id.to_string(), json!(territory.centroid)))
        .collect();
    let territory_counts: Map<String, Value> = state
        .territories
        .iter()
        .map(|(id, territory)| (id.to_string(), json!(territory.member_count)))
        .collect();
    let territory_member_dists: Map<String, Value> = state
        .territories
        .iter()
        .map(|(id, territory)| (id.to_string(), json!(territory.member_distances.to_vec())))
        .collect();

    let pair_churn: Map<String, Value> = state
        .pair_churn
        .iter()
        .map(|((a, b), ticks)| (format!("{a}:{b}"), json!(ticks.to_vec())))
        .collect();
    let pair_last: Map<String, Value> = state
        .pair_last_tick
        .iter()
        .map(|((a, b), tick)| (format!("{a}:{b}"), json!(tick)))
        .collect();

    Snapshot(json!({
        "version": SNAPSHOT_VERSION,
        "tick": state.tick,
        "mem": mem,
        "engrams": engrams,
        "frontier": frontier,
        "next_territory": state.next_territory_id,
        "reward_ema": state.reward_ema,
        "pair_churn": pair_churn,
        "pair_last": pair_last,
        "territory_centroids": territory_centroids,
        "territory_counts": territory_counts,
        "territory_member_dists": territory_member_dists,
        "nn_distances": state.nn_distances.to_vec(),
        "territory_tau": state.territory_tau,
        "split_counter": state.split_counter,
        "merge_counter": state.merge_counter,
        "config": state.config,
    }))
}

/// Rebuild a [`ManagerState`] from a raw JSON value, skipping malformed
/// entries rather than failing the whole load.
pub(crate) fn from_snapshot_value(value: &Value, rng: rand_chacha::ChaCha8Rng) -> ManagerState {
    let config = ManagerConfig::from_snapshot_value(value.get("config"));
    let mut state = ManagerState::new(config, rng);

    state.tick = value.get("tick").and_then(Value::as_i64).unwrap_or(0);
    state.territory_tau = value
        .get("territory_tau")
        .and_then(Value::as_f64)
        .unwrap_or(0.35);
    state.reward_ema = value.get("reward_ema").and_then(Value::as_f64).unwrap_or(0.0);
    state.next_territory_id = value
        .get("next_territory")
        .and_then(Value::as_i64)
        .unwrap_or(10000);
    state.split_counter = value.get("split_counter").and_then(Value::as_u64).unwrap_or(0);
    state.merge_counter = value.get("merge_counter").and_then(Value::as_u64).unwrap_or(0);

    if let Some(Value::Array(distances)) = value.get("nn_distances") {
        for d in distances.iter().filter_map(Value::as_f64) {
            state.nn_distances.push(d);
        }
    }

    let counts = value.get("territory_counts").and_then(Value::as_object);
    let member_dists = value.get("territory_member_dists").and_then(Value::as_object);
    if let Some(Value::Object(centroids)) = value.get("territory_centroids") {
        for (key, centroid_value) in centroids {
            let Ok(id) = key.parse::<i64>() else {
                tracing::warn!(key, "skipping territory with non-integer id in snapshot");
                continue;
            };
            let centroid = match centroid_value {
                Value::Array(items) => match items.iter().map(Value::as_f64).collect::<Option<Vec<f64>>>() {
                    Some(v) => Some(v),
                    None => {
                        tracing::warn!(key, "skipping territory with malformed centroid");
                        continue;
                    }
                },
                Value::Null => None,
                _ => {
                    tracing::warn!(key, "skipping territory with malformed centroid");
                    continue;
                }
            };
            let member_count = counts
                .and_then(|c| c.get(key))
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize;
            let mut territory = Territory::new(centroid);
            territory.member_count = member_count;
            if let Some(Value::Array(dists)) = member_dists.and_then(|m| m.get(key)) {
                for d in dists.iter().filter_map(Value::as_f64) {
                    territory.member_distances.push(d);
                }
            }
            state.territories.insert(id, territory);
        }
    }

    if let Some(Value::Object(mem)) = value.get("mem") {
        for (id, entry) in mem {
            match serde_json::from_value::<MemoryTrace>(entry.clone()) {
                Ok(trace) => {
                    state.mem.insert(id.clone(), trace);
                }
                Err(err) => tracing::warn!(id, %err, "skipping malformed trace entry in snapshot"),
            }
        }
    }

    if let Some(Value::Object(engrams)) = value.get("engrams") {
        for (id, members) in engrams {
            if let Some(members) = members
                .as_array()
                .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            {
                state.engrams.insert(id.clone(), members);
            }
        }
    }

    if let Some(Value::Object(frontier)) = value.get("frontier") {
        for (id, entry) in frontier {
            let territory_id = entry.get("territory_id").and_then(Value::as_i64);
            let hits = entry.get("hits").and_then(Value::as_u64);
            let novelty = entry.get("novelty").and_then(Value::as_f64);
            if let (Some(territory_id), Some(hits), Some(novelty)) = (territory_id, hits, novelty) {
                state.frontier.insert(
                    id.clone(),
                    FrontierEntry {
                        territory_id,
                        hits: hits as u32,
                        novelty,
                    },
                );
            }
        }
    }

    if let Some(Value::Object(pair_churn)) = value.get("pair_churn") {
        for (key, ticks) in pair_churn {
            let Some(pair) = parse_pair_key(key) else { continue };
            let Some(ticks) = ticks.as_array() else { continue };
            let window = state.config.exploration_churn_window;
            let mut buf = crate::ring::RingBuffer::new(window);
            for t in ticks.iter().filter_map(Value::as_i64) {
                buf.push(t);
            }
            state.pair_churn.insert(pair, buf);
        }
    }
    if let Some(Value::Object(pair_last)) = value.get("pair_last") {
        for (key, tick) in pair_last {
            if let (Some(pair), Some(tick)) = (parse_pair_key(key), tick.as_i64()) {
                state.pair_last_tick.insert(pair, tick);
            }
        }
    }

    state
}

fn parse_pair_key(key: &str) -> Option<(i64, i64)> {
    let (a, b) = key.split_once(':')?;
    Some((a.parse().ok()?, b.parse().ok()?))
}

pub(crate) fn save_json(snapshot: &Snapshot, path: &Path) -> io::Result<()> {
    let payload = serde_json::to_vec_pretty(&snapshot.0)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    std::fs::write(path, payload)
}

pub(crate) fn load_json(path: &Path) -> io::Result<Value> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}
