//! The public [`MemoryManager`] API: a thin, lock-guarded wrapper over
//! [`crate::state::ManagerState`] (`spec.md` §6).
//!
//! `thread_safe` is validated and echoed in the config but does not change
//! how the state is guarded: a `Mutex` is used unconditionally. An enum over
//! `RefCell`-backed and `Mutex`-backed variants would make `MemoryManager`'s
//! `Sync`-ness depend on a runtime value, which Rust's auto-trait rules
//! don't allow — the type is either `Sync` or it isn't, for every instance.
//! An uncontended `Mutex` lock is cheap enough that paying for one even in
//! single-threaded use costs nothing worth avoiding.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::condensation;
use crate::config::ManagerConfig;
use crate::error::{ConfigError, Result, VoidError};
use crate::events::{Event, EventKind};
use crate::maintenance;
use crate::reinforce;
use crate::rng;
use crate::scoring::{self, ManagerStats};
use crate::snapshot::{self, Snapshot};
use crate::state::{CondenseCallback, ManagerState};
use crate::territory;

/// Callback invoked after condensation drains a batch of source ids.
/// Returning `Some((id, text))` re-ingests the summary through the normal
/// registration path; returning `None` discards the batch. The callback
/// runs outside the lock, so it may safely call back into the same manager.
pub type CondenseFn = dyn Fn(&[String]) -> Option<(String, String)> + Send + Sync;

pub struct MemoryManager {
    state: Mutex<ManagerState>,
}

impl MemoryManager {
    pub fn new(config: ManagerConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let rng = rng::build(config.seed);
        Ok(Self {
            state: Mutex::new(ManagerState::new(config, rng)),
        })
    }

    /// Register a batch of chunks (`spec.md` §4.A, §6). `embeddings` and
    /// `metadata`, when given, must each have one entry per id (an entry may
    /// itself be `None` for a trace that opts out within an otherwise
    /// embedded/annotated batch).
    pub fn register_chunks(
        &self,
        ids: &[String],
        texts: &[String],
        embeddings: Option<&[Option<Vec<f64>>]>,
        metadata: Option<&[Option<HashMap<String, serde_json::Value>>]>,
    ) -> Result<()> {
        if ids.len() != texts.len() {
            return Err(VoidError::LengthMismatch {
                what: "register_chunks: ids vs texts",
                expected: ids.len(),
                actual: texts.len(),
            });
        }
        if let Some(embeddings) = embeddings {
            if embeddings.len() != ids.len() {
                return Err(VoidError::LengthMismatch {
                    what: "register_chunks: ids vs embeddings",
                    expected: ids.len(),
                    actual: embeddings.len(),
                });
            }
        }
        if let Some(metadata) = metadata {
            if metadata.len() != ids.len() {
                return Err(VoidError::LengthMismatch {
                    what: "register_chunks: ids vs metadata",
                    expected: ids.len(),
                    actual: metadata.len(),
                });
            }
        }

        let (pairs, callback) = self.register_internal(ids, texts, embeddings, metadata);
        self.dispatch_condensation(pairs, callback);
        Ok(())
    }

    /// Apply every row of a reinforcement batch (`spec.md` §4.D, §6).
    /// `results.ids[i]`/`results.distances[i]` must align per row.
    pub fn reinforce(&self, ids: &[Vec<String>], distances: &[Vec<f64>], heat_gain: f64, ttl_boost: i64) -> Result<()> {
        if ids.len() != distances.len() {
            return Err(VoidError::LengthMismatch {
                what: "reinforce: ids rows vs distances rows",
                expected: ids.len(),
                actual: distances.len(),
            });
        }
        for (row, (row_ids, row_distances)) in ids.iter().zip(distances).enumerate() {
            if row_ids.len() != row_distances.len() {
                return Err(VoidError::RowLengthMismatch {
                    row,
                    ids_len: row_ids.len(),
                    distances_len: row_distances.len(),
                });
            }
        }

        let rows: Vec<(Vec<String>, Vec<f64>)> = ids.iter().cloned().zip(distances.iter().cloned()).collect();

        let (pairs, callback) = {
            let mut state = self.lock();
            reinforce::reinforce(&mut state, &rows, heat_gain, ttl_boost);
            maintenance::after_operation(&mut state);
            condensation::drain(&mut state)
        };

        self.dispatch_condensation(pairs, callback);
        Ok(())
    }

    /// Inverse of `reinforce` (`spec.md` §4.E). Never advances the tick and
    /// never triggers maintenance.
    pub fn degrade(&self, ids: &[String], ttl_floor: i64) -> Result<()> {
        if ttl_floor < 1 {
            return Err(VoidError::InvalidTtlFloor { ttl_floor });
        }
        let mut state = self.lock();
        reinforce::degrade(&mut state, ids, ttl_floor);
        Ok(())
    }

    /// Explicitly register a pre-condensed engram over existing members
    /// (`spec.md` §4.I) — distinct from the automatic condensation hand-off:
    /// this never creates a trace. Filters `member_ids` down to ids still
    /// present; if fewer than two survive, no mutation happens and this
    /// returns `false`.
    pub fn register_engram(&self, summary_id: &str, member_ids: &[String], text: &str) -> bool {
        let mut state = self.lock();
        let survivors: Vec<String> = member_ids
            .iter()
            .filter(|id| state.mem.contains_key(*id))
            .cloned()
            .collect();
        if survivors.len() < 2 {
            return false;
        }
        let _ = text;
        for id in &survivors {
            if let Some(trace) = state.mem.get_mut(id) {
                trace.boredom = (trace.boredom + 0.05).min(1.0);
                trace.inhibition = (trace.inhibition + 0.05).min(1.0);
                trace.clamp();
            }
        }
        state.engrams.insert(summary_id.to_string(), survivors.clone());
        state.record_event(EventKind::Engram {
            id: summary_id.to_string(),
            members: survivors,
        });
        true
    }

    /// Top `k` traces by composite score, most relevant first.
    pub fn top(&self, k: usize) -> Vec<(String, f64)> {
        let state = self.lock();
        scoring::top(&state, k)
    }

    pub fn composite_score_for(&self, id: &str) -> Option<f64> {
        let state = self.lock();
        state.mem.get(id).map(|trace| scoring::composite_score(&state, trace))
    }

    pub fn exploratory_weight_for(&self, id: &str) -> Option<f64> {
        let state = self.lock();
        state.mem.get(id).map(scoring::exploratory_weight)
    }

    pub fn stats(&self) -> ManagerStats {
        let state = self.lock();
        scoring::stats(&state)
    }

    /// Drain and return every event recorded since the last call.
    pub fn consume_events(&self) -> Vec<Event> {
        let mut state = self.lock();
        let drained = state.events.to_vec();
        state.events.clear();
        drained
    }

    /// Inspect the oldest `k` events without draining them (`spec.md` §4.G).
    pub fn peek_events(&self, k: usize) -> Vec<Event> {
        let state = self.lock();
        state.events.iter().take(k).cloned().collect()
    }

    pub fn set_condense_callback(&self, callback: Option<Arc<CondenseFn>>) {
        let mut state = self.lock();
        state.condense_callback = callback;
    }

    pub fn to_snapshot(&self) -> Snapshot {
        let state = self.lock();
        snapshot::to_snapshot(&state)
    }

    pub fn from_snapshot(value: &serde_json::Value) -> Self {
        let seed = value
            .get("config")
            .and_then(|c| c.get("seed"))
            .and_then(serde_json::Value::as_u64);
        let rng = rng::build(seed);
        Self {
            state: Mutex::new(snapshot::from_snapshot_value(value, rng)),
        }
    }

    pub fn save_json(&self, path: &Path) -> std::io::Result<()> {
        let snapshot = self.to_snapshot();
        snapshot::save_json(&snapshot, path)
    }

    pub fn load_json(path: &Path) -> std::io::Result<Self> {
        let value = snapshot::load_json(path)?;
        Ok(Self::from_snapshot(&value))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Shared body of `register_chunks` and the condensation re-ingest path:
    /// assign territories, insert traces, emit `register` events, run
    /// maintenance, and drain whatever condensation newly became eligible.
    fn register_internal(
        &self,
        ids: &[String],
        texts: &[String],
        embeddings: Option<&[Option<Vec<f64>>]>,
        metadata: Option<&[Option<HashMap<String, serde_json::Value>>]>,
    ) -> (Vec<(String, String)>, Option<Arc<CondenseCallback>>) {
        let mut state = self.lock();
        for (i, id) in ids.iter().enumerate() {
            let text = &texts[i];
            let embedding = embeddings.and_then(|e| e[i].as_ref()).map(|e| territory::normalize_embedding(e));
            let meta = metadata.and_then(|m| m[i].clone());
            let territory_id = territory::assign_territory(&mut state, text, embedding.as_deref());
            let tick = state.tick;
            let base_ttl = state.config.base_ttl;
            let mut trace = crate::trace::MemoryTrace::new(id.clone(), text.clone(), embedding, meta, tick, base_ttl);
            trace.territory_id = Some(territory_id);
            state.mem.insert(id.clone(), trace);
            state.record_event(EventKind::Register {
                id: id.clone(),
                territory: Some(territory_id),
            });
        }
        maintenance::after_operation(&mut state);
        condensation::drain(&mut state)
    }

    /// Run the condensation callback outside the lock and, if it returns a
    /// summary, re-ingest it through the normal registration path.
    fn dispatch_condensation(&self, pairs: Vec<(String, String)>, callback: Option<Arc<CondenseCallback>>) {
        if pairs.is_empty() {
            return;
        }
        let Some(callback) = callback else {
            return;
        };
        let ids: Vec<String> = pairs.into_iter().map(|(id, _)| id).collect();
        if let Some((summary_id, summary_text)) = callback(&ids) {
            let (pairs, callback) = self.register_internal(&[summary_id], &[summary_text], None, None);
            self.dispatch_condensation(pairs, callback);
        }
    }
}
