//! The manager's owned state: every collection a register/reinforce/degrade/
//! maintenance pass touches, grouped so the lock in `manager.rs` guards all
//! of it at once (`spec.md` §3).

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use rand_chacha::ChaCha8Rng;

use crate::config::ManagerConfig;
use crate::events::Event;
use crate::ring::RingBuffer;
use crate::trace::MemoryTrace;

/// Event log capacity (`spec.md` §3 invariant 7): at most this many most
/// recent entries are retained.
pub(crate) const EVENT_LOG_CAPACITY: usize = 1024;
/// Capacity of the global nearest-centroid distance window that feeds τ.
pub(crate) const NN_DISTANCE_CAPACITY: usize = 5000;
/// Capacity of a single territory's member-distance window.
pub(crate) const TERRITORY_WINDOW_CAPACITY: usize = 1024;

/// A territory: a cluster of traces that share a region of embedding space
/// (or a deterministic text hash, when traces arrive without an embedding).
#[derive(Debug, Clone)]
pub(crate) struct Territory {
    pub(crate) centroid: Option<Vec<f64>>,
    pub(crate) member_count: usize,
    pub(crate) member_distances: RingBuffer<f64>,
}

impl Territory {
    pub(crate) fn new(centroid: Option<Vec<f64>>) -> Self {
        Self {
            centroid,
            member_count: 1,
            member_distances: RingBuffer::new(TERRITORY_WINDOW_CAPACITY),
        }
    }
}

/// A trace sustaining high novelty while boredom stays moderate (`spec.md`
/// §3, frontier table).
#[derive(Debug, Clone)]
pub(crate) struct FrontierEntry {
    pub(crate) territory_id: i64,
    pub(crate) hits: u32,
    pub(crate) novelty: f64,
}

pub(crate) type CondenseCallback = dyn Fn(&[String]) -> Option<(String, String)> + Send + Sync;

pub(crate) struct ManagerState {
    pub(crate) config: ManagerConfig,
    pub(crate) tick: i64,
    pub(crate) mem: IndexMap<String, MemoryTrace>,
    pub(crate) events: RingBuffer<Event>,

    pub(crate) territories: IndexMap<i64, Territory>,
    pub(crate) next_territory_id: i64,
    pub(crate) nn_distances: RingBuffer<f64>,
    pub(crate) territory_tau: f64,
    pub(crate) deterministic_ids: HashMap<String, i64>,

    /// Bounded window of ticks at which each territory pair co-activated,
    /// keyed `(min, max)`, plus the tick of the most recent co-activation.
    pub(crate) pair_churn: IndexMap<(i64, i64), RingBuffer<i64>>,
    pub(crate) pair_last_tick: IndexMap<(i64, i64), i64>,

    pub(crate) reward_ema: f64,

    pub(crate) frontier: IndexMap<String, FrontierEntry>,
    pub(crate) pending_condense: Vec<String>,
    pub(crate) engrams: IndexMap<String, Vec<String>>,

    pub(crate) split_counter: u64,
    pub(crate) merge_counter: u64,

    pub(crate) rng: ChaCha8Rng,
    pub(crate) condense_callback: Option<Arc<CondenseCallback>>,
}

impl ManagerState {
    pub(crate) fn new(config: ManagerConfig, rng: ChaCha8Rng) -> Self {
        Self {
            tick: 0,
            mem: IndexMap::with_capacity(config.capacity),
            events: RingBuffer::new(EVENT_LOG_CAPACITY),
            territories: IndexMap::new(),
            next_territory_id: 10000,
            nn_distances: RingBuffer::new(NN_DISTANCE_CAPACITY),
            territory_tau: 0.35,
            deterministic_ids: HashMap::new(),
            pair_churn: IndexMap::new(),
            pair_last_tick: IndexMap::new(),
            reward_ema: 0.0,
            frontier: IndexMap::new(),
            pending_condense: Vec::new(),
            engrams: IndexMap::new(),
            split_counter: 0,
            merge_counter: 0,
            rng,
            condense_callback: None,
            config,
        }
    }

    pub(crate) fn record_event(&mut self, kind: crate::events::EventKind) {
        let tick = self.tick;
        self.events.push(Event::new(tick, kind));
    }
}
