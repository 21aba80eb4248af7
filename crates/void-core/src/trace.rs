//! The memory trace itself: the fields every register/reinforce/degrade/decay
//! operation mutates (`spec.md` §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single self-organising memory trace.
///
/// Embeddings are optional: traces registered without one fall back to the
/// deterministic, hash-based territory assignment path (`territory.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTrace {
    pub id: String,
    pub text: String,
    pub embedding: Option<Vec<f64>>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub territory_id: Option<i64>,
    pub ttl: i64,
    pub last_touch_tick: i64,
    pub use_count: u64,
    pub mass: f64,
    pub heat: f64,
    pub confidence: f64,
    pub novelty: f64,
    pub boredom: f64,
    pub inhibition: f64,
    pub frontier_hits: u32,
    pub pending_condense: bool,
}

impl MemoryTrace {
    pub(crate) fn new(
        id: String,
        text: String,
        embedding: Option<Vec<f64>>,
        metadata: Option<HashMap<String, serde_json::Value>>,
        tick: i64,
        base_ttl: i64,
    ) -> Self {
        let novelty = estimate_novelty(&text);
        let mut trace = Self {
            id,
            text,
            embedding,
            metadata,
            territory_id: None,
            ttl: base_ttl,
            last_touch_tick: tick,
            use_count: 0,
            mass: 1.0,
            heat: 0.0,
            confidence: 0.35,
            novelty,
            boredom: 0.0,
            inhibition: 0.0,
            frontier_hits: 0,
            pending_condense: false,
        };
        trace.clamp();
        trace
    }

    /// Clamp every bounded field back into its declared range. Idempotent,
    /// and called after every mutation site rather than folded into each
    /// one, since several fields share the same `[0, 1]` range and drift
    /// independently.
    pub(crate) fn clamp(&mut self) {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.novelty = self.novelty.clamp(0.0, 1.0);
        self.boredom = self.boredom.clamp(0.0, 1.0);
        self.inhibition = self.inhibition.max(0.0);
        self.mass = self.mass.max(0.0);
        self.heat = self.heat.max(0.0);
        self.ttl = self.ttl.max(0);
        self.last_touch_tick = self.last_touch_tick.max(0);
    }
}

/// `clamp01(|unique codepoints in text| / 64)`, or 0 for empty text
/// (`spec.md` §4.A).
pub(crate) fn estimate_novelty(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let unique: std::collections::HashSet<char> = text.chars().collect();
    (unique.len() as f64 / 64.0).clamp(0.0, 1.0)
}
