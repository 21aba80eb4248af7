//! The event log: every state change a manager makes is recorded as an
//! [`Event`] so a caller can `consume_events`/`peek_events` to drive external
//! collaborators such as the probe in `void-probe` (`spec.md` §3, §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub tick: i64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Register {
        id: String,
        territory: Option<i64>,
    },
    Reinforce {
        count: usize,
    },
    Degrade {
        count: usize,
    },
    Engram {
        id: String,
        members: Vec<String>,
    },
    Evict {
        id: String,
    },
    Prune {
        count: usize,
    },
    TerritoryCreate {
        id: i64,
    },
    TerritoryMerge {
        from: i64,
        to: i64,
    },
    TerritorySplit {
        from: i64,
        to: i64,
        count: usize,
    },
}

impl Event {
    pub(crate) fn new(tick: i64, kind: EventKind) -> Self {
        Self { tick, kind }
    }
}
