//! A bounded in-memory store of self-organising memory traces.
//!
//! Traces are grouped into territories by embedding proximity (or, absent an
//! embedding, by a deterministic hash of their text). Reinforcement and
//! degradation move each trace's learning signals; a maintenance pass run
//! after every register/reinforce call decays, prunes, and periodically
//! diffuses territories into each other. Traces that grow bored, confident,
//! and heavy enough are handed off for condensation into a single summary
//! trace through a caller-supplied callback.
//!
//! Everything is driven through [`MemoryManager`], the only public entry
//! point:
//!
//! - registration and learning: [`MemoryManager::register_chunks`],
//!   [`MemoryManager::reinforce`], [`MemoryManager::degrade`]
//! - condensation: [`MemoryManager::register_engram`],
//!   [`MemoryManager::set_condense_callback`]
//! - retrieval: [`MemoryManager::top`], [`MemoryManager::composite_score_for`],
//!   [`MemoryManager::stats`]
//! - observability: [`MemoryManager::consume_events`],
//!   [`MemoryManager::peek_events`]
//! - persistence: [`MemoryManager::to_snapshot`],
//!   [`MemoryManager::from_snapshot`], [`MemoryManager::save_json`],
//!   [`MemoryManager::load_json`]

mod condensation;
mod config;
mod error;
mod events;
mod maintenance;
mod manager;
mod reinforce;
mod ring;
mod rng;
mod scoring;
mod snapshot;
mod state;
mod territory;
mod trace;

pub use config::ManagerConfig;
pub use error::{ConfigError, Result, VoidError};
pub use events::{Event, EventKind};
pub use manager::{CondenseFn, MemoryManager};
pub use scoring::ManagerStats;
pub use snapshot::Snapshot;
pub use trace::MemoryTrace;

/// Common imports for embedding a manager into a host application.
pub mod prelude {
    pub use crate::{CondenseFn, ConfigError, Event, EventKind, ManagerConfig, MemoryManager, VoidError};
}
