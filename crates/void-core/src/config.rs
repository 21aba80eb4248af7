//! Construction parameters, their validation, and the tolerant merge used
//! when rehydrating a config echoed inside a snapshot (`SPEC_FULL.md` §6).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Construction parameters for a [`crate::manager::MemoryManager`].
///
/// Defaults mirror the defaults table in `spec.md` §6. Every field is
/// validated by [`ManagerConfig::validate`] before a manager is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ManagerConfig {
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,
    #[serde(default = "defaults::base_ttl")]
    pub base_ttl: i64,
    #[serde(default = "defaults::decay_half_life")]
    pub decay_half_life: u32,
    #[serde(default = "defaults::prune_sample")]
    pub prune_sample: usize,
    #[serde(default = "defaults::prune_target_ratio")]
    pub prune_target_ratio: f64,
    #[serde(default)]
    pub thread_safe: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "defaults::recency_half_life_ticks")]
    pub recency_half_life_ticks: i64,
    #[serde(default = "defaults::habituation_start")]
    pub habituation_start: i64,
    #[serde(default = "defaults::habituation_scale")]
    pub habituation_scale: f64,
    #[serde(default = "defaults::boredom_weight")]
    pub boredom_weight: f64,
    #[serde(default = "defaults::frontier_novelty_threshold")]
    pub frontier_novelty_threshold: f64,
    #[serde(default = "defaults::frontier_patience")]
    pub frontier_patience: u32,
    #[serde(default = "defaults::diffusion_interval")]
    pub diffusion_interval: u32,
    #[serde(default = "defaults::diffusion_kappa")]
    pub diffusion_kappa: f64,
    #[serde(default = "defaults::exploration_churn_window")]
    pub exploration_churn_window: usize,
    #[serde(default = "defaults::condensation_boredom")]
    pub condensation_boredom: f64,
    #[serde(default = "defaults::condensation_conf")]
    pub condensation_conf: f64,
    #[serde(default = "defaults::condensation_mass")]
    pub condensation_mass: f64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::capacity(),
            base_ttl: defaults::base_ttl(),
            decay_half_life: defaults::decay_half_life(),
            prune_sample: defaults::prune_sample(),
            prune_target_ratio: defaults::prune_target_ratio(),
            thread_safe: false,
            seed: None,
            recency_half_life_ticks: defaults::recency_half_life_ticks(),
            habituation_start: defaults::habituation_start(),
            habituation_scale: defaults::habituation_scale(),
            boredom_weight: defaults::boredom_weight(),
            frontier_novelty_threshold: defaults::frontier_novelty_threshold(),
            frontier_patience: defaults::frontier_patience(),
            diffusion_interval: defaults::diffusion_interval(),
            diffusion_kappa: defaults::diffusion_kappa(),
            exploration_churn_window: defaults::exploration_churn_window(),
            condensation_boredom: defaults::condensation_boredom(),
            condensation_conf: defaults::condensation_conf(),
            condensation_mass: defaults::condensation_mass(),
        }
    }
}

mod defaults {
    pub(super) fn capacity() -> usize {
        256
    }
    pub(super) fn base_ttl() -> i64 {
        128
    }
    pub(super) fn decay_half_life() -> u32 {
        32
    }
    pub(super) fn prune_sample() -> usize {
        64
    }
    pub(super) fn prune_target_ratio() -> f64 {
        0.2
    }
    pub(super) fn recency_half_life_ticks() -> i64 {
        64
    }
    pub(super) fn habituation_start() -> i64 {
        32
    }
    pub(super) fn habituation_scale() -> f64 {
        1.0
    }
    pub(super) fn boredom_weight() -> f64 {
        0.35
    }
    pub(super) fn frontier_novelty_threshold() -> f64 {
        0.8
    }
    pub(super) fn frontier_patience() -> u32 {
        3
    }
    pub(super) fn diffusion_interval() -> u32 {
        12
    }
    pub(super) fn diffusion_kappa() -> f64 {
        0.25
    }
    pub(super) fn exploration_churn_window() -> usize {
        32
    }
    pub(super) fn condensation_boredom() -> f64 {
        0.85
    }
    pub(super) fn condensation_conf() -> f64 {
        0.6
    }
    pub(super) fn condensation_mass() -> f64 {
        5.0
    }
}

impl ManagerConfig {
    /// Validate every field, returning the first violation found.
    ///
    /// Order matches the table in `spec.md` §6 so error messages are stable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity < 10 {
            return Err(ConfigError::new("capacity", "must be >= 10"));
        }
        if self.base_ttl < 10 {
            return Err(ConfigError::new("base_ttl", "must be >= 10"));
        }
        if self.decay_half_life < 1 {
            return Err(ConfigError::new("decay_half_life", "must be >= 1"));
        }
        if self.prune_sample < 16 {
            return Err(ConfigError::new("prune_sample", "must be >= 16"));
        }
        if !(0.05..=1.0).contains(&self.prune_target_ratio) {
            return Err(ConfigError::new(
                "prune_target_ratio",
                "must be within [0.05, 1.0]",
            ));
        }
        if self.recency_half_life_ticks < 1 {
            return Err(ConfigError::new(
                "recency_half_life_ticks",
                "must be >= 1",
            ));
        }
        if self.habituation_start < 0 {
            return Err(ConfigError::new("habituation_start", "must be >= 0"));
        }
        if self.habituation_scale < 1.0 {
            return Err(ConfigError::new("habituation_scale", "must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.boredom_weight) {
            return Err(ConfigError::new("boredom_weight", "must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.frontier_novelty_threshold) {
            return Err(ConfigError::new(
                "frontier_novelty_threshold",
                "must be within [0, 1]",
            ));
        }
        if self.frontier_patience < 2 {
            return Err(ConfigError::new("frontier_patience", "must be >= 2"));
        }
        if self.diffusion_interval < 5 {
            return Err(ConfigError::new("diffusion_interval", "must be >= 5"));
        }
        if !(0.0..=1.0).contains(&self.diffusion_kappa) {
            return Err(ConfigError::new("diffusion_kappa", "must be within [0, 1]"));
        }
        if self.exploration_churn_window < 10 {
            return Err(ConfigError::new(
                "exploration_churn_window",
                "must be >= 10",
            ));
        }
        if !(0.0..=1.0).contains(&self.condensation_boredom) {
            return Err(ConfigError::new(
                "condensation_boredom",
                "must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.condensation_conf) {
            return Err(ConfigError::new(
                "condensation_conf",
                "must be within [0, 1]",
            ));
        }
        Ok(())
    }

    /// Merge a loosely-typed JSON object with the declared defaults,
    /// skipping any field whose type doesn't match instead of failing the
    /// whole parse (mirrors `sanitize_config` in the original implementation).
    pub(crate) fn from_snapshot_value(value: Option<&serde_json::Value>) -> Self {
        let mut config = Self::default();
        let Some(serde_json::Value::Object(map)) = value else {
            return config;
        };
        macro_rules! take_num {
            ($field:ident, $cast:expr) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_f64()) {
                    config.$field = $cast(v);
                }
            };
        }
        take_num!(capacity, |v: f64| v.max(0.0) as usize);
        take_num!(base_ttl, |v: f64| v as i64);
        take_num!(decay_half_life, |v: f64| v.max(0.0) as u32);
        take_num!(prune_sample, |v: f64| v.max(0.0) as usize);
        take_num!(prune_target_ratio, |v: f64| v);
        take_num!(recency_half_life_ticks, |v: f64| v as i64);
        take_num!(habituation_start, |v: f64| v as i64);
        take_num!(habituation_scale, |v: f64| v);
        take_num!(boredom_weight, |v: f64| v);
        take_num!(frontier_novelty_threshold, |v: f64| v);
        take_num!(frontier_patience, |v: f64| v.max(0.0) as u32);
        take_num!(diffusion_interval, |v: f64| v.max(0.0) as u32);
        take_num!(diffusion_kappa, |v: f64| v);
        take_num!(exploration_churn_window, |v: f64| v.max(0.0) as usize);
        take_num!(condensation_boredom, |v: f64| v);
        take_num!(condensation_conf, |v: f64| v);
        take_num!(condensation_mass, |v: f64| v);
        if let Some(b) = map.get("thread_safe").and_then(|v| v.as_bool()) {
            config.thread_safe = b;
        }
        match map.get("seed") {
            Some(serde_json::Value::Number(n)) => config.seed = n.as_u64(),
            Some(serde_json::Value::Null) | None => {}
            _ => {}
        }
        config
    }
}
