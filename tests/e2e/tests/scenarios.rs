//! Concrete scenarios S1-S6 (`spec.md` §8).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use void_core::{ManagerConfig, MemoryManager};
use void_probe::{drive_manager_for_telemetry, AnomalyThresholds, DriveConfig};

fn trace_field(manager: &MemoryManager, id: &str, field: &str) -> serde_json::Value {
    manager.to_snapshot().0["mem"][id][field].clone()
}

/// S1 - basic learning signals.
#[test]
fn s1_basic_learning_signals() {
    let manager = MemoryManager::new(ManagerConfig {
        capacity: 64,
        base_ttl: 120,
        decay_half_life: 32,
        prune_sample: 32,
        prune_target_ratio: 0.2,
        seed: Some(7),
        diffusion_interval: 12,
        ..ManagerConfig::default()
    })
    .unwrap();

    manager
        .register_chunks(
            &["mem-alpha".into(), "mem-beta".into(), "mem-gamma".into()],
            &[
                "alpha describes vacuum resonance calibration".into(),
                "beta describes asynchronous reinforcement batching".into(),
                "gamma describes centroid drift bookkeeping".into(),
            ],
            None,
            None,
        )
        .unwrap();

    let baseline = manager.stats();
    assert_eq!(baseline.count, 3);
    assert!((baseline.avg_confidence - 0.35).abs() < 1e-6);

    let baseline_mass = baseline.avg_mass;
    let baseline_boredom = baseline.avg_boredom;

    manager
        .reinforce(
            &[vec!["mem-alpha".into(), "mem-beta".into()], vec!["mem-beta".into(), "mem-gamma".into()]],
            &[vec![0.05, 0.15], vec![0.08, 0.35]],
            0.8,
            180,
        )
        .unwrap();

    let after = manager.stats();
    assert!(after.avg_confidence > baseline.avg_confidence);
    assert!(after.avg_mass > baseline_mass);
    assert!(after.avg_boredom > baseline_boredom);
    assert!(after.reward_ema > 0.05);

    let events = manager.peek_events(1024);
    assert!(events.iter().any(|e| matches!(e.kind, void_core::EventKind::Reinforce { .. })));

    let snapshot = manager.to_snapshot();
    let territories: std::collections::HashSet<i64> = ["mem-alpha", "mem-beta", "mem-gamma"]
        .iter()
        .map(|id| snapshot.0["mem"][id]["territory_id"].as_i64().unwrap())
        .collect();
    assert_eq!(territories.len(), 3, "three distinct texts should land in three distinct territories");
}

fn s1_manager() -> MemoryManager {
    let manager = MemoryManager::new(ManagerConfig {
        capacity: 64,
        base_ttl: 120,
        decay_half_life: 32,
        prune_sample: 32,
        prune_target_ratio: 0.2,
        seed: Some(7),
        diffusion_interval: 12,
        ..ManagerConfig::default()
    })
    .unwrap();
    manager
        .register_chunks(
            &["mem-alpha".into(), "mem-beta".into(), "mem-gamma".into()],
            &[
                "alpha describes vacuum resonance calibration".into(),
                "beta describes asynchronous reinforcement batching".into(),
                "gamma describes centroid drift bookkeeping".into(),
            ],
            None,
            None,
        )
        .unwrap();
    manager
        .reinforce(
            &[vec!["mem-alpha".into(), "mem-beta".into()], vec!["mem-beta".into(), "mem-gamma".into()]],
            &[vec![0.05, 0.15], vec![0.08, 0.35]],
            0.8,
            180,
        )
        .unwrap();
    manager
}

/// S2 - degrade caps.
#[test]
fn s2_degrade_caps() {
    let manager = s1_manager();
    let ids = ["mem-alpha".to_string(), "mem-beta".to_string(), "mem-gamma".to_string()];
    manager.degrade(&ids, 30).unwrap();

    for id in &ids {
        let ttl = trace_field(&manager, id, "ttl").as_i64().unwrap();
        let boredom = trace_field(&manager, id, "boredom").as_f64().unwrap();
        assert!(ttl <= 30, "{id} ttl {ttl} exceeds floor");
        assert!(boredom >= 0.1, "{id} boredom {boredom} below 0.1");
    }
}

/// S3 - engram.
#[test]
fn s3_engram() {
    let manager = s1_manager();
    let created = manager.register_engram(
        "engram-core",
        &["mem-alpha".to_string(), "mem-beta".to_string()],
        "condensed summary of alpha and beta",
    );
    assert!(created);

    let snapshot = manager.to_snapshot();
    let members = snapshot.0["engrams"]["engram-core"].as_array().unwrap();
    let member_ids: Vec<&str> = members.iter().map(|v| v.as_str().unwrap()).collect();
    assert_eq!(member_ids, vec!["mem-alpha", "mem-beta"]);

    for id in ["mem-alpha", "mem-beta"] {
        let boredom = trace_field(&manager, id, "boredom").as_f64().unwrap();
        let inhibition = trace_field(&manager, id, "inhibition").as_f64().unwrap();
        assert!(boredom >= 0.05, "{id} boredom {boredom} below 0.05");
        assert!(inhibition >= 0.05, "{id} inhibition {inhibition} below 0.05");
    }
}

/// S4 - backpressure and condensation.
#[test]
fn s4_backpressure_and_condensation() {
    let manager = MemoryManager::new(ManagerConfig {
        capacity: 48,
        condensation_boredom: 0.2,
        condensation_conf: 0.3,
        condensation_mass: 1.4,
        seed: Some(13),
        ..ManagerConfig::default()
    })
    .unwrap();

    let ids: Vec<String> = (0..6).map(|i| format!("s4-{i}")).collect();
    let texts: Vec<String> = (0..6).map(|i| format!("s4 seed content number {i} with padding")).collect();
    manager.register_chunks(&ids, &texts, None, None).unwrap();

    let call_count = Arc::new(AtomicUsize::new(0));
    let batches: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let call_count = call_count.clone();
        let batches = batches.clone();
        manager.set_condense_callback(Some(Arc::new(move |sources: &[String]| {
            let n = call_count.fetch_add(1, Ordering::SeqCst) + 1;
            batches.lock().unwrap().push(sources.to_vec());
            if n >= 2 {
                Some((format!("s4-engram-{n}"), "condensed".to_string()))
            } else {
                None
            }
        })));
    }

    let first4: Vec<String> = ids[..4].to_vec();
    for pass in 0..3 {
        manager
            .reinforce(&[ids.clone()], &[vec![0.1, 0.1, 0.1, 0.1, 0.1, 0.1]], 0.9, 200)
            .unwrap();
        if pass < 2 {
            manager.degrade(&first4, 3).unwrap();
        }
    }

    assert!(call_count.load(Ordering::SeqCst) >= 2, "callback invoked fewer than twice");

    let snapshot = manager.to_snapshot();
    let mem = snapshot.0["mem"].as_object().unwrap();
    let summary_present = mem.keys().any(|k| k.starts_with("s4-engram-"));
    assert!(summary_present, "no condensation summary materialised as a new trace");

    for id in &ids {
        assert!(mem.contains_key(id), "{id} missing from snapshot after condensation");
    }
    for (id, trace) in mem {
        let pending = trace["pending_condense"].as_bool().unwrap_or(false);
        assert!(!pending, "{id} still flagged pending_condense");
    }

    assert!(manager.stats().reward_ema > 0.0);
}

/// S5 - telemetry probe bounds.
#[test]
fn s5_telemetry_probe_bounds() {
    let manager = MemoryManager::new(ManagerConfig::default()).unwrap();
    let ids: Vec<String> = (0..6).map(|i| format!("s5-{i}")).collect();
    let texts: Vec<String> = (0..6).map(|i| format!("s5 probe content number {i}")).collect();
    manager.register_chunks(&ids, &texts, None, None).unwrap();

    let config = DriveConfig {
        iterations: 6,
        batch_size: 3,
        degrade_interval: 2,
        ..DriveConfig::default()
    };
    let run = drive_manager_for_telemetry(&manager, &ids, &config);

    assert_eq!(run.samples.len(), 6);
    for sample in &run.samples {
        assert!(sample.count >= 1);
        assert!(sample.average_heat >= 0.0);
    }
}

/// S6 - anomaly alert.
#[test]
fn s6_anomaly_alert() {
    let manager = MemoryManager::new(ManagerConfig::default()).unwrap();
    let ids: Vec<String> = (0..4).map(|i| format!("s6-{i}")).collect();
    let texts: Vec<String> = (0..4).map(|i| format!("s6 probe content number {i}")).collect();
    manager.register_chunks(&ids, &texts, None, None).unwrap();

    let config = DriveConfig { iterations: 6, batch_size: 2, degrade_interval: 3, ..DriveConfig::default() };
    let run = drive_manager_for_telemetry(&manager, &ids, &config);

    let thresholds = AnomalyThresholds {
        min_reward_ema: 0.9,
        max_avg_heat_delta: 0.1,
        max_heat: 0.5,
    };
    let totals = void_probe::tally_events(&run.events);
    let report = void_probe::generate_report(&run.samples, totals, &thresholds);

    assert_eq!(report.status, "alert");
    assert!(!report.anomalies.is_empty());
    assert!(report
        .anomalies
        .iter()
        .all(|a| matches!(a.metric, "reward_ema" | "avg_heat_delta" | "max_heat")));
}
