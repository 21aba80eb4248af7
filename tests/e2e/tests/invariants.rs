//! Universal invariants and monotonicity laws over randomized operation
//! sequences (`spec.md` §8, properties 1-10).

use std::collections::HashMap;

use proptest::prelude::*;
use serde_json::Value;
use void_core::{ManagerConfig, MemoryManager, MemoryTrace};

fn test_config(seed: u64) -> ManagerConfig {
    ManagerConfig {
        capacity: 32,
        base_ttl: 60,
        decay_half_life: 8,
        prune_sample: 16,
        prune_target_ratio: 0.3,
        seed: Some(seed),
        diffusion_interval: 6,
        ..ManagerConfig::default()
    }
}

#[derive(Debug, Clone)]
enum Op {
    Register(usize),
    Reinforce(Vec<usize>, Vec<f64>),
    Degrade(Vec<usize>, i64),
}

fn op_strategy(pool: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..pool).prop_map(Op::Register),
        (
            prop::collection::vec(0..pool, 1..4),
            prop::collection::vec(0.0f64..1.0, 1..4),
        )
            .prop_map(|(ids, mut distances)| {
                distances.resize(ids.len(), 0.2);
                Op::Reinforce(ids, distances)
            }),
        (prop::collection::vec(0..pool, 1..4), 1i64..60).prop_map(|(ids, floor)| Op::Degrade(ids, floor)),
    ]
}

fn id_for(index: usize) -> String {
    format!("id-{index}")
}

fn text_for(index: usize) -> String {
    format!("body text number {index} with some distinguishing padding")
}

fn apply(manager: &MemoryManager, op: &Op) {
    match op {
        Op::Register(index) => {
            let _ = manager.register_chunks(&[id_for(*index)], &[text_for(*index)], None, None);
        }
        Op::Reinforce(indices, distances) => {
            let ids: Vec<String> = indices.iter().map(|i| id_for(*i)).collect();
            let _ = manager.reinforce(&[ids], &[distances.clone()], 0.8, 180);
        }
        Op::Degrade(indices, floor) => {
            let ids: Vec<String> = indices.iter().map(|i| id_for(*i)).collect();
            manager.degrade(&ids, *floor).unwrap();
        }
    }
}

/// Invariants 1, 2, 3, 5: trace field ranges, territory membership counts,
/// capacity, and the τ bound, checked against the manager's own snapshot.
fn assert_structural_invariants(manager: &MemoryManager, capacity: usize) {
    let snapshot = manager.to_snapshot();
    let value = &snapshot.0;

    let mem = value["mem"].as_object().expect("mem is an object");
    assert!(mem.len() <= capacity, "|mem| exceeded capacity: {}", mem.len());

    let mut territory_membership: HashMap<String, usize> = HashMap::new();
    for (_, entry) in mem {
        let trace: MemoryTrace = serde_json::from_value(entry.clone()).expect("valid trace json");
        assert!((0.0..=1.0).contains(&trace.confidence), "confidence out of range: {}", trace.confidence);
        assert!((0.0..=1.0).contains(&trace.novelty), "novelty out of range: {}", trace.novelty);
        assert!((0.0..=1.0).contains(&trace.boredom), "boredom out of range: {}", trace.boredom);
        assert!(trace.inhibition >= 0.0, "inhibition went negative: {}", trace.inhibition);
        assert!(trace.mass >= 0.0, "mass went negative: {}", trace.mass);
        assert!(trace.heat >= 0.0, "heat went negative: {}", trace.heat);
        assert!(trace.ttl >= 0, "ttl went negative: {}", trace.ttl);

        if let Some(territory_id) = trace.territory_id {
            *territory_membership.entry(territory_id.to_string()).or_insert(0) += 1;
        }
    }

    let territory_counts = value["territory_counts"].as_object().expect("territory_counts is an object");
    for (territory_id, counted) in &territory_membership {
        let reported = territory_counts
            .get(territory_id)
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        assert_eq!(
            reported, *counted,
            "territory_counts[{territory_id}] ({reported}) != live membership ({counted})"
        );
    }

    let tau = value["territory_tau"].as_f64().expect("territory_tau is a number");
    assert!((0.05..=0.6).contains(&tau), "tau escaped its bound: {tau}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Properties 1, 2, 3, 4, 5: checked after every op in the sequence.
    #[test]
    fn structural_invariants_hold_after_every_op(ops in prop::collection::vec(op_strategy(12), 1..40)) {
        let manager = MemoryManager::new(test_config(7)).unwrap();
        for op in &ops {
            apply(&manager, op);
            assert_structural_invariants(&manager, 32);
            prop_assert!(manager.peek_events(1024).len() <= 1024);
        }
    }

    /// Property 6: save_json/load_json round-trips to an equal snapshot.
    #[test]
    fn snapshot_round_trips_through_disk(ops in prop::collection::vec(op_strategy(12), 1..20)) {
        let manager = MemoryManager::new(test_config(11)).unwrap();
        for op in &ops {
            apply(&manager, op);
        }
        let before = manager.to_snapshot().0;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        manager.save_json(&path).unwrap();
        let restored = MemoryManager::load_json(&path).unwrap();
        let after = restored.to_snapshot().0;

        prop_assert_eq!(before, after);
    }

    /// Property 7: two managers built with the same seed and driven with an
    /// identical operation sequence produce identical snapshots.
    #[test]
    fn identical_seed_and_sequence_produce_identical_snapshots(ops in prop::collection::vec(op_strategy(12), 1..40)) {
        let a = MemoryManager::new(test_config(23)).unwrap();
        let b = MemoryManager::new(test_config(23)).unwrap();
        for op in &ops {
            apply(&a, op);
            apply(&b, op);
        }
        prop_assert_eq!(a.to_snapshot().0, b.to_snapshot().0);
    }

    /// Property 8: reinforcing with every `sim > 0` (distance < 1) never
    /// lowers confidence, mass, or use_count, and never lowers ttl below a
    /// boost that exceeds it.
    #[test]
    fn reinforcement_is_monotonic_on_touched_traces(distance in 0.0f64..0.9) {
        let manager = MemoryManager::new(test_config(5)).unwrap();
        manager.register_chunks(&["a".into()], &["hello world".into()], None, None).unwrap();

        let before = trace_from_snapshot(&manager, "a");
        manager.reinforce(&[vec!["a".to_string()]], &[vec![distance]], 0.8, before.ttl + 50).unwrap();
        let after = trace_from_snapshot(&manager, "a");

        prop_assert!(after.confidence >= before.confidence);
        prop_assert!(after.mass >= before.mass);
        prop_assert!(after.use_count >= before.use_count);
        prop_assert!(after.ttl >= before.ttl);
    }

    /// Property 9: after degrade(ids, floor), every touched trace's ttl is
    /// capped at floor and boredom rose by at least 0.1 minus clamp slack.
    #[test]
    fn degradation_caps_ttl_and_raises_boredom(floor in 1i64..100) {
        let manager = MemoryManager::new(test_config(5)).unwrap();
        manager.register_chunks(&["a".into()], &["hello world".into()], None, None).unwrap();
        let before = trace_from_snapshot(&manager, "a");

        manager.degrade(&["a".to_string()], floor).unwrap();
        let after = trace_from_snapshot(&manager, "a");

        prop_assert!(after.ttl <= floor);
        prop_assert!(after.boredom >= (before.boredom + 0.1 - 1e-9).min(1.0));
    }
}

fn trace_from_snapshot(manager: &MemoryManager, id: &str) -> MemoryTrace {
    let snapshot = manager.to_snapshot();
    serde_json::from_value(snapshot.0["mem"][id].clone()).expect("trace present in snapshot")
}

/// Property 10: reward_ema stays in [0, 1] and approaches the mean
/// similarity of a run of identical reinforcement rows.
#[test]
fn reward_ema_converges_toward_mean_similarity_of_a_repeated_row() {
    let manager = MemoryManager::new(test_config(9)).unwrap();
    manager
        .register_chunks(&["a".into(), "b".into()], &["hello".into(), "world".into()], None, None)
        .unwrap();

    let distance = 0.2;
    let expected_sim = 1.0 - distance;
    let mut last = manager.stats().reward_ema;
    for _ in 0..200 {
        manager
            .reinforce(&[vec!["a".to_string(), "b".to_string()]], &[vec![distance, distance]], 0.1, 60)
            .unwrap();
        let reward_ema = manager.stats().reward_ema;
        assert!((0.0..=1.0).contains(&reward_ema));
        last = reward_ema;
    }
    assert!((last - expected_sim).abs() < 0.01, "reward_ema {last} did not converge toward {expected_sim}");
}
