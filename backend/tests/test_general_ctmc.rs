//! Multi-skill chain tests
//!
//! Two contact types, two agent groups. Group 0 serves both types at
//! different rates, group 1 only serves type 1.
//!
//! Critical invariants tested:
//! - Capacity: queues and groups never exceed their current bounds by sampling
//! - Mode domination: the active mode's vector covers the occupancy
//! - Routing: selectors decide which group and queue are used
//! - Bounds: changes that would strand the occupancy are rejected

use callcenter_ctmc_core_rs::rng::RngManager;
use callcenter_ctmc_core_rs::routing::TieBreak;
use callcenter_ctmc_core_rs::{
    build_ctmc, CallCenterCtmc, CtmcConfig, CtmcError, CtmcVariant, RoutingConfig,
    TransitionType,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn two_skill_config() -> CtmcConfig {
    CtmcConfig {
        arrival_rates: vec![3.0, 1.0],
        max_arrival_rates: None,
        balking_probabilities: Some(vec![0.2, 0.0]),
        patience_rates: vec![0.5, 0.2],
        max_patience_rates: None,
        service_rates: vec![vec![1.0, 0.0], vec![0.5, 2.0]],
        max_service_rates: None,
        num_agents: vec![2, 1],
        max_num_agents: None,
        queue_capacity: 4,
        max_queue_capacity: None,
        thresholds: None,
        routing: None,
    }
}

fn check_invariants(ctmc: &dyn CallCenterCtmc) {
    let state = ctmc.state();
    let params = ctmc.params();
    let num_groups = ctmc.num_agent_groups();

    assert!(state.total_queue_size() <= params.queue_capacity());
    for i in 0..num_groups {
        assert!(state.num_busy(i) <= params.num_agents(i));
        if state.tracks_service_types() {
            let by_type: u32 = (0..ctmc.num_contact_types())
                .map(|k| state.num_busy_of_type(k, i).unwrap_or(0))
                .sum();
            assert_eq!(by_type, state.num_busy(i), "group {}", i);
        }
    }

    let vector = ctmc.mode_table().vector(ctmc.mode());
    for i in 0..num_groups {
        assert!(vector[i] >= state.num_busy(i), "mode {:?} busy {}", vector, i);
    }
    assert!(vector[num_groups] >= state.total_queue_size());

    for k in 0..ctmc.num_contact_types() {
        if let Some(queue) = ctmc.waiting_queue(k) {
            assert_eq!(queue.len(), state.queue_size(k) as usize);
        }
    }
}

// ============================================================================
// Sampling
// ============================================================================

#[test]
fn test_auto_variant_tracks_service_types() {
    let ctmc = build_ctmc(&two_skill_config(), CtmcVariant::Auto, false).unwrap();
    assert!(ctmc.state().tracks_service_types());
    // Λ̃ = (3 + 1) + 2 * 1.5 + 1 * 2 + 4 * (0.5 + 0.2)
    assert!((ctmc.uniformization_rate() - 11.8).abs() < 1e-12);
}

#[test]
fn test_long_run_respects_capacities_and_modes() {
    let mut config = two_skill_config();
    config.thresholds = Some(vec![vec![1, 0, 1], vec![1, 1, 2], vec![2, 1, 4]]);
    let mut ctmc = build_ctmc(&config, CtmcVariant::Auto, true).unwrap();
    assert_eq!(ctmc.mode_table().num_modes(), 3);

    let mut rng = RngManager::new(31337);
    let mut seen_modes = [false; 3];
    for _ in 0..20_000 {
        ctmc.next_transition(rng.next_word()).unwrap();
        check_invariants(ctmc.as_ref());
        seen_modes[ctmc.mode()] = true;
    }
    assert!(seen_modes[0] && seen_modes[2], "{:?}", seen_modes);
}

#[test]
fn test_same_rate_engine_samples_within_capacities() {
    let mut config = two_skill_config();
    config.service_rates = vec![vec![1.0, 0.0], vec![1.0, 2.0]];
    let mut ctmc = build_ctmc(&config, CtmcVariant::Auto, true).unwrap();
    assert!(!ctmc.state().tracks_service_types());

    let mut rng = RngManager::new(5);
    for _ in 0..10_000 {
        ctmc.next_transition(rng.next_word()).unwrap();
        check_invariants(ctmc.as_ref());
    }
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn test_list_routing_dequeues_in_list_order() {
    let mut config = two_skill_config();
    config.routing = Some(RoutingConfig::ListBased {
        group_lists: vec![vec![0], vec![1, 0]],
        queue_lists: vec![vec![1, 0], vec![1]],
    });
    let mut ctmc = build_ctmc(&config, CtmcVariant::General, true).unwrap();

    ctmc.generate_arrival_queued(0, 0, 0).unwrap();
    ctmc.generate_arrival_queued(1, 0, 0).unwrap();

    assert_eq!(ctmc.select_contact(0).unwrap(), Some(1));
    assert_eq!(ctmc.select_contact(0).unwrap(), Some(0));
    assert_eq!(ctmc.select_contact(0).unwrap(), None);

    let state = ctmc.state();
    assert_eq!(state.num_busy(0), 2);
    assert_eq!(state.num_busy_of_type(1, 0), Some(1));
    assert_eq!(state.total_queue_size(), 0);
    // Outside the transition stream
    assert_eq!(ctmc.transitions_done(), 2);
    assert_eq!(ctmc.last_transition().kind, TransitionType::ArrivalQueued);
}

#[test]
fn test_rank_routing_prefers_lower_rank() {
    let mut config = two_skill_config();
    config.routing = Some(RoutingConfig::RankBased {
        ranks: vec![vec![Some(1.0), None], vec![Some(2.0), Some(1.0)]],
        tie_break: TieBreak::QueueLength,
    });
    let mut ctmc = build_ctmc(&config, CtmcVariant::Auto, false).unwrap();

    ctmc.generate_arrival_queued(1, 0, 0).unwrap();
    ctmc.generate_arrival_queued(0, 0, 0).unwrap();
    assert_eq!(ctmc.select_contact(0).unwrap(), Some(0));
    assert_eq!(ctmc.select_contact(1).unwrap(), Some(1));
    assert_eq!(ctmc.state().total_queue_size(), 0);
}

#[test]
fn test_routing_to_incompatible_group_rejected() {
    let mut config = two_skill_config();
    config.routing = Some(RoutingConfig::ListBased {
        group_lists: vec![vec![1], vec![1]],
        queue_lists: vec![vec![0], vec![1]],
    });
    let err = build_ctmc(&config, CtmcVariant::Auto, false).unwrap_err();
    assert!(matches!(err, CtmcError::InvalidConfig(_)));
}

#[test]
fn test_zeroed_service_bound_removes_group_from_routing() {
    let config = CtmcConfig {
        arrival_rates: vec![2.0],
        max_arrival_rates: None,
        balking_probabilities: None,
        patience_rates: vec![0.5],
        max_patience_rates: None,
        service_rates: vec![vec![1.0, 1.0]],
        max_service_rates: None,
        num_agents: vec![1, 3],
        max_num_agents: None,
        queue_capacity: 4,
        max_queue_capacity: None,
        thresholds: None,
        routing: None,
    };
    let mut ctmc = build_ctmc(&config, CtmcVariant::General, false).unwrap();
    ctmc.set_service_rate(0, 1, 0.0).unwrap();
    ctmc.set_max_service_rate(0, 1, 0.0).unwrap();

    // Group 1 has more free agents but can no longer take the contact
    assert!((ctmc.uniformization_rate() - 5.0).abs() < 1e-12);
    ctmc.generate_arrival_queued(0, 0, 0).unwrap();
    assert_eq!(ctmc.select_contact(1).unwrap(), None);
    assert_eq!(ctmc.select_contact(0).unwrap(), Some(0));

    let mut rng = RngManager::new(606);
    let mut served = 0;
    for _ in 0..5_000 {
        if ctmc.next_transition(rng.next_word()).unwrap() == TransitionType::ArrivalServed {
            served += 1;
            assert_eq!(ctmc.last_transition().group, Some(0));
        }
        assert_eq!(ctmc.state().num_busy(1), 0);
    }
    assert!(served > 0);
}

// ============================================================================
// Parameters
// ============================================================================

#[test]
fn test_same_rate_engine_sets_service_per_group() {
    let mut config = two_skill_config();
    config.service_rates = vec![vec![1.0, 0.0], vec![1.0, 2.0]];
    let mut ctmc = build_ctmc(&config, CtmcVariant::Auto, false).unwrap();

    assert!(matches!(
        ctmc.set_service_rate(0, 0, 0.5),
        Err(CtmcError::Unsupported(_))
    ));
    ctmc.set_group_service_rate(0, 0.5).unwrap();
    assert_eq!(ctmc.params().service_rate(0, 0), 0.5);
    assert_eq!(ctmc.params().service_rate(1, 0), 0.5);
    assert_eq!(ctmc.params().service_rate(0, 1), 0.0);
}

#[test]
fn test_bound_below_occupancy_rejected() {
    let mut ctmc = build_ctmc(&two_skill_config(), CtmcVariant::Auto, false).unwrap();
    ctmc.generate_arrival_served(1, 1, 0, 0).unwrap();

    // Lowering the current count is allowed
    ctmc.set_num_agents(1, 0).unwrap();
    assert_eq!(ctmc.state().num_busy(1), 1);

    // The bound may not drop below the busy agents
    let err = ctmc.set_max_num_agents(1, 0).unwrap_err();
    assert!(matches!(err, CtmcError::InvalidCount { value: 1, bound: 0, .. }));
    assert!(err.is_invalid_argument());
    assert_eq!(ctmc.params().max_num_agents(1), 1);
}

#[test]
fn test_bound_change_keeps_thresholds_consistent() {
    let mut config = two_skill_config();
    config.thresholds = Some(vec![vec![1, 1, 2], vec![2, 1, 4]]);
    let mut ctmc = build_ctmc(&config, CtmcVariant::Auto, false).unwrap();
    assert_eq!(ctmc.mode_table().num_modes(), 2);

    // The configured maximal vector no longer matches
    assert!(matches!(
        ctmc.set_max_queue_capacity(6),
        Err(CtmcError::Thresholds(_))
    ));
    assert_eq!(ctmc.params().max_queue_capacity(), 4);

    ctmc.set_thresholds(None).unwrap();
    ctmc.set_max_queue_capacity(6).unwrap();
    assert_eq!(ctmc.mode_table().num_modes(), 1);
    assert!((ctmc.uniformization_rate() - (11.8 + 2.0 * 0.7)).abs() < 1e-12);

    ctmc.set_thresholds(Some(vec![vec![0, 0, 0], vec![2, 1, 6]])).unwrap();
    assert_eq!(ctmc.mode(), 0);
    assert!(matches!(
        ctmc.set_thresholds(Some(vec![vec![0, 0]])),
        Err(CtmcError::Thresholds(_))
    ));
    assert_eq!(ctmc.mode_table().num_modes(), 2);
}

#[test]
fn test_tracked_end_service_needs_contact_type() {
    let mut ctmc = build_ctmc(&two_skill_config(), CtmcVariant::Auto, false).unwrap();
    ctmc.generate_arrival_served(1, 0, 0, 0).unwrap();

    assert!(ctmc.generate_end_service(None, 0, 0, 0).is_err());
    assert!(ctmc.generate_end_service(Some(0), 0, 0, 0).is_err());
    assert_eq!(
        ctmc.generate_end_service(Some(1), 0, 0, 0).unwrap(),
        TransitionType::EndServiceNoDequeue
    );
    assert!(ctmc.state().is_empty());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_init_from_copies_occupancy_not_target() {
    let config = two_skill_config();
    let mut source = build_ctmc(&config, CtmcVariant::Auto, true).unwrap();
    let mut rng = RngManager::new(8);
    for _ in 0..500 {
        source.next_transition(rng.next_word()).unwrap();
    }

    let mut copy = build_ctmc(&config, CtmcVariant::Auto, true).unwrap();
    copy.set_target_transitions(1_000_000);
    copy.init_from(source.as_ref()).unwrap();

    assert!(copy.state_eq(source.as_ref()));
    assert_eq!(copy.state_hash(), source.state_hash());
    assert_eq!(copy.transitions_done(), source.transitions_done());
    assert_eq!(copy.target_transitions(), 1_000_000);
    assert_eq!(copy.mode(), source.mode());
    for k in 0..2 {
        assert_eq!(
            copy.waiting_queue(k).map(|q| q.iter().collect::<Vec<_>>()),
            source.waiting_queue(k).map(|q| q.iter().collect::<Vec<_>>())
        );
    }

    copy.init_empty();
    assert!(copy.state().is_empty());
    assert_eq!(copy.transitions_done(), 0);
    assert!(!copy.state_eq(source.as_ref()) || source.state().is_empty());
}

#[test]
fn test_init_from_rejects_other_dimensions() {
    let mut ctmc = build_ctmc(&two_skill_config(), CtmcVariant::Auto, false).unwrap();
    let mut single = two_skill_config();
    single.arrival_rates = vec![1.0];
    single.patience_rates = vec![0.1];
    single.balking_probabilities = None;
    single.service_rates = vec![vec![1.0, 1.0]];
    let other = build_ctmc(&single, CtmcVariant::Auto, false).unwrap();

    assert!(matches!(
        ctmc.init_from(other.as_ref()),
        Err(CtmcError::DimensionMismatch(_))
    ));
}
