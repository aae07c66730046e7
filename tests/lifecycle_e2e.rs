//! Active -> Stale -> Removed -> Active through the public API, driven by a
//! manual clock.

use uwb_layout::graph::EdgeKey;
use uwb_layout::{EntityState, GraphEvent, ManualClock, Simulation, SimulationConfig};

fn simulation() -> (Simulation, ManualClock) {
    let mut config = SimulationConfig::default();
    config.seed = Some(17);
    config.scale.auto_scale_enabled = false;
    config.lifecycle.stale_timeout_ms = 30_000;
    config.lifecycle.removal_timeout_ms = 30_000;
    let clock = ManualClock::new(0);
    let simulation = Simulation::new(config).unwrap().with_clock(clock.clone());
    (simulation, clock)
}

fn state_of(simulation: &Simulation, id: &str) -> EntityState {
    simulation.graph().node(id).unwrap().state
}

#[test]
fn silent_node_goes_stale_then_removed_and_restores_in_place() {
    let (mut simulation, clock) = simulation();
    let events = simulation.subscribe();
    simulation.submit_measurement("A", "B", 2.0, 0).unwrap();

    for _ in 0..600 {
        simulation.tick(None);
        clock.advance(50);
    }
    assert_eq!(clock.now_ms(), 30_000);
    simulation.tick(None);
    assert_eq!(state_of(&simulation, "A"), EntityState::Active);

    clock.set(30_001);
    simulation.tick(None);
    assert_eq!(state_of(&simulation, "A"), EntityState::Stale);
    assert_eq!(
        simulation.graph().connection("A", "B").unwrap().state,
        EntityState::Stale
    );
    let at_stale = simulation.graph().node("A").unwrap().position;

    clock.set(60_001);
    simulation.tick(None);
    assert_eq!(state_of(&simulation, "A"), EntityState::Removed);
    assert_eq!(state_of(&simulation, "B"), EntityState::Removed);
    let at_removal = simulation.graph().node("A").unwrap().position;
    assert!((at_removal - at_stale).length() < 1.0);

    clock.set(61_000);
    simulation.submit_measurement("A", "B", 2.0, 61_000).unwrap();
    let node = simulation.graph().node("A").unwrap();
    assert_eq!(node.state, EntityState::Active);
    assert!(node.has_initial_position);
    assert_eq!(node.position, at_removal);
    assert_eq!(
        simulation.graph().connection("A", "B").unwrap().state,
        EntityState::Active
    );

    simulation.tick(None);
    assert_eq!(state_of(&simulation, "A"), EntityState::Active);
    assert!((simulation.graph().node("A").unwrap().position - at_removal).length() < 1.0);

    let received = events.try_iter().collect::<Vec<_>>();
    let key = EdgeKey::new("A", "B");
    for expected in [
        GraphEvent::NodeStale { id: "A".into() },
        GraphEvent::NodeRemoved { id: "A".into() },
        GraphEvent::NodeRestored { id: "A".into() },
        GraphEvent::ConnectionStale { key: key.clone() },
        GraphEvent::ConnectionRemoved { key: key.clone() },
        GraphEvent::ConnectionRestored { key },
    ] {
        assert!(received.contains(&expected), "missing {expected:?}");
    }
}

#[test]
fn removed_nodes_are_frozen() {
    let (mut simulation, clock) = simulation();
    simulation.submit_measurement("A", "B", 2.0, 0).unwrap();
    simulation.tick(None);

    clock.set(60_001);
    simulation.tick(None);
    let frozen = simulation.snapshot_nodes();
    assert!(frozen.iter().all(|node| node.state == EntityState::Removed));

    for _ in 0..30 {
        clock.advance(16);
        simulation.tick(None);
    }
    assert_eq!(simulation.snapshot_nodes(), frozen);
}

#[test]
fn stale_endpoint_only_affects_its_own_edges() {
    let (mut simulation, clock) = simulation();
    simulation.submit_measurement("A", "B", 2.0, 0).unwrap();
    simulation.submit_measurement("C", "D", 2.0, 0).unwrap();

    clock.set(20_000);
    simulation.submit_measurement("B", "C", 1.5, 20_000).unwrap();
    simulation.submit_measurement("C", "D", 2.0, 20_000).unwrap();

    clock.set(35_000);
    simulation.tick(None);

    assert_eq!(state_of(&simulation, "A"), EntityState::Stale);
    assert_eq!(state_of(&simulation, "B"), EntityState::Active);
    let edges = simulation.snapshot_edges();
    let state_of_edge = |a: &str, b: &str| {
        edges
            .iter()
            .find(|edge| edge.id_a == a && edge.id_b == b)
            .map(|edge| edge.state)
    };
    assert_eq!(state_of_edge("A", "B"), Some(EntityState::Stale));
    assert_eq!(state_of_edge("B", "C"), Some(EntityState::Active));
    assert_eq!(state_of_edge("C", "D"), Some(EntityState::Active));
}

#[test]
fn purge_horizon_drops_long_removed_entities() {
    let (mut simulation, clock) = simulation();
    simulation.config_mut().lifecycle.purge_after_ms = Some(5_000);
    simulation.submit_measurement("A", "B", 2.0, 0).unwrap();
    simulation.submit_measurement("B", "C", 2.0, 0).unwrap();
    simulation.tick(None);

    clock.set(62_000);
    simulation.submit_measurement("B", "C", 2.0, 62_000).unwrap();
    simulation.tick(None);
    assert_eq!(simulation.graph().node_count(), 3);

    clock.set(70_000);
    simulation.tick(None);
    assert!(simulation.graph().node("A").is_none());
    assert!(simulation.graph().connection("A", "B").is_none());
    assert_eq!(simulation.graph().node_count(), 2);
    assert_eq!(state_of(&simulation, "B"), EntityState::Active);
}
