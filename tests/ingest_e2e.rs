//! Ingestion boundary: validation, node identity, payload decoding, events.

use uwb_layout::feed::{PayloadError, Scenario, decode_triples};
use uwb_layout::graph::{AccuracyClass, Upsert};
use uwb_layout::{
    GraphEvent, ManualClock, NodeKind, Simulation, SimulationConfig, ValidationError,
};

fn simulation() -> (Simulation, ManualClock) {
    let mut config = SimulationConfig::default();
    config.seed = Some(3);
    let clock = ManualClock::new(0);
    let simulation = Simulation::new(config).unwrap().with_clock(clock.clone());
    (simulation, clock)
}

#[test]
fn invalid_submissions_leave_the_graph_untouched() {
    let (mut simulation, clock) = simulation();
    simulation.submit_measurement("A", "B", 2.0, 0).unwrap();
    for _ in 0..10 {
        simulation.tick(None);
        clock.advance(16);
    }
    let before = simulation.graph().clone();

    assert_eq!(
        simulation.submit_measurement("A", "A", 1.0, 200),
        Err(ValidationError::SelfLoop { id: "A".into() })
    );
    assert_eq!(
        simulation.submit_measurement("A", "B", -1.0, 200),
        Err(ValidationError::InvalidDistance { distance: -1.0 })
    );
    assert_eq!(
        simulation.submit_measurement("A", "C", 0.0, 200),
        Err(ValidationError::InvalidDistance { distance: 0.0 })
    );
    assert!(matches!(
        simulation.submit_measurement("A", "C", f32::NAN, 200),
        Err(ValidationError::InvalidDistance { .. })
    ));
    assert_eq!(
        simulation.submit_measurement("", "B", 1.0, 200),
        Err(ValidationError::EmptyId)
    );
    assert_eq!(simulation.ensure_node_exists("", 200), Err(ValidationError::EmptyId));

    assert!(*simulation.graph() == before);
    assert_eq!(simulation.diagnostics().rejected_measurements, 5);
}

#[test]
fn each_id_becomes_exactly_one_node() {
    let (mut simulation, _clock) = simulation();
    let events = simulation.subscribe();

    let star = Scenario::Star.measurements();
    for round in 0..3u64 {
        for result in simulation.submit_batch(&star, round * 100) {
            result.unwrap();
        }
    }
    simulation.submit_measurement("Node1", "Gateway", 1.5, 400).unwrap();

    assert_eq!(simulation.graph().node_count(), 6);
    assert_eq!(simulation.graph().connection_count(), 5);
    let created_gateway = events
        .try_iter()
        .filter(|event| matches!(event, GraphEvent::NodeCreated { id, .. } if id == "Gateway"))
        .count();
    assert_eq!(created_gateway, 1);
}

#[test]
fn repeated_pair_in_either_order_updates_one_connection() {
    let (mut simulation, _clock) = simulation();
    let first = simulation.submit_measurement("B5A4", "R001", 2.0, 0).unwrap();
    let second = simulation.submit_measurement("R001", "B5A4", 2.4, 100).unwrap();

    assert_eq!(first.connection, Upsert::Created);
    assert_eq!(second.connection, Upsert::Refreshed);
    let edges = simulation.snapshot_edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].id_a, "B5A4");
    assert_eq!(edges[0].id_b, "R001");
    assert_eq!(edges[0].distance_m, 2.4);
}

#[test]
fn node_kinds_come_from_the_classifier() {
    let (mut simulation, _clock) = simulation();
    simulation.submit_measurement("B5A4", "R001", 2.0, 0).unwrap();
    simulation.submit_measurement("T001", "Room2", 2.0, 0).unwrap();
    simulation.submit_measurement("T001", "Sensor", 2.0, 0).unwrap();

    let kind = |id: &str| simulation.graph().node(id).unwrap().kind;
    assert_eq!(kind("B5A4"), NodeKind::Gateway);
    assert_eq!(kind("R001"), NodeKind::Anchor);
    assert_eq!(kind("Room2"), NodeKind::Anchor);
    assert_eq!(kind("T001"), NodeKind::Mobile);
    assert_eq!(kind("Sensor"), NodeKind::Standard);
}

#[test]
fn accuracy_is_flagged_but_does_not_block_ingestion() {
    let (mut simulation, _clock) = simulation();
    for result in simulation.submit_batch(&Scenario::MixedRanges.measurements(), 0) {
        result.unwrap();
    }

    let accuracy = |simulation: &Simulation, a: &str, b: &str| {
        simulation.graph().connection(a, b).unwrap().accuracy
    };
    assert_eq!(accuracy(&simulation, "B5A4", "Close"), AccuracyClass::Accurate);
    assert_eq!(accuracy(&simulation, "B5A4", "Medium"), AccuracyClass::Accurate);
    assert_eq!(accuracy(&simulation, "B5A4", "Far"), AccuracyClass::TooFar);

    simulation.submit_measurement("Close", "Far", 0.2, 10).unwrap();
    assert_eq!(accuracy(&simulation, "Close", "Far"), AccuracyClass::TooClose);
}

#[test]
fn decoded_payload_is_submitted_entry_by_entry() {
    let (mut simulation, _clock) = simulation();
    let batch = decode_triples(r#"[["A", "B", 2.0], ["A", "A", 1.0], ["B", "C", -3]]"#).unwrap();

    let results = simulation.submit_batch(&batch, 0);

    assert!(results[0].is_ok());
    assert_eq!(results[1], Err(ValidationError::SelfLoop { id: "A".into() }));
    assert!(matches!(results[2], Err(ValidationError::InvalidDistance { .. })));
    assert_eq!(simulation.graph().node_count(), 2);
}

#[test]
fn malformed_payloads_are_rejected_before_submission() {
    assert!(matches!(decode_triples("not json"), Err(PayloadError::Json(_))));
    assert!(matches!(decode_triples(r#"{"a": 1}"#), Err(PayloadError::NotArray)));
    assert!(matches!(
        decode_triples(r#"[["A", "B"]]"#),
        Err(PayloadError::Arity { index: 0 })
    ));
    assert!(matches!(
        decode_triples(r#"[["A", "B", 1.0], ["A", "C", "far"]]"#),
        Err(PayloadError::Distance { index: 1 })
    ));
    assert!(matches!(
        decode_triples(r#"[[1, "B", 1.0]]"#),
        Err(PayloadError::Id { index: 0 })
    ));
}

#[test]
fn geo_annotation_is_stored_but_ignored_by_the_solver() {
    let (mut simulation, _clock) = simulation();
    simulation.submit_measurement("B5A4", "R001", 2.0, 0).unwrap();
    simulation.tick(None);
    let before = simulation.snapshot_nodes();

    let geo = uwb_layout::graph::GeoPoint {
        lat: 52.52,
        lng: 13.405,
    };
    assert!(simulation.set_geo("B5A4", Some(geo)));
    assert!(!simulation.set_geo("missing", Some(geo)));

    assert_eq!(simulation.graph().node("B5A4").unwrap().geo, Some(geo));
    assert_eq!(simulation.snapshot_nodes(), before);
}
