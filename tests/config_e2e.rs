//! Settings files: partial JSON, validation, and live changes.

use std::fs;

use uwb_layout::{ConfigError, ManualClock, Simulation, SimulationConfig};

#[test]
fn partial_file_keeps_defaults_for_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layout.json");
    fs::write(
        &path,
        r#"{
  "physics": { "spring_constant": 0.1 },
  "lifecycle": { "stale_timeout_ms": 5000, "purge_after_ms": null },
  "seed": 42
}"#,
    )
    .unwrap();

    let config = SimulationConfig::load(&path).unwrap();
    let defaults = SimulationConfig::default();

    assert_eq!(config.physics.spring_constant, 0.1);
    assert_eq!(config.physics.damping, defaults.physics.damping);
    assert_eq!(config.lifecycle.stale_timeout_ms, 5000);
    assert_eq!(config.lifecycle.removal_timeout_ms, defaults.lifecycle.removal_timeout_ms);
    assert_eq!(config.lifecycle.purge_after_ms, None);
    assert_eq!(config.scale, defaults.scale);
    assert_eq!(config.seed, Some(42));
}

#[test]
fn bad_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        SimulationConfig::load(&missing),
        Err(ConfigError::Read { .. })
    ));

    let garbled = dir.path().join("garbled.json");
    fs::write(&garbled, "{ physics: ").unwrap();
    assert!(matches!(
        SimulationConfig::load(&garbled),
        Err(ConfigError::Parse(_))
    ));

    let inverted = dir.path().join("inverted.json");
    fs::write(&inverted, r#"{ "scale": { "scale_min": 200.0, "scale_max": 20.0 } }"#).unwrap();
    assert!(matches!(
        SimulationConfig::load(&inverted),
        Err(ConfigError::ScaleRange { .. })
    ));
}

#[test]
fn simulation_refuses_invalid_settings() {
    let mut config = SimulationConfig::default();
    config.physics.mass = 0.0;
    assert!(matches!(
        Simulation::new(config),
        Err(ConfigError::NotPositive { field: "mass", .. })
    ));

    let mut simulation = Simulation::new(SimulationConfig::default()).unwrap();
    let mut bad = SimulationConfig::default();
    bad.physics.damping = 1.5;
    assert!(simulation.set_config(bad).is_err());
    assert_eq!(simulation.config().physics.damping, SimulationConfig::default().physics.damping);
}

#[test]
fn runtime_changes_apply_on_the_next_tick() {
    let clock = ManualClock::new(0);
    let mut simulation = Simulation::new(SimulationConfig::default())
        .unwrap()
        .with_clock(clock.clone());
    simulation.submit_measurement("A", "B", 2.0, 0).unwrap();
    simulation.tick(None);

    simulation.config_mut().lifecycle.stale_timeout_ms = 1_000;
    clock.set(1_500);
    assert_eq!(
        simulation.graph().node("A").unwrap().state,
        uwb_layout::EntityState::Active
    );
    simulation.tick(None);
    assert_eq!(
        simulation.graph().node("A").unwrap().state,
        uwb_layout::EntityState::Stale
    );

    simulation.config_mut().scale.auto_scale_enabled = false;
    simulation.set_scale(1_000.0);
    assert_eq!(simulation.scale(), simulation.config().scale.scale_max);
}

#[test]
fn default_settings_round_trip_through_json() {
    let config = SimulationConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    let back: SimulationConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
