use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{CanvasSize, ConfigError, SimulationConfig};
use crate::events::{EventBus, GraphEvent};
use crate::graph::{
    AccuracyClass, EntityState, GeoPoint, Graph, IngestContext, Measurement, Millis, NodeClassifier, NodeKind,
    PatternClassifier, Upsert, ValidationError,
};
use crate::lifecycle::{StateCounts, update_lifecycle};
use crate::physics::{
    GeometricInconsistency, MIN_MASS, PhysicsScratch, StepParams, place_new_nodes, step_physics,
};
use crate::scale::{adjust_scale, clamp_scale, layout_extent};

/// Integration step, in frames.
pub const FIXED_DT: f32 = 1.0;
const MIN_DT: f32 = 0.25;
const MAX_DT: f32 = 3.0;
const MAX_RECORDED_INCONSISTENCIES: usize = 32;

pub trait Clock: Send {
    fn now_ms(&self) -> Millis;
}

pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: Millis) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: Millis) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: Millis) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        ManualClock::now_ms(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ack {
    pub connection: Upsert,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub state: EntityState,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EdgeSnapshot {
    pub id_a: String,
    pub id_b: String,
    pub distance_m: f32,
    pub accuracy: AccuracyClass,
    pub state: EntityState,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub tick_count: u64,
    pub kinetic_energy: f32,
    pub nodes: StateCounts,
    pub rejected_measurements: u64,
    pub caught_panics: u64,
    /// Most recent geometric inconsistencies, oldest first. Only checked for
    /// three nodes that get their first position in the same tick; a bad
    /// side that arrives after the others are placed is left to the solver
    /// and never shows up here.
    pub inconsistencies: VecDeque<GeometricInconsistency>,
}

/// Owns the graph and every piece of per-tick state. Nothing inside runs on
/// its own: the host calls [`Simulation::tick`] once per frame and feeds
/// measurements in between.
pub struct Simulation {
    config: SimulationConfig,
    graph: Graph,
    scale: f32,
    classifier: Box<dyn NodeClassifier>,
    clock: Box<dyn Clock>,
    rng: StdRng,
    events: EventBus,
    scratch: PhysicsScratch,
    diagnostics: Diagnostics,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            scale: clamp_scale(config.scale.initial_scale, &config.scale),
            classifier: Box::new(PatternClassifier::new(config.classifier.clone())),
            clock: Box::new(MonotonicClock::new()),
            rng,
            graph: Graph::default(),
            events: EventBus::default(),
            scratch: PhysicsScratch::default(),
            diagnostics: Diagnostics::default(),
            config,
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_classifier(mut self, classifier: impl NodeClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Unchecked access for live tuning. Out-of-range values are tolerated
    /// by the next tick rather than rejected.
    pub fn config_mut(&mut self) -> &mut SimulationConfig {
        &mut self.config
    }

    pub fn set_config(&mut self, config: SimulationConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_canvas(&mut self, canvas: CanvasSize) {
        if canvas.width > 0.0 && canvas.height > 0.0 {
            self.config.canvas = canvas;
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Manual override, clamped into the configured bounds. Auto-scaling,
    /// when enabled, keeps adjusting from here.
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = clamp_scale(scale, &self.config.scale);
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn now_ms(&self) -> Millis {
        self.clock.now_ms()
    }

    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        self.events.subscribe()
    }

    pub fn set_geo(&mut self, id: &str, geo: Option<GeoPoint>) -> bool {
        match self.graph.node_mut(id) {
            Some(node) => {
                node.geo = geo;
                true
            }
            None => false,
        }
    }

    pub fn ensure_node_exists(&mut self, id: &str, timestamp: Millis) -> Result<(), ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        let context = IngestContext {
            classifier: self.classifier.as_ref(),
            accuracy: self.config.accuracy,
            mass: self.config.physics.mass.max(MIN_MASS),
        };
        self.graph.ensure_node_exists(id, timestamp, &context);
        self.flush_events();
        Ok(())
    }

    pub fn submit_measurement(
        &mut self,
        id_a: &str,
        id_b: &str,
        distance_m: f32,
        timestamp: Millis,
    ) -> Result<Ack, ValidationError> {
        let context = IngestContext {
            classifier: self.classifier.as_ref(),
            accuracy: self.config.accuracy,
            mass: self.config.physics.mass.max(MIN_MASS),
        };
        let result = self
            .graph
            .update_connection(id_a, id_b, distance_m, timestamp, &context);

        match result {
            Ok(connection) => {
                self.flush_events();
                Ok(Ack { connection })
            }
            Err(error) => {
                self.diagnostics.rejected_measurements += 1;
                debug!(id_a, id_b, distance_m, %error, "measurement rejected");
                Err(error)
            }
        }
    }

    pub fn submit_measurement_now(
        &mut self,
        id_a: &str,
        id_b: &str,
        distance_m: f32,
    ) -> Result<Ack, ValidationError> {
        let now = self.clock.now_ms();
        self.submit_measurement(id_a, id_b, distance_m, now)
    }

    /// Submits every measurement independently; one bad entry does not block the rest.
    pub fn submit_batch(
        &mut self,
        measurements: &[Measurement],
        timestamp: Millis,
    ) -> Vec<Result<Ack, ValidationError>> {
        measurements
            .iter()
            .map(|measurement| {
                self.submit_measurement(
                    &measurement.id_a,
                    &measurement.id_b,
                    measurement.distance_m,
                    timestamp,
                )
            })
            .collect()
    }

    /// Advances physics, scaling and lifecycle by one step. `dt_override` is
    /// in frames and clamped; `None` uses [`FIXED_DT`]. A panic inside the
    /// step is logged and swallowed so later ticks keep running.
    pub fn tick(&mut self, dt_override: Option<f32>) {
        let dt = dt_override
            .filter(|dt| dt.is_finite())
            .map_or(FIXED_DT, |dt| dt.clamp(MIN_DT, MAX_DT));
        let now = self.clock.now_ms();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.step(now, dt)));
        if outcome.is_err() {
            self.diagnostics.caught_panics += 1;
            warn!(tick = self.diagnostics.tick_count, "simulation step panicked; continuing");
        }
        self.flush_events();
    }

    fn step(&mut self, now: Millis, dt: f32) {
        let mass = self.config.physics.mass.max(MIN_MASS);
        for node in self.graph.nodes_mut() {
            node.mass = mass;
        }
        self.scale = clamp_scale(self.scale, &self.config.scale);

        if let Some(inconsistency) =
            place_new_nodes(&mut self.graph, self.config.canvas, self.scale, &mut self.rng)
        {
            self.record_inconsistency(inconsistency);
        }

        self.diagnostics.kinetic_energy = step_physics(
            &mut self.graph,
            &mut self.scratch,
            StepParams {
                physics: self.config.physics,
                canvas: self.config.canvas,
                scale: self.scale,
                dt,
            },
        );

        self.scale = adjust_scale(
            self.scale,
            layout_extent(self.graph.nodes()),
            self.config.canvas,
            &self.config.scale,
        );

        self.diagnostics.nodes = update_lifecycle(&mut self.graph, now, &self.config.lifecycle);
        self.diagnostics.tick_count += 1;
    }

    fn record_inconsistency(&mut self, inconsistency: GeometricInconsistency) {
        let recorded = &mut self.diagnostics.inconsistencies;
        if recorded.len() >= MAX_RECORDED_INCONSISTENCIES {
            recorded.pop_front();
        }
        recorded.push_back(inconsistency);
    }

    fn flush_events(&mut self) {
        let events = self.graph.take_events();
        self.events.publish_all(events);
    }

    pub fn snapshot_nodes(&self) -> Vec<NodeSnapshot> {
        self.graph
            .nodes()
            .iter()
            .map(|node| NodeSnapshot {
                id: node.id.clone(),
                x: node.position.x,
                y: node.position.y,
                kind: node.kind,
                state: node.state,
            })
            .collect()
    }

    pub fn snapshot_edges(&self) -> Vec<EdgeSnapshot> {
        self.graph
            .connections()
            .iter()
            .map(|connection| EdgeSnapshot {
                id_a: connection.key.a().to_owned(),
                id_b: connection.key.b().to_owned(),
                distance_m: connection.distance_m,
                accuracy: connection.accuracy,
                state: connection.state,
            })
            .collect()
    }

    /// Current pixel distance divided by scale, i.e. the layout's idea of the
    /// distance in meters.
    pub fn layout_distance_m(&self, id_a: &str, id_b: &str) -> Option<f32> {
        let a = self.graph.node(id_a)?;
        let b = self.graph.node(id_b)?;
        Some((a.position - b.position).length() / self.scale)
    }
}

/// Serializes ingestion and ticking behind one mutex for multi-threaded hosts.
#[derive(Clone)]
pub struct SharedSimulation {
    inner: Arc<Mutex<Simulation>>,
}

impl SharedSimulation {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            inner: Arc::new(Mutex::new(simulation)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Simulation> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn submit_measurement(
        &self,
        id_a: &str,
        id_b: &str,
        distance_m: f32,
        timestamp: Millis,
    ) -> Result<Ack, ValidationError> {
        self.lock()
            .submit_measurement(id_a, id_b, distance_m, timestamp)
    }

    pub fn tick(&self, dt_override: Option<f32>) {
        self.lock().tick(dt_override);
    }

    pub fn snapshot_nodes(&self) -> Vec<NodeSnapshot> {
        self.lock().snapshot_nodes()
    }

    pub fn snapshot_edges(&self) -> Vec<EdgeSnapshot> {
        self.lock().snapshot_edges()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulation() -> (Simulation, ManualClock) {
        let clock = ManualClock::new(0);
        let mut config = SimulationConfig::default();
        config.seed = Some(11);
        config.scale.auto_scale_enabled = false;
        let simulation = Simulation::new(config).unwrap().with_clock(clock.clone());
        (simulation, clock)
    }

    #[test]
    fn rejected_measurement_is_counted_not_applied() {
        let (mut simulation, _clock) = simulation();
        assert!(simulation.submit_measurement("A", "A", 1.0, 0).is_err());
        assert_eq!(simulation.graph().node_count(), 0);
        assert_eq!(simulation.diagnostics().rejected_measurements, 1);
    }

    #[test]
    fn inconsistency_log_keeps_only_the_newest_entries() {
        let (mut simulation, _clock) = simulation();
        let total = MAX_RECORDED_INCONSISTENCIES + 5;
        for round in 0..total {
            simulation.record_inconsistency(GeometricInconsistency {
                nodes: ["A".into(), "B".into(), format!("C{round}")],
                distances_m: [1.0, 1.0, 5.0],
            });
        }

        let recorded = &simulation.diagnostics().inconsistencies;
        assert_eq!(recorded.len(), MAX_RECORDED_INCONSISTENCIES);
        assert_eq!(recorded.front().unwrap().nodes[2], "C5");
        assert_eq!(recorded.back().unwrap().nodes[2], format!("C{}", total - 1));
    }

    #[test]
    fn events_reach_subscribers() {
        let (mut simulation, _clock) = simulation();
        let events = simulation.subscribe();
        simulation.submit_measurement("B5A4", "T001", 2.0, 0).unwrap();

        let received = events.try_iter().collect::<Vec<_>>();
        assert!(received.contains(&GraphEvent::NodeCreated {
            id: "B5A4".into(),
            kind: NodeKind::Gateway,
        }));
        assert!(received.contains(&GraphEvent::NodeCreated {
            id: "T001".into(),
            kind: NodeKind::Mobile,
        }));
        assert_eq!(
            received
                .iter()
                .filter(|event| matches!(event, GraphEvent::ConnectionCreated { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn dt_override_is_clamped() {
        let (mut simulation, _clock) = simulation();
        simulation.submit_measurement("A", "B", 2.0, 0).unwrap();
        simulation.tick(Some(1000.0));
        simulation.tick(Some(f32::NAN));
        simulation.tick(Some(-5.0));
        for node in simulation.snapshot_nodes() {
            assert!(node.x.is_finite() && node.y.is_finite());
        }
        assert_eq!(simulation.diagnostics().tick_count, 3);
    }

    #[test]
    fn shared_simulation_serializes_access() {
        let (simulation, _clock) = simulation();
        let shared = SharedSimulation::new(simulation);
        let feeder = shared.clone();
        let handle = std::thread::spawn(move || {
            for index in 0..50 {
                feeder
                    .submit_measurement("A", &format!("N{index}"), 1.5, 0)
                    .unwrap();
            }
        });
        for _ in 0..50 {
            shared.tick(None);
        }
        handle.join().unwrap();

        assert_eq!(shared.snapshot_nodes().len(), 51);
        assert_eq!(shared.snapshot_edges().len(), 50);
    }

    #[test]
    fn broken_runtime_config_does_not_stop_ticking() {
        let (mut simulation, _clock) = simulation();
        simulation.submit_measurement("A", "B", 2.0, 0).unwrap();
        simulation.config_mut().scale.scale_min = 500.0;
        simulation.config_mut().scale.scale_max = 10.0;
        simulation.config_mut().physics.mass = -1.0;
        for _ in 0..5 {
            simulation.tick(None);
        }
        assert_eq!(simulation.diagnostics().tick_count, 5);
        assert!(simulation.scale().is_finite());
        assert!(simulation.graph().nodes().iter().all(|node| node.mass > 0.0));
    }
}
