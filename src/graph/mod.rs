mod classify;

use std::collections::HashMap;
use std::fmt;

use eframe::egui::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::AccuracyConfig;
use crate::events::GraphEvent;

pub use classify::{NodeClassifier, NodeKind, PatternClassifier};

pub type Millis = u64;

/// Health of a node or connection. Ordered from healthiest to least healthy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityState {
    Active,
    Stale,
    Removed,
}

impl EntityState {
    pub fn participates(self) -> bool {
        self != Self::Removed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub force: Vec2,
    pub mass: f32,
    pub last_update: Millis,
    pub state: EntityState,
    pub has_initial_position: bool,
    /// Written by external collaborators; the solver never reads it.
    pub geo: Option<GeoPoint>,
}

/// Unordered node pair, stored sorted so `(a, b)` and `(b, a)` share a key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    a: String,
    b: String,
}

impl EdgeKey {
    pub fn new(id_a: &str, id_b: &str) -> Self {
        let (a, b) = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };
        Self {
            a: a.to_owned(),
            b: b.to_owned(),
        }
    }

    pub fn a(&self) -> &str {
        &self.a
    }

    pub fn b(&self) -> &str {
        &self.b
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.a, self.b)
    }
}

/// Display hint derived from the measured distance. Never fed back into the solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyClass {
    Accurate,
    TooClose,
    TooFar,
}

impl AccuracyClass {
    pub fn classify(distance_m: f32, config: &AccuracyConfig) -> Self {
        if distance_m < config.plausible_min_m {
            Self::TooClose
        } else if distance_m > config.plausible_max_m {
            Self::TooFar
        } else {
            Self::Accurate
        }
    }

    pub fn is_approximate(self) -> bool {
        self != Self::Accurate
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub key: EdgeKey,
    pub distance_m: f32,
    pub accuracy: AccuracyClass,
    pub last_update: Millis,
    pub state: EntityState,
    /// Indices of the endpoints in the node list, in key order.
    pub(crate) endpoints: (usize, usize),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id_a: String,
    pub id_b: String,
    pub distance_m: f32,
}

impl Measurement {
    pub fn new(id_a: impl Into<String>, id_b: impl Into<String>, distance_m: f32) -> Self {
        Self {
            id_a: id_a.into(),
            id_b: id_b.into(),
            distance_m,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValidationError {
    #[error("node id must not be empty")]
    EmptyId,
    #[error("measurement from {id} to itself")]
    SelfLoop { id: String },
    #[error("distance must be finite and positive, got {distance}")]
    InvalidDistance { distance: f32 },
}

pub struct IngestContext<'a> {
    pub classifier: &'a dyn NodeClassifier,
    pub accuracy: AccuracyConfig,
    pub mass: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Restored,
    Refreshed,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
    index_by_id: HashMap<String, usize>,
    connections: Vec<Connection>,
    index_by_key: HashMap<EdgeKey, usize>,
    pending_events: Vec<GraphEvent>,
}

pub fn validate_measurement(
    id_a: &str,
    id_b: &str,
    distance_m: f32,
) -> Result<(), ValidationError> {
    if id_a.is_empty() || id_b.is_empty() {
        return Err(ValidationError::EmptyId);
    }
    if id_a == id_b {
        return Err(ValidationError::SelfLoop {
            id: id_a.to_owned(),
        });
    }
    if !distance_m.is_finite() || distance_m <= 0.0 {
        return Err(ValidationError::InvalidDistance {
            distance: distance_m,
        });
    }
    Ok(())
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [Node], &mut [Connection]) {
        (&mut self.nodes, &mut self.connections)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_by_id.get(id).map(|&index| &self.nodes[index])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.index_by_id
            .get(id)
            .copied()
            .map(move |index| &mut self.nodes[index])
    }

    pub fn connection(&self, id_a: &str, id_b: &str) -> Option<&Connection> {
        self.index_by_key
            .get(&EdgeKey::new(id_a, id_b))
            .map(|&index| &self.connections[index])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub(crate) fn push_event(&mut self, event: GraphEvent) {
        self.pending_events.push(event);
    }

    pub(crate) fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Creates the node if unknown, restores it if stale or removed, and
    /// refreshes its timestamp either way.
    pub fn ensure_node_exists(
        &mut self,
        id: &str,
        timestamp: Millis,
        context: &IngestContext<'_>,
    ) -> (usize, Upsert) {
        if let Some(&index) = self.index_by_id.get(id) {
            let node = &mut self.nodes[index];
            node.last_update = node.last_update.max(timestamp);
            if node.state == EntityState::Active {
                return (index, Upsert::Refreshed);
            }

            info!(node = id, from = ?node.state, "node restored");
            node.state = EntityState::Active;
            self.pending_events.push(GraphEvent::NodeRestored { id: id.to_owned() });
            return (index, Upsert::Restored);
        }

        let kind = context.classifier.classify(id);
        debug!(node = id, kind = kind.label(), "node created");
        let index = self.nodes.len();
        self.nodes.push(Node {
            id: id.to_owned(),
            kind,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            force: Vec2::ZERO,
            mass: context.mass,
            last_update: timestamp,
            state: EntityState::Active,
            has_initial_position: false,
            geo: None,
        });
        self.index_by_id.insert(id.to_owned(), index);
        self.pending_events.push(GraphEvent::NodeCreated {
            id: id.to_owned(),
            kind,
        });
        (index, Upsert::Created)
    }

    /// Validates and upserts one measurement. On error the graph is untouched.
    pub fn update_connection(
        &mut self,
        id_a: &str,
        id_b: &str,
        distance_m: f32,
        timestamp: Millis,
        context: &IngestContext<'_>,
    ) -> Result<Upsert, ValidationError> {
        validate_measurement(id_a, id_b, distance_m)?;

        let key = EdgeKey::new(id_a, id_b);
        let (first, _) = self.ensure_node_exists(key.a(), timestamp, context);
        let (second, _) = self.ensure_node_exists(key.b(), timestamp, context);
        let accuracy = AccuracyClass::classify(distance_m, &context.accuracy);

        if let Some(&index) = self.index_by_key.get(&key) {
            let connection = &mut self.connections[index];
            connection.distance_m = distance_m;
            connection.accuracy = accuracy;
            connection.last_update = connection.last_update.max(timestamp);
            let previous = connection.state;
            connection.state = EntityState::Active;
            return Ok(match previous {
                EntityState::Active => Upsert::Refreshed,
                EntityState::Stale => Upsert::Restored,
                EntityState::Removed => {
                    info!(connection = %key, "connection restored");
                    self.pending_events
                        .push(GraphEvent::ConnectionRestored { key });
                    Upsert::Restored
                }
            });
        }

        debug!(connection = %key, distance_m, "connection created");
        self.index_by_key.insert(key.clone(), self.connections.len());
        self.connections.push(Connection {
            key: key.clone(),
            distance_m,
            accuracy,
            last_update: timestamp,
            state: EntityState::Active,
            endpoints: (first, second),
        });
        self.pending_events
            .push(GraphEvent::ConnectionCreated { key });
        Ok(Upsert::Created)
    }

    /// Drops the matching nodes along with every connection touching them,
    /// plus the matching connections. Remaining order is preserved.
    pub(crate) fn purge(
        &mut self,
        mut drop_node: impl FnMut(&Node) -> bool,
        mut drop_connection: impl FnMut(&Connection) -> bool,
    ) {
        let doomed = self
            .nodes
            .iter()
            .map(|node| drop_node(node))
            .collect::<Vec<_>>();
        if !doomed.contains(&true)
            && !self.connections.iter().any(|connection| drop_connection(connection))
        {
            return;
        }

        let mut events = Vec::new();
        let connections = std::mem::take(&mut self.connections);
        for connection in connections {
            let (a, b) = connection.endpoints;
            if doomed[a] || doomed[b] || drop_connection(&connection) {
                events.push(GraphEvent::ConnectionPurged {
                    key: connection.key,
                });
            } else {
                self.connections.push(connection);
            }
        }

        let nodes = std::mem::take(&mut self.nodes);
        for (node, purged) in nodes.into_iter().zip(doomed) {
            if purged {
                debug!(node = node.id.as_str(), "node purged");
                events.push(GraphEvent::NodePurged { id: node.id });
            } else {
                self.nodes.push(node);
            }
        }

        self.reindex();
        self.pending_events.extend(events);
    }

    fn reindex(&mut self) {
        self.index_by_id = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
        self.index_by_key.clear();
        for (index, connection) in self.connections.iter_mut().enumerate() {
            self.index_by_key.insert(connection.key.clone(), index);
            connection.endpoints = (
                self.index_by_id[connection.key.a()],
                self.index_by_id[connection.key.b()],
            );
        }
    }
}
