use serde::Serialize;
use tracing::{debug, info};

use crate::config::LifecycleConfig;
use crate::events::GraphEvent;
use crate::graph::{EntityState, Graph, Millis};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub active: usize,
    pub stale: usize,
    pub removed: usize,
}

impl StateCounts {
    fn record(&mut self, state: EntityState) {
        match state {
            EntityState::Active => self.active += 1,
            EntityState::Stale => self.stale += 1,
            EntityState::Removed => self.removed += 1,
        }
    }
}

pub fn state_for_age(age: Millis, config: &LifecycleConfig) -> EntityState {
    if age > config.stale_timeout_ms.saturating_add(config.removal_timeout_ms) {
        EntityState::Removed
    } else if age > config.stale_timeout_ms {
        EntityState::Stale
    } else {
        EntityState::Active
    }
}

fn purge_due(age: Millis, config: &LifecycleConfig) -> bool {
    config.purge_after_ms.is_some_and(|horizon| {
        age > config
            .stale_timeout_ms
            .saturating_add(config.removal_timeout_ms)
            .saturating_add(horizon)
    })
}

/// Advances every node and connection along Active -> Stale -> Removed.
///
/// Nodes only ever degrade here; getting back to Active takes a fresh
/// measurement. A connection takes the worse of its own timed state and its
/// endpoints' states, so it can recover when an endpoint is restored but can
/// never look healthier than either endpoint.
pub fn update_lifecycle(graph: &mut Graph, now: Millis, config: &LifecycleConfig) -> StateCounts {
    let mut events = Vec::new();
    let mut counts = StateCounts::default();
    let (nodes, connections) = graph.parts_mut();

    for node in nodes.iter_mut() {
        let timed = state_for_age(now.saturating_sub(node.last_update), config);
        let next = node.state.max(timed);
        if next != node.state {
            match next {
                EntityState::Stale => {
                    debug!(node = node.id.as_str(), "node went stale");
                    events.push(GraphEvent::NodeStale {
                        id: node.id.clone(),
                    });
                }
                EntityState::Removed => {
                    info!(node = node.id.as_str(), "node removed");
                    events.push(GraphEvent::NodeRemoved {
                        id: node.id.clone(),
                    });
                }
                EntityState::Active => {}
            }
            node.state = next;
        }
        counts.record(node.state);
    }

    for connection in connections.iter_mut() {
        let (a, b) = connection.endpoints;
        let timed = state_for_age(now.saturating_sub(connection.last_update), config);
        let next = timed.max(nodes[a].state).max(nodes[b].state);
        if next == connection.state {
            continue;
        }

        let key = connection.key.clone();
        match (connection.state, next) {
            (EntityState::Active, EntityState::Stale) => {
                events.push(GraphEvent::ConnectionStale { key });
            }
            (_, EntityState::Removed) => {
                debug!(connection = %key, "connection removed");
                events.push(GraphEvent::ConnectionRemoved { key });
            }
            (EntityState::Removed, _) => {
                debug!(connection = %key, "connection restored with its endpoints");
                events.push(GraphEvent::ConnectionRestored { key });
            }
            _ => {}
        }
        connection.state = next;
    }

    for event in events {
        graph.push_event(event);
    }

    graph.purge(
        |node| node.state == EntityState::Removed && purge_due(now.saturating_sub(node.last_update), config),
        |connection| {
            connection.state == EntityState::Removed
                && purge_due(now.saturating_sub(connection.last_update), config)
        },
    );

    counts
}
