//! Live 2D layout of radio ranging nodes.
//!
//! Pairwise distance measurements go in through [`Simulation::submit_measurement`],
//! the host drives [`Simulation::tick`] once per frame, and renderers read
//! [`Simulation::snapshot_nodes`] / [`Simulation::snapshot_edges`].

pub mod config;
pub mod events;
pub mod feed;
pub mod graph;
pub mod lifecycle;
pub mod physics;
pub mod scale;
pub mod simulation;

pub use config::{ConfigError, SimulationConfig};
pub use events::GraphEvent;
pub use graph::{EntityState, Measurement, NodeKind, ValidationError};
pub use simulation::{
    Ack, Clock, Diagnostics, EdgeSnapshot, ManualClock, MonotonicClock, NodeSnapshot,
    SharedSimulation, Simulation,
};
