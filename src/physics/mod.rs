mod forces;
mod placement;
mod quadtree;

use eframe::egui::{Vec2, vec2};

use crate::config::{CanvasSize, PhysicsConfig};
use crate::graph::Graph;
use forces::{
    CenteringParams, RepulsionParams, accumulate_repulsion, boundary_force, centering_force,
    spring_force,
};
pub use placement::GeometricInconsistency;
pub(crate) use placement::place_new_nodes;
pub use quadtree::QuadtreeCell;
use quadtree::SpatialTree;

pub const MIN_MASS: f32 = 1e-3;

#[derive(Clone, Copy, Debug)]
pub struct StepParams {
    pub physics: PhysicsConfig,
    pub canvas: CanvasSize,
    /// Pixels per meter.
    pub scale: f32,
    pub dt: f32,
}

/// Reused buffers, indexed by participant slot rather than node index.
#[derive(Default)]
pub(crate) struct PhysicsScratch {
    participants: Vec<usize>,
    slot_by_node: Vec<Option<usize>>,
    positions: Vec<Vec2>,
    forces: Vec<Vec2>,
}

/// Boundary margin per axis. At low zoom the band shrinks so the working
/// area does not collapse.
fn boundary_margin(physics: &PhysicsConfig, canvas: CanvasSize, scale: f32) -> Vec2 {
    let shrink = (scale / physics.margin_shrink_scale).clamp(0.25, 1.0);
    vec2(canvas.width, canvas.height) * (physics.boundary_margin_fraction * shrink)
}

/// Accumulates spring, repulsion, boundary and centering forces over every
/// non-removed node, then integrates with semi-implicit Euler. Returns the
/// total kinetic energy after the step.
pub(crate) fn step_physics(graph: &mut Graph, scratch: &mut PhysicsScratch, params: StepParams) -> f32 {
    let physics = params.physics;
    let (nodes, connections) = graph.parts_mut();

    scratch.participants.clear();
    scratch.slot_by_node.clear();
    scratch.slot_by_node.resize(nodes.len(), None);
    scratch.positions.clear();
    for (index, node) in nodes.iter().enumerate() {
        if node.state.participates() && node.has_initial_position {
            scratch.slot_by_node[index] = Some(scratch.participants.len());
            scratch.participants.push(index);
            scratch.positions.push(node.position);
        }
    }

    let count = scratch.participants.len();
    if count == 0 {
        return 0.0;
    }
    scratch.forces.clear();
    scratch.forces.resize(count, Vec2::ZERO);

    let positions = &scratch.positions;
    let forces = &mut scratch.forces;

    for connection in connections.iter() {
        if !connection.state.participates() {
            continue;
        }
        let (a, b) = connection.endpoints;
        let (Some(slot_a), Some(slot_b)) = (scratch.slot_by_node[a], scratch.slot_by_node[b]) else {
            continue;
        };

        let rest_length = connection.distance_m * params.scale;
        let Some(force) = spring_force(
            positions[slot_a],
            positions[slot_b],
            rest_length,
            physics.spring_constant,
        ) else {
            continue;
        };
        forces[slot_a] += force;
        forces[slot_b] -= force;
    }

    if count > 1
        && physics.min_distance > 0.0
        && physics.repulsion_strength > 0.0
        && let Some(tree) = SpatialTree::build(positions)
    {
        accumulate_repulsion(
            &tree,
            positions,
            RepulsionParams {
                strength: physics.repulsion_strength,
                min_distance: physics.min_distance,
            },
            forces,
        );
    }

    let size = vec2(params.canvas.width, params.canvas.height);
    let margin = boundary_margin(&physics, params.canvas, params.scale);
    let centering = CenteringParams {
        center: size * 0.5,
        coefficient: physics.centering_coefficient,
        drift_threshold: physics.drift_threshold_fraction * params.canvas.min_side(),
        drift_correction: physics.drift_correction,
    };
    for (slot, force) in forces.iter_mut().enumerate() {
        let position = positions[slot];
        *force += boundary_force(position, size, margin, physics.boundary_force);
        *force += centering_force(position, centering);
    }

    let damping_factor = physics.damping.clamp(0.0, 1.0).powf(params.dt);
    let max_force = physics.max_force;
    let max_speed = physics.max_speed;
    let mut kinetic_energy = 0.0;
    for (slot, &index) in scratch.participants.iter().enumerate() {
        let node = &mut nodes[index];
        let mut force = forces[slot];
        let force_magnitude = force.length();
        if force_magnitude > max_force {
            force *= max_force / force_magnitude;
        }
        node.force = force;

        let mass = node.mass.max(MIN_MASS);
        let acceleration = force / mass;
        let mut velocity = (node.velocity + acceleration * params.dt) * damping_factor;
        let speed = velocity.length();
        if speed > max_speed {
            velocity *= max_speed / speed;
        }

        let next = node.position + velocity * params.dt;
        if next.x.is_finite() && next.y.is_finite() {
            node.velocity = velocity;
            node.position = next;
        } else {
            node.velocity = Vec2::ZERO;
        }

        kinetic_energy += 0.5 * mass * node.velocity.length_sq();
        node.force = Vec2::ZERO;
    }

    kinetic_energy
}

pub fn quadtree_cells(graph: &Graph) -> Vec<QuadtreeCell> {
    let positions = graph
        .nodes()
        .iter()
        .filter(|node| node.state.participates() && node.has_initial_position)
        .map(|node| node.position)
        .collect::<Vec<_>>();

    SpatialTree::build(&positions)
        .map(|tree| tree.overlay())
        .unwrap_or_default()
}
