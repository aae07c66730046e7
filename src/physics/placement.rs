use std::f32::consts::TAU;

use eframe::egui::{Vec2, vec2};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::CanvasSize;
use crate::graph::{EntityState, Graph};

const SPAWN_DISC_FRACTION: f32 = 0.2;

/// Three measurements that cannot form a triangle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeometricInconsistency {
    pub nodes: [String; 3],
    /// Meters, ordered `ab`, `bc`, `ca`.
    pub distances_m: [f32; 3],
}

pub(super) fn random_disc_position(canvas: CanvasSize, rng: &mut impl Rng) -> Vec2 {
    let radius = canvas.min_side() * SPAWN_DISC_FRACTION * rng.r#gen::<f32>().sqrt();
    let angle = rng.r#gen::<f32>() * TAU;
    vec2(canvas.width, canvas.height) * 0.5 + vec2(angle.cos(), angle.sin()) * radius
}

pub(super) fn is_valid_triangle(ab: f32, bc: f32, ca: f32) -> bool {
    ab < bc + ca && bc < ab + ca && ca < ab + bc
}

/// Vertices of a triangle with side lengths `ab`, `bc`, `ca`, centered on its centroid.
pub(super) fn triangle_vertices(ab: f32, bc: f32, ca: f32) -> [Vec2; 3] {
    let a = Vec2::ZERO;
    let b = vec2(ab, 0.0);
    let cx = (ab * ab + ca * ca - bc * bc) / (2.0 * ab);
    let cy = (ca * ca - cx * cx).max(0.0).sqrt();
    let c = vec2(cx, cy);
    let centroid = (a + b + c) / 3.0;
    [a - centroid, b - centroid, c - centroid]
}

/// Gives every participating node without a position one. Three fresh nodes
/// that are fully connected are placed in closed form; everything else, and
/// any triangle violating the triangle inequality, gets a random spot near
/// the center.
pub(crate) fn place_new_nodes(
    graph: &mut Graph,
    canvas: CanvasSize,
    scale: f32,
    rng: &mut impl Rng,
) -> Option<GeometricInconsistency> {
    let pending = graph
        .nodes()
        .iter()
        .enumerate()
        .filter(|(_, node)| node.state.participates() && !node.has_initial_position)
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return None;
    }

    let mut inconsistency = None;
    if let &[a, b, c] = pending.as_slice() {
        match closed_form_triangle(graph, [a, b, c], canvas, scale) {
            Ok(()) => return None,
            Err(found) => inconsistency = found,
        }
    }

    let nodes = graph.nodes_mut();
    for index in pending {
        let node = &mut nodes[index];
        node.position = random_disc_position(canvas, rng);
        node.velocity = Vec2::ZERO;
        node.has_initial_position = true;
        debug!(node = node.id.as_str(), x = node.position.x, y = node.position.y, "node placed");
    }

    inconsistency
}

fn closed_form_triangle(
    graph: &mut Graph,
    indices: [usize; 3],
    canvas: CanvasSize,
    scale: f32,
) -> Result<(), Option<GeometricInconsistency>> {
    let ids = indices.map(|index| graph.nodes()[index].id.clone());
    let side = |first: usize, second: usize| {
        graph
            .connection(&ids[first], &ids[second])
            .filter(|connection| connection.state == EntityState::Active)
            .map(|connection| connection.distance_m)
    };
    let (Some(ab), Some(bc), Some(ca)) = (side(0, 1), side(1, 2), side(2, 0)) else {
        return Err(None);
    };

    if !is_valid_triangle(ab, bc, ca) {
        warn!(
            nodes = ?ids,
            ab, bc, ca,
            "measurements violate the triangle inequality, falling back to iterative layout"
        );
        return Err(Some(GeometricInconsistency {
            nodes: ids,
            distances_m: [ab, bc, ca],
        }));
    }

    let center = vec2(canvas.width, canvas.height) * 0.5;
    let vertices = triangle_vertices(ab * scale, bc * scale, ca * scale);
    let nodes = graph.nodes_mut();
    for (index, vertex) in indices.into_iter().zip(vertices) {
        let node = &mut nodes[index];
        node.position = center + vertex;
        node.velocity = Vec2::ZERO;
        node.has_initial_position = true;
    }
    debug!(nodes = ?ids, "triangle placed in closed form");
    Ok(())
}
