use eframe::egui::{Vec2, vec2};

use super::quadtree::SpatialTree;

/// Hooke spring between `a` and `b`, returned as the force on `a`.
/// Coincident endpoints have no direction, so the term is skipped.
pub(super) fn spring_force(a: Vec2, b: Vec2, rest_length: f32, spring_constant: f32) -> Option<Vec2> {
    let delta = b - a;
    let distance = delta.length();
    if distance <= 0.0 || !distance.is_finite() {
        return None;
    }
    let direction = delta / distance;
    Some(direction * (spring_constant * (distance - rest_length)))
}

#[derive(Clone, Copy)]
pub(super) struct RepulsionParams {
    pub(super) strength: f32,
    pub(super) min_distance: f32,
}

/// Short-range inverse-square repulsion over every pair closer than
/// `min_distance`. Coincident pairs have no direction and are skipped.
pub(super) fn accumulate_repulsion(
    tree: &SpatialTree,
    positions: &[Vec2],
    params: RepulsionParams,
    forces: &mut [Vec2],
) {
    let range_sq = params.min_distance * params.min_distance;
    tree.for_each_close_pair(params.min_distance, |i, j| {
        let delta = positions[i] - positions[j];
        let distance_sq = delta.length_sq();
        if distance_sq <= 0.0 || distance_sq >= range_sq {
            return;
        }
        let push = delta * (params.strength / (distance_sq * distance_sq.sqrt()));
        forces[i] += push;
        forces[j] -= push;
    });
}

/// Soft wall: pushes back proportionally to how far a node sits inside the margin band.
pub(super) fn boundary_force(position: Vec2, size: Vec2, margin: Vec2, strength: f32) -> Vec2 {
    fn axis(value: f32, size: f32, margin: f32) -> f32 {
        if value < margin {
            margin - value
        } else if value > size - margin {
            (size - margin) - value
        } else {
            0.0
        }
    }

    vec2(
        axis(position.x, size.x, margin.x),
        axis(position.y, size.y, margin.y),
    ) * strength
}

#[derive(Clone, Copy)]
pub(super) struct CenteringParams {
    pub(super) center: Vec2,
    pub(super) coefficient: f32,
    pub(super) drift_threshold: f32,
    pub(super) drift_correction: f32,
}

pub(super) fn centering_force(position: Vec2, params: CenteringParams) -> Vec2 {
    let offset = params.center - position;
    let mut force = offset * params.coefficient;

    let distance = offset.length();
    if distance > params.drift_threshold && distance > 0.0 {
        force += (offset / distance) * ((distance - params.drift_threshold) * params.drift_correction);
    }

    force
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spring_pulls_stretched_endpoints_together() {
        let force = spring_force(vec2(0.0, 0.0), vec2(10.0, 0.0), 4.0, 0.5).unwrap();
        assert!((force.x - 3.0).abs() < 1e-5);
        assert_eq!(force.y, 0.0);

        let compressed = spring_force(vec2(0.0, 0.0), vec2(2.0, 0.0), 4.0, 0.5).unwrap();
        assert!(compressed.x < 0.0);
    }

    #[test]
    fn coincident_spring_is_skipped() {
        assert!(spring_force(vec2(3.0, 3.0), vec2(3.0, 3.0), 4.0, 0.5).is_none());
    }

    #[test]
    fn repulsion_only_acts_within_range() {
        let positions = vec![vec2(0.0, 0.0), vec2(10.0, 0.0), vec2(100.0, 0.0)];
        let tree = SpatialTree::build(&positions).unwrap();
        let mut forces = vec![Vec2::ZERO; 3];
        let params = RepulsionParams {
            strength: 100.0,
            min_distance: 30.0,
        };

        accumulate_repulsion(&tree, &positions, params, &mut forces);

        assert!((forces[0].x + 1.0).abs() < 1e-5);
        assert!((forces[1].x - 1.0).abs() < 1e-5);
        assert_eq!(forces[2], Vec2::ZERO);
    }

    #[test]
    fn boundary_pushes_inward_proportionally() {
        let size = vec2(100.0, 100.0);
        let margin = vec2(10.0, 10.0);
        assert_eq!(boundary_force(vec2(50.0, 50.0), size, margin, 0.5), Vec2::ZERO);
        assert_eq!(boundary_force(vec2(4.0, 50.0), size, margin, 0.5), vec2(3.0, 0.0));
        assert_eq!(boundary_force(vec2(50.0, 96.0), size, margin, 0.5), vec2(0.0, -3.0));
    }

    #[test]
    fn drift_correction_only_beyond_threshold() {
        let params = CenteringParams {
            center: vec2(0.0, 0.0),
            coefficient: 0.01,
            drift_threshold: 50.0,
            drift_correction: 0.1,
        };
        let near = centering_force(vec2(40.0, 0.0), params);
        assert!((near.x + 0.4).abs() < 1e-5);

        let far = centering_force(vec2(60.0, 0.0), params);
        assert!((far.x + 0.6 + 1.0).abs() < 1e-5);
    }
}
