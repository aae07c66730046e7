use crate::config::{CanvasSize, ScaleConfig};
use crate::graph::{EntityState, Node};

const MAX_STEP_FRACTION: f32 = 0.1;

/// Clamps into `[scale_min, scale_max]` without panicking on inverted bounds,
/// and falls back to the initial scale if the value is not finite.
pub fn clamp_scale(scale: f32, config: &ScaleConfig) -> f32 {
    let value = if scale.is_finite() {
        scale
    } else {
        config.initial_scale
    };
    value.max(config.scale_min).min(config.scale_max)
}

/// `max(width, height)` of the bounding box around active, placed nodes.
pub fn layout_extent<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Option<f32> {
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    let mut count = 0usize;

    for node in nodes {
        if node.state != EntityState::Active || !node.has_initial_position {
            continue;
        }
        min_x = min_x.min(node.position.x);
        min_y = min_y.min(node.position.y);
        max_x = max_x.max(node.position.x);
        max_y = max_y.max(node.position.y);
        count += 1;
    }

    if count < 2 {
        return None;
    }
    let extent = (max_x - min_x).max(max_y - min_y);
    extent.is_finite().then_some(extent)
}

/// One rate-limited step toward the target screen usage. Inside the dead
/// band, or without a usable extent, only the bounds are enforced.
pub fn adjust_scale(
    scale: f32,
    current_size: Option<f32>,
    canvas: CanvasSize,
    config: &ScaleConfig,
) -> f32 {
    let scale = clamp_scale(scale, config);
    if !config.auto_scale_enabled {
        return scale;
    }
    let Some(current_size) = current_size.filter(|size| *size > 0.0) else {
        return scale;
    };

    let target_size = config.target_usage_fraction * canvas.min_side();
    let ratio = target_size / current_size;
    if !ratio.is_finite() || (ratio - 1.0).abs() <= config.dead_band {
        return scale;
    }

    let step = ((ratio - 1.0) * config.adjustment_rate).clamp(-MAX_STEP_FRACTION, MAX_STEP_FRACTION);
    clamp_scale(scale * (1.0 + step), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScaleConfig {
        ScaleConfig::default()
    }

    #[test]
    fn grows_when_layout_is_too_small() {
        let canvas = CanvasSize::default();
        let next = adjust_scale(50.0, Some(100.0), canvas, &config());
        assert!(next > 50.0);
        assert!(next <= 50.0 * (1.0 + MAX_STEP_FRACTION) + 1e-4);
    }

    #[test]
    fn shrinks_when_layout_overflows() {
        let next = adjust_scale(50.0, Some(900.0), CanvasSize::default(), &config());
        assert!(next < 50.0);
    }

    #[test]
    fn dead_band_leaves_scale_alone() {
        let canvas = CanvasSize::default();
        let target = config().target_usage_fraction * canvas.min_side();
        assert_eq!(adjust_scale(50.0, Some(target * 1.1), canvas, &config()), 50.0);
        assert_eq!(adjust_scale(50.0, None, canvas, &config()), 50.0);
        assert_eq!(adjust_scale(50.0, Some(0.0), canvas, &config()), 50.0);
    }

    #[test]
    fn extreme_extents_never_escape_bounds() {
        let canvas = CanvasSize::default();
        let config = config();
        let mut scale = 50.0;
        for _ in 0..2000 {
            scale = adjust_scale(scale, Some(1e-6), canvas, &config);
            assert!(scale >= config.scale_min && scale <= config.scale_max);
        }
        assert_eq!(scale, config.scale_max);
        for _ in 0..2000 {
            scale = adjust_scale(scale, Some(1e12), canvas, &config);
            assert!(scale >= config.scale_min && scale <= config.scale_max);
        }
        assert_eq!(scale, config.scale_min);
    }

    #[test]
    fn disabled_auto_scale_only_clamps() {
        let mut config = config();
        config.auto_scale_enabled = false;
        assert_eq!(adjust_scale(50.0, Some(1.0), CanvasSize::default(), &config), 50.0);
        assert_eq!(adjust_scale(1000.0, Some(1.0), CanvasSize::default(), &config), config.scale_max);
        assert_eq!(clamp_scale(f32::NAN, &config), config.initial_scale);
    }
}
