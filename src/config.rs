use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every tunable of the simulation. Missing fields in a config file fall back
/// to their defaults, so a file only needs the values it overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub physics: PhysicsConfig,
    pub scale: ScaleConfig,
    pub lifecycle: LifecycleConfig,
    pub canvas: CanvasSize,
    pub accuracy: AccuracyConfig,
    pub classifier: ClassifierConfig,
    /// Seed for initial placement. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub spring_constant: f32,
    /// Velocity multiplier applied every step, in `(0, 1]`.
    pub damping: f32,
    pub mass: f32,
    pub repulsion_strength: f32,
    /// Pixel range of the inverse-square repulsion.
    pub min_distance: f32,
    pub boundary_force: f32,
    pub boundary_margin_fraction: f32,
    /// Below this scale (px/m) the boundary margin shrinks proportionally.
    pub margin_shrink_scale: f32,
    pub centering_coefficient: f32,
    /// Distance from center, as a fraction of the smaller canvas side, past
    /// which the drift correction kicks in.
    pub drift_threshold_fraction: f32,
    pub drift_correction: f32,
    pub max_force: f32,
    pub max_speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            spring_constant: 0.05,
            damping: 0.88,
            mass: 1.0,
            repulsion_strength: 1800.0,
            min_distance: 30.0,
            boundary_force: 0.05,
            boundary_margin_fraction: 0.05,
            margin_shrink_scale: 10.0,
            centering_coefficient: 0.0005,
            drift_threshold_fraction: 0.4,
            drift_correction: 0.02,
            max_force: 120.0,
            max_speed: 40.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub initial_scale: f32,
    pub scale_min: f32,
    pub scale_max: f32,
    pub target_usage_fraction: f32,
    /// Relative tolerance around the target size inside which the scale is left alone.
    pub dead_band: f32,
    pub adjustment_rate: f32,
    pub auto_scale_enabled: bool,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            initial_scale: 50.0,
            scale_min: 5.0,
            scale_max: 300.0,
            target_usage_fraction: 0.6,
            dead_band: 0.15,
            adjustment_rate: 0.02,
            auto_scale_enabled: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub stale_timeout_ms: u64,
    pub removal_timeout_ms: u64,
    /// Extra time after removal before an entity is dropped from memory.
    pub purge_after_ms: Option<u64>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            stale_timeout_ms: 30_000,
            removal_timeout_ms: 30_000,
            purge_after_ms: Some(24 * 60 * 60 * 1000),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

impl CanvasSize {
    pub fn min_side(self) -> f32 {
        self.width.min(self.height)
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Plausible ranging window. Measurements outside it are shown as approximate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyConfig {
    pub plausible_min_m: f32,
    pub plausible_max_m: f32,
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self {
            plausible_min_m: 0.5,
            plausible_max_m: 8.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub gateway_ids: Vec<String>,
    pub anchor_prefixes: Vec<String>,
    pub mobile_prefixes: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            gateway_ids: vec!["B5A4".to_owned()],
            anchor_prefixes: vec!["Room".to_owned(), "R".to_owned(), "A".to_owned()],
            mobile_prefixes: vec!["T".to_owned()],
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be finite and positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    #[error("{field} must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("scale_min ({min}) exceeds scale_max ({max})")]
    ScaleRange { min: f32, max: f32 },
    #[error("plausible_min_m ({min}) exceeds plausible_max_m ({max})")]
    AccuracyRange { min: f32, max: f32 },
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON")]
    Parse(#[from] serde_json::Error),
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn within(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl SimulationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let physics = &self.physics;
        positive("spring_constant", physics.spring_constant)?;
        within("damping", physics.damping, f32::MIN_POSITIVE, 1.0)?;
        positive("mass", physics.mass)?;
        within("repulsion_strength", physics.repulsion_strength, 0.0, f32::MAX)?;
        within("min_distance", physics.min_distance, 0.0, f32::MAX)?;
        within("boundary_force", physics.boundary_force, 0.0, f32::MAX)?;
        within(
            "boundary_margin_fraction",
            physics.boundary_margin_fraction,
            0.0,
            0.45,
        )?;
        positive("margin_shrink_scale", physics.margin_shrink_scale)?;
        within(
            "centering_coefficient",
            physics.centering_coefficient,
            0.0,
            f32::MAX,
        )?;
        positive("drift_threshold_fraction", physics.drift_threshold_fraction)?;
        within("drift_correction", physics.drift_correction, 0.0, f32::MAX)?;
        positive("max_force", physics.max_force)?;
        positive("max_speed", physics.max_speed)?;

        let scale = &self.scale;
        positive("scale_min", scale.scale_min)?;
        positive("scale_max", scale.scale_max)?;
        if scale.scale_min > scale.scale_max {
            return Err(ConfigError::ScaleRange {
                min: scale.scale_min,
                max: scale.scale_max,
            });
        }
        positive("initial_scale", scale.initial_scale)?;
        within("target_usage_fraction", scale.target_usage_fraction, 0.01, 1.0)?;
        within("dead_band", scale.dead_band, 0.0, 1.0)?;
        within("adjustment_rate", scale.adjustment_rate, 0.0, 1.0)?;

        positive("canvas.width", self.canvas.width)?;
        positive("canvas.height", self.canvas.height)?;

        positive("plausible_min_m", self.accuracy.plausible_min_m)?;
        positive("plausible_max_m", self.accuracy.plausible_max_m)?;
        if self.accuracy.plausible_min_m > self.accuracy.plausible_max_m {
            return Err(ConfigError::AccuracyRange {
                min: self.accuracy.plausible_min_m,
                max: self.accuracy.plausible_max_m,
            });
        }

        Ok(())
    }
}
