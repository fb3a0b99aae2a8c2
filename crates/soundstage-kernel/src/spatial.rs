//! Distance attenuation for positioned sounds.
//!
//! Sounds inside their minimum distance play at full volume. Beyond it the
//! selected [`AttenuationModel`] rolls the volume off, reaching silence at
//! the maximum distance.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Default distance at which attenuation begins.
pub const DEFAULT_MIN_DISTANCE: f32 = 1.0;

/// Default maximum hearing distance.
pub const DEFAULT_MAX_DISTANCE: f32 = 500.0;

/// Distance attenuation models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttenuationModel {
    /// No distance attenuation - constant volume up to max distance.
    None,
    /// Linear falloff from min to max distance.
    Linear,
    /// Inverse distance (min/d) falloff.
    #[default]
    Inverse,
    /// Exponential falloff - very steep dropoff.
    Exponential,
}

impl AttenuationModel {
    /// Calculate attenuation factor (0.0-1.0) for a given distance.
    #[must_use]
    pub fn calculate(self, distance: f32, min_distance: f32, max_distance: f32) -> f32 {
        let min_distance = min_distance.max(0.0);
        let max_distance = max_distance.max(min_distance);

        if distance >= max_distance && max_distance > min_distance {
            return 0.0;
        }
        if distance <= min_distance {
            return 1.0;
        }

        match self {
            Self::None => 1.0,
            Self::Linear => {
                let range = max_distance - min_distance;
                if range > 0.0 {
                    1.0 - ((distance - min_distance) / range)
                } else {
                    1.0
                }
            },
            Self::Inverse => {
                if min_distance > 0.0 {
                    min_distance / distance
                } else {
                    1.0 / (1.0 + distance)
                }
            },
            Self::Exponential => {
                // At d=2*min: ~0.37, at d=3*min: ~0.14
                let reference = min_distance.max(f32::EPSILON);
                (-(distance - min_distance) / reference).exp()
            },
        }
    }

    /// Get a human-readable name for this model.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Linear => "Linear",
            Self::Inverse => "Inverse",
            Self::Exponential => "Exponential",
        }
    }
}

/// Distance between a listener and a source.
#[must_use]
pub fn distance(listener: Vec3, source: Vec3) -> f32 {
    listener.distance(source)
}
