//! Sound engine configuration.

use serde::{Deserialize, Serialize};
use soundstage_common::SoundCategory;
use tracing::warn;

use crate::fade::FadeCurve;
use crate::mix::{SnapshotPreset, VolumeSettings};
use crate::spatial::{AttenuationModel, DEFAULT_MAX_DISTANCE, DEFAULT_MIN_DISTANCE};

/// Configuration supplied to the engine at initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Voices created up front.
    pub initial_pool_size: usize,
    /// Hard cap on voices, and so on simultaneous sounds.
    pub max_pool_size: usize,
    /// Attenuation start distance for entries without their own.
    pub default_min_distance: f32,
    /// Silence distance for entries without their own.
    pub default_max_distance: f32,
    /// Distance rolloff model for spatial sounds.
    pub attenuation: AttenuationModel,
    /// Reject plays that violate cooldown or instance limits.
    pub enforce_cooldowns: bool,
    /// Cooldown in seconds for entries without their own.
    pub default_cooldown: f32,
    /// Simultaneous instances allowed per sound ID.
    pub max_same_sound_simultaneous: usize,
    /// Evict lower-priority sounds when the pool is full.
    pub enforce_priority: bool,
    /// Ramp music parameters instead of snapping.
    pub smooth_parameter_transitions: bool,
    /// Parameter smoothing rate in units per second.
    pub parameter_smoothing_rate: f32,
    /// Curve used by music crossfades.
    pub crossfade_curve: FadeCurve,
    /// Initial category volumes.
    pub volumes: VolumeSettings,
    /// Mix snapshot presets.
    pub snapshots: Vec<SnapshotPreset>,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            initial_pool_size: 8,
            max_pool_size: 32,
            default_min_distance: DEFAULT_MIN_DISTANCE,
            default_max_distance: DEFAULT_MAX_DISTANCE,
            attenuation: AttenuationModel::default(),
            enforce_cooldowns: true,
            default_cooldown: 0.05,
            max_same_sound_simultaneous: 4,
            enforce_priority: true,
            smooth_parameter_transitions: true,
            parameter_smoothing_rate: 2.0,
            crossfade_curve: FadeCurve::EaseInOut,
            volumes: VolumeSettings::default(),
            snapshots: Vec::new(),
        }
    }
}

impl SoundConfig {
    /// Set the pool sizes.
    #[must_use]
    pub fn with_pool_size(mut self, initial: usize, max: usize) -> Self {
        self.initial_pool_size = initial;
        self.max_pool_size = max;
        self
    }

    /// Set default attenuation distances.
    #[must_use]
    pub const fn with_distances(mut self, min: f32, max: f32) -> Self {
        self.default_min_distance = min;
        self.default_max_distance = max;
        self
    }

    /// Set the attenuation model.
    #[must_use]
    pub const fn with_attenuation(mut self, model: AttenuationModel) -> Self {
        self.attenuation = model;
        self
    }

    /// Enable or disable cooldown enforcement.
    #[must_use]
    pub const fn with_cooldowns(mut self, enforce: bool) -> Self {
        self.enforce_cooldowns = enforce;
        self
    }

    /// Set the default cooldown.
    #[must_use]
    pub const fn with_default_cooldown(mut self, seconds: f32) -> Self {
        self.default_cooldown = seconds;
        self
    }

    /// Set the per-ID instance limit.
    #[must_use]
    pub const fn with_max_same_sound(mut self, count: usize) -> Self {
        self.max_same_sound_simultaneous = count;
        self
    }

    /// Enable or disable priority eviction.
    #[must_use]
    pub const fn with_priority(mut self, enforce: bool) -> Self {
        self.enforce_priority = enforce;
        self
    }

    /// Configure music parameter smoothing.
    #[must_use]
    pub const fn with_parameter_smoothing(mut self, enabled: bool, rate: f32) -> Self {
        self.smooth_parameter_transitions = enabled;
        self.parameter_smoothing_rate = rate;
        self
    }

    /// Set the crossfade curve.
    #[must_use]
    pub const fn with_crossfade_curve(mut self, curve: FadeCurve) -> Self {
        self.crossfade_curve = curve;
        self
    }

    /// Set an initial category volume.
    #[must_use]
    pub fn with_volume(mut self, category: SoundCategory, volume: f32) -> Self {
        self.volumes.set(category, volume);
        self
    }

    /// Add a snapshot preset.
    #[must_use]
    pub fn with_snapshot(mut self, preset: SnapshotPreset) -> Self {
        self.snapshots.push(preset);
        self
    }

    /// Clamp values into their valid ranges.
    pub fn validate(&mut self) {
        if self.max_pool_size == 0 {
            warn!("max_pool_size must be at least 1, using 1");
            self.max_pool_size = 1;
        }
        if self.initial_pool_size > self.max_pool_size {
            warn!(
                "initial_pool_size {} exceeds max_pool_size {}, clamping",
                self.initial_pool_size, self.max_pool_size
            );
            self.initial_pool_size = self.max_pool_size;
        }
        self.initial_pool_size = self.initial_pool_size.max(1);

        self.default_min_distance = self.default_min_distance.max(0.0);
        if self.default_max_distance < self.default_min_distance {
            self.default_max_distance = self.default_min_distance;
        }

        self.default_cooldown = self.default_cooldown.max(0.0);
        self.max_same_sound_simultaneous = self.max_same_sound_simultaneous.max(1);
        self.parameter_smoothing_rate = self.parameter_smoothing_rate.max(0.0);
        self.volumes.clamp_all();

        for preset in &mut self.snapshots {
            for gain in preset.gains.values_mut() {
                *gain = gain.max(0.0);
            }
        }
    }
}
