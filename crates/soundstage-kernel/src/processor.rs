//! Per-tick sound processor hook.
//!
//! A processor sees an immutable [`SoundInfo`] snapshot of each spatial sound
//! and writes into a fresh [`ProcessorMultipliers`]. It never touches the
//! registry directly.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use soundstage_common::{SoundCategory, SoundHandle, SoundPriority};

/// Values a processor may adjust for one sound on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessorMultipliers {
    /// Volume multiplier.
    pub volume: f32,
    /// Pitch multiplier.
    pub pitch: f32,
    /// Low-pass cutoff in Hz; `0.0` disables the filter.
    pub low_pass_cutoff: f32,
}

impl Default for ProcessorMultipliers {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
            low_pass_cutoff: 0.0,
        }
    }
}

impl ProcessorMultipliers {
    /// Low-pass cutoff to apply, if the filter is enabled.
    #[must_use]
    pub fn low_pass(&self) -> Option<f32> {
        (self.low_pass_cutoff > 0.0).then_some(self.low_pass_cutoff)
    }
}

/// Read-only snapshot of a sound handed to a processor.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundInfo {
    /// Handle of the sound.
    pub handle: SoundHandle,
    /// Sound ID.
    pub sound_id: String,
    /// Mixing category.
    pub category: SoundCategory,
    /// Priority tier.
    pub priority: SoundPriority,
    /// World position of the sound.
    pub position: Vec3,
    /// Listener position.
    pub listener: Vec3,
    /// Distance from listener to sound.
    pub distance: f32,
    /// Volume before mixing.
    pub base_volume: f32,
    /// Pitch chosen at play time.
    pub base_pitch: f32,
    /// Seconds since the sound started.
    pub elapsed: f32,
    /// Distance at which attenuation begins.
    pub min_distance: f32,
    /// Distance at which the sound becomes silent.
    pub max_distance: f32,
}

/// Hook invoked once per tick for each spatial sound.
pub trait SoundProcessor {
    /// Adjust the multipliers for one sound.
    fn process(&mut self, info: &SoundInfo, multipliers: &mut ProcessorMultipliers);
}

impl<F> SoundProcessor for F
where
    F: FnMut(&SoundInfo, &mut ProcessorMultipliers),
{
    fn process(&mut self, info: &SoundInfo, multipliers: &mut ProcessorMultipliers) {
        self(info, multipliers);
    }
}

/// Acoustic environment presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEnvironment {
    /// Open outdoor environment.
    #[default]
    Outdoor,
    /// Cave or underground.
    Cave,
    /// Small room.
    Room,
    /// Large hall.
    Hall,
    /// Underwater - muffled sound, heavy low-pass filtering.
    Underwater,
    /// Forest - some high-frequency absorption.
    Forest,
    /// Metal interior.
    Metal,
}

impl AudioEnvironment {
    /// Get low-pass filter cutoff frequency in Hz.
    #[must_use]
    pub const fn lowpass_cutoff(self) -> f32 {
        match self {
            Self::Outdoor => 20000.0,
            Self::Cave => 8000.0,
            Self::Room => 16000.0,
            Self::Hall => 14000.0,
            Self::Underwater => 800.0,
            Self::Forest => 12000.0,
            Self::Metal => 18000.0,
        }
    }

    /// Volume multiplier for sounds heard through this environment.
    #[must_use]
    pub const fn volume_scale(self) -> f32 {
        match self {
            Self::Underwater => 0.6,
            Self::Cave | Self::Hall => 1.1,
            Self::Outdoor | Self::Room | Self::Forest | Self::Metal => 1.0,
        }
    }
}

/// Processor that filters distant sounds according to the environment.
///
/// Cutoff drops from the environment's base value toward `min_cutoff` as a
/// sound approaches its maximum distance. Outdoors nothing closer than
/// `occlusion_start` of the range is filtered.
#[derive(Debug, Clone)]
pub struct EnvironmentProcessor {
    environment: AudioEnvironment,
    min_cutoff: f32,
    occlusion_start: f32,
}

impl Default for EnvironmentProcessor {
    fn default() -> Self {
        Self::new(AudioEnvironment::Outdoor)
    }
}

impl EnvironmentProcessor {
    /// Create a processor for an environment.
    #[must_use]
    pub const fn new(environment: AudioEnvironment) -> Self {
        Self {
            environment,
            min_cutoff: 500.0,
            occlusion_start: 0.5,
        }
    }

    /// Set the lowest cutoff applied at max distance.
    #[must_use]
    pub const fn with_min_cutoff(mut self, hz: f32) -> Self {
        self.min_cutoff = hz;
        self
    }

    /// Set the fraction of the range before distance filtering begins.
    #[must_use]
    pub const fn with_occlusion_start(mut self, fraction: f32) -> Self {
        self.occlusion_start = fraction;
        self
    }

    /// Current environment.
    #[must_use]
    pub const fn environment(&self) -> AudioEnvironment {
        self.environment
    }

    /// Switch environment.
    pub fn set_environment(&mut self, environment: AudioEnvironment) {
        self.environment = environment;
    }
}

impl SoundProcessor for EnvironmentProcessor {
    fn process(&mut self, info: &SoundInfo, multipliers: &mut ProcessorMultipliers) {
        let base = self.environment.lowpass_cutoff();
        multipliers.volume *= self.environment.volume_scale();

        let range = (info.max_distance - info.min_distance).max(f32::EPSILON);
        let t = ((info.distance - info.min_distance) / range).clamp(0.0, 1.0);
        let start = self.occlusion_start.clamp(0.0, 0.99);

        let cutoff = if t <= start {
            base
        } else {
            let k = (t - start) / (1.0 - start);
            base + (self.min_cutoff.min(base) - base) * k
        };

        if self.environment != AudioEnvironment::Outdoor || t > start {
            multipliers.low_pass_cutoff = cutoff;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(distance: f32) -> SoundInfo {
        SoundInfo {
            handle: SoundHandle::new(1, 1),
            sound_id: "step".to_string(),
            category: SoundCategory::Sfx,
            priority: SoundPriority::Normal,
            position: Vec3::new(distance, 0.0, 0.0),
            listener: Vec3::ZERO,
            distance,
            base_volume: 1.0,
            base_pitch: 1.0,
            elapsed: 0.0,
            min_distance: 0.0,
            max_distance: 100.0,
        }
    }

    #[test]
    fn test_default_multipliers_are_neutral() {
        let m = ProcessorMultipliers::default();
        assert!((m.volume - 1.0).abs() < f32::EPSILON);
        assert!((m.pitch - 1.0).abs() < f32::EPSILON);
        assert_eq!(m.low_pass(), None);
    }

    #[test]
    fn test_closure_processor() {
        let mut proc = |info: &SoundInfo, m: &mut ProcessorMultipliers| {
            m.volume = 1.0 - info.distance / 100.0;
        };
        let mut m = ProcessorMultipliers::default();
        proc.process(&info(25.0), &mut m);
        assert!((m.volume - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_outdoor_near_is_unfiltered() {
        let mut proc = EnvironmentProcessor::default();
        let mut m = ProcessorMultipliers::default();
        proc.process(&info(10.0), &mut m);
        assert_eq!(m.low_pass(), None);
    }

    #[test]
    fn test_outdoor_far_is_filtered() {
        let mut proc = EnvironmentProcessor::default();
        let mut m = ProcessorMultipliers::default();
        proc.process(&info(100.0), &mut m);
        assert!((m.low_pass_cutoff - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_underwater_always_filtered() {
        let mut proc = EnvironmentProcessor::new(AudioEnvironment::Underwater);
        let mut m = ProcessorMultipliers::default();
        proc.process(&info(1.0), &mut m);
        assert!((m.low_pass_cutoff - 800.0).abs() < 1e-3);
        assert!(m.volume < 1.0);
    }
}
