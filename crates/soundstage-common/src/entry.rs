//! Static sound descriptors and clip data.
//!
//! A [`SoundEntry`] is owned by the sound library and shared read-only with
//! the engine. An [`AudioClip`] is the sample data one entry variant plays.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::category::{SoundCategory, SoundPriority};

/// Random pitch range a sound is played with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchRange {
    /// Lowest pitch multiplier.
    pub min: f32,
    /// Highest pitch multiplier.
    pub max: f32,
}

impl PitchRange {
    /// A fixed pitch with no variation.
    #[must_use]
    pub const fn fixed(pitch: f32) -> Self {
        Self {
            min: pitch,
            max: pitch,
        }
    }

    /// Create a range, swapping the bounds if they are reversed.
    #[must_use]
    pub fn new(min: f32, max: f32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Pick the pitch at `t` (0.0-1.0) through the range.
    #[must_use]
    pub fn lerp(&self, t: f32) -> f32 {
        self.min + (self.max - self.min) * t.clamp(0.0, 1.0)
    }
}

impl Default for PitchRange {
    fn default() -> Self {
        Self::fixed(1.0)
    }
}

/// Static description of a playable sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundEntry {
    /// Unique sound ID used by callers.
    pub id: String,
    /// Mixing category.
    pub category: SoundCategory,
    /// Base volume (0.0-1.0).
    pub volume: f32,
    /// Pitch randomization range.
    pub pitch: PitchRange,
    /// Whether the clip loops until stopped.
    pub looping: bool,
    /// Whether the sound is positioned in the world.
    pub spatial: bool,
    /// Distance at which attenuation starts (config default if unset).
    pub min_distance: Option<f32>,
    /// Distance at which the sound becomes inaudible (config default if unset).
    pub max_distance: Option<f32>,
    /// Priority tier for voice eviction.
    pub priority: SoundPriority,
    /// Per-sound cooldown in seconds (config default if unset).
    pub cooldown: Option<f32>,
    /// Clip variant names; one is chosen at random per play.
    pub clips: Vec<String>,
    /// Bank this entry was loaded from, if any.
    pub bank: Option<String>,
}

impl Default for SoundEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            category: SoundCategory::Sfx,
            volume: 1.0,
            pitch: PitchRange::default(),
            looping: false,
            spatial: false,
            min_distance: None,
            max_distance: None,
            priority: SoundPriority::Normal,
            cooldown: None,
            clips: Vec::new(),
            bank: None,
        }
    }
}

impl SoundEntry {
    /// Create an entry with a single clip of the same name.
    #[must_use]
    pub fn new(id: impl Into<String>, category: SoundCategory) -> Self {
        let id = id.into();
        Self {
            clips: vec![id.clone()],
            id,
            category,
            ..Self::default()
        }
    }

    /// Set the base volume.
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    /// Set the pitch range.
    #[must_use]
    pub const fn with_pitch(mut self, pitch: PitchRange) -> Self {
        self.pitch = pitch;
        self
    }

    /// Set the priority tier.
    #[must_use]
    pub const fn with_priority(mut self, priority: SoundPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the looping flag.
    #[must_use]
    pub const fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Mark the sound as spatial with the given attenuation range.
    #[must_use]
    pub const fn with_spatial(mut self, min_distance: f32, max_distance: f32) -> Self {
        self.spatial = true;
        self.min_distance = Some(min_distance);
        self.max_distance = Some(max_distance);
        self
    }

    /// Override the cooldown in seconds.
    #[must_use]
    pub const fn with_cooldown(mut self, seconds: f32) -> Self {
        self.cooldown = Some(seconds);
        self
    }

    /// Replace the clip variants.
    #[must_use]
    pub fn with_clips<I, S>(mut self, clips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clips = clips.into_iter().map(Into::into).collect();
        self
    }

    /// Tag the entry with its owning bank.
    #[must_use]
    pub fn in_bank(mut self, bank: impl Into<String>) -> Self {
        self.bank = Some(bank.into());
        self
    }

    /// Check if this entry belongs to the given bank.
    #[must_use]
    pub fn is_from_bank(&self, bank: &str) -> bool {
        self.bank.as_deref() == Some(bank)
    }
}

/// Decoded clip data ready for playback.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Clip name.
    pub name: String,
    /// Interleaved sample data. Empty for silent clips.
    pub samples: Arc<Vec<f32>>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Duration of one pass through the clip.
    pub duration: Duration,
}

impl AudioClip {
    /// Default sample rate for generated clips.
    pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

    /// Create a clip from decoded samples.
    #[must_use]
    pub fn from_samples(
        name: impl Into<String>,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels as usize;
        let duration = Duration::from_secs_f64(frames as f64 / f64::from(sample_rate.max(1)));
        Self {
            name: name.into(),
            samples: Arc::new(samples),
            sample_rate,
            channels,
            duration,
        }
    }

    /// Create a silent clip that only carries a duration.
    #[must_use]
    pub fn silent(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            samples: Arc::new(Vec::new()),
            sample_rate: Self::DEFAULT_SAMPLE_RATE,
            channels: 2,
            duration,
        }
    }

    /// Check whether the clip has sample data.
    #[must_use]
    pub fn has_samples(&self) -> bool {
        !self.samples.is_empty()
    }
}
