//! Playback backend abstraction.
//!
//! The engine never touches sample data. It issues start/stop/parameter
//! commands to voices created by an [`AudioBackend`], which may mix on its
//! own thread.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                  SoundEngine                   │
//! │  ┌────────────┐  ┌───────────┐  ┌───────────┐  │
//! │  │ VoicePool  │──│ Registry  │  │  Music    │  │
//! │  └────────────┘  └───────────┘  └───────────┘  │
//! │         │              │              │        │
//! │         ▼              ▼              ▼        │
//! │              VoiceChannel (trait)              │
//! └────────────────────────────────────────────────┘
//!            │                         │
//!            ▼                         ▼
//!     SimulatedBackend           RodioBackend
//! ```

use soundstage_common::{AudioClip, SoundResult, VoiceId};

/// A single playback channel.
pub trait VoiceChannel {
    /// Backend-assigned voice ID.
    fn id(&self) -> VoiceId;

    /// Start playing `clip` from the beginning, replacing whatever was loaded.
    fn start(&mut self, clip: &AudioClip, looping: bool);

    /// Stop playback and unload the clip.
    fn stop(&mut self);

    /// Pause playback, keeping the playback position.
    fn pause(&mut self);

    /// Resume a paused voice.
    fn resume(&mut self);

    /// Set the output volume (0.0-1.0).
    fn set_volume(&mut self, volume: f32);

    /// Current output volume.
    fn volume(&self) -> f32;

    /// Set the playback speed/pitch multiplier.
    fn set_pitch(&mut self, pitch: f32);

    /// Current pitch multiplier.
    fn pitch(&self) -> f32;

    /// Enable a low-pass filter at `cutoff` Hz, or disable it with `None`.
    fn set_low_pass(&mut self, cutoff: Option<f32>);

    /// Current low-pass cutoff, if filtering.
    fn low_pass(&self) -> Option<f32>;

    /// True once a non-looping clip has played out, or nothing is loaded.
    fn is_finished(&self) -> bool;

    /// Check if the voice is paused.
    fn is_paused(&self) -> bool;

    /// Clear all transient state so the voice can be reused.
    fn reset(&mut self) {
        self.stop();
        self.set_volume(1.0);
        self.set_pitch(1.0);
        self.set_low_pass(None);
    }
}

/// A mixing technology the engine can drive.
pub trait AudioBackend {
    /// Voice type created by this backend.
    type Voice: VoiceChannel;

    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Create a new voice.
    fn create_voice(&mut self) -> SoundResult<Self::Voice>;

    /// Called once per engine update before any voice is inspected.
    fn update(&mut self, _delta: f32) {}

    /// Forward a smoothed music parameter to the mixer.
    fn set_parameter(&mut self, _name: &str, _value: f32) {}
}
