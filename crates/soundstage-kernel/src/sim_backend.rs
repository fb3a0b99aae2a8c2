//! Deterministic simulated backend.
//!
//! Voices produce no sound. Each one tracks a playback position against a
//! virtual clock that the backend advances on every engine update, so clip
//! completion is reproducible in headless runs and tests. Position is
//! accumulated piecewise: a pitch change only affects playback from the
//! moment it is made.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use soundstage_common::{AudioClip, SoundResult, VoiceId};
use tracing::debug;

use crate::backend::{AudioBackend, VoiceChannel};

/// Virtual clock shared between the backend and its voices.
#[derive(Debug, Clone, Default)]
pub struct SimClock(Arc<RwLock<f64>>);

impl SimClock {
    /// Current time in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        *self.0.read()
    }

    fn advance(&self, delta: f64) {
        *self.0.write() += delta.max(0.0);
    }
}

#[derive(Debug, Clone)]
struct LoadedClip {
    name: String,
    duration: f64,
    looping: bool,
    /// Position settled at `settled_at`.
    position: f64,
    /// Clock time of the last settle.
    settled_at: f64,
    paused: bool,
}

/// A voice that plays against the virtual clock.
#[derive(Debug)]
pub struct SimulatedVoice {
    id: VoiceId,
    clock: SimClock,
    clip: Option<LoadedClip>,
    volume: f32,
    pitch: f32,
    low_pass: Option<f32>,
}

impl SimulatedVoice {
    /// Name of the loaded clip.
    #[must_use]
    pub fn clip_name(&self) -> Option<&str> {
        self.clip.as_ref().map(|c| c.name.as_str())
    }

    /// Seconds of clip played so far, scaled by pitch and excluding pauses.
    #[must_use]
    pub fn position(&self) -> f64 {
        self.clip.as_ref().map_or(0.0, |clip| {
            if clip.paused {
                clip.position
            } else {
                let elapsed = (self.clock.now() - clip.settled_at).max(0.0);
                clip.position + elapsed * f64::from(self.pitch)
            }
        })
    }

    /// Fold playback since the last settle into the stored position.
    fn settle(&mut self) {
        let now = self.clock.now();
        let position = self.position();
        if let Some(clip) = self.clip.as_mut() {
            clip.position = position;
            clip.settled_at = now;
        }
    }
}

impl VoiceChannel for SimulatedVoice {
    fn id(&self) -> VoiceId {
        self.id
    }

    fn start(&mut self, clip: &AudioClip, looping: bool) {
        self.clip = Some(LoadedClip {
            name: clip.name.clone(),
            duration: clip.duration.as_secs_f64(),
            looping,
            position: 0.0,
            settled_at: self.clock.now(),
            paused: false,
        });
    }

    fn stop(&mut self) {
        self.clip = None;
    }

    fn pause(&mut self) {
        self.settle();
        if let Some(clip) = self.clip.as_mut() {
            clip.paused = true;
        }
    }

    fn resume(&mut self) {
        let now = self.clock.now();
        if let Some(clip) = self.clip.as_mut() {
            if clip.paused {
                clip.paused = false;
                clip.settled_at = now;
            }
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.settle();
        self.pitch = pitch.max(0.01);
    }

    fn pitch(&self) -> f32 {
        self.pitch
    }

    fn set_low_pass(&mut self, cutoff: Option<f32>) {
        self.low_pass = cutoff;
    }

    fn low_pass(&self) -> Option<f32> {
        self.low_pass
    }

    fn is_finished(&self) -> bool {
        match &self.clip {
            None => true,
            Some(clip) if clip.looping => false,
            Some(clip) => self.position() >= clip.duration,
        }
    }

    fn is_paused(&self) -> bool {
        self.clip.as_ref().is_some_and(|c| c.paused)
    }
}

/// Backend that simulates playback timing without an audio device.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    clock: SimClock,
    next_voice: u32,
    parameters: AHashMap<String, f32>,
}

impl SimulatedBackend {
    /// Create a new simulated backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared virtual clock.
    #[must_use]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Number of voices created so far.
    #[must_use]
    pub const fn voices_created(&self) -> u32 {
        self.next_voice
    }

    /// Last value forwarded for a mixer parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<f32> {
        self.parameters.get(name).copied()
    }
}

impl AudioBackend for SimulatedBackend {
    type Voice = SimulatedVoice;

    fn name(&self) -> &'static str {
        "simulated"
    }

    fn create_voice(&mut self) -> SoundResult<SimulatedVoice> {
        self.next_voice += 1;
        debug!("Created simulated voice {}", self.next_voice);
        Ok(SimulatedVoice {
            id: VoiceId::from_raw(self.next_voice),
            clock: self.clock.clone(),
            clip: None,
            volume: 1.0,
            pitch: 1.0,
            low_pass: None,
        })
    }

    fn update(&mut self, delta: f32) {
        self.clock.advance(f64::from(delta));
    }

    fn set_parameter(&mut self, name: &str, value: f32) {
        self.parameters.insert(name.to_string(), value);
    }
}
