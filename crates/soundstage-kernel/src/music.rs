//! Music transport.
//!
//! Two dedicated channels, A and B, let one track fade out while the next
//! fades in. Each channel carries at most one [`Fade`]; starting a new fade
//! on a channel replaces the old one.
//!
//! ```text
//!   crossfade(next)
//!   ┌───────────┐ level 1 → 0, then stop
//!   │ channel A │───────────────────────────
//!   └───────────┘
//!   ┌───────────┐ level 0 → 1
//!   │ channel B │───────────────────────────  (becomes current)
//!   └───────────┘
//! ```

use std::sync::Arc;

use ahash::AHashMap;
use soundstage_common::{AudioClip, SoundEntry};
use tracing::debug;

use crate::backend::VoiceChannel;
use crate::fade::{Fade, FadeCurve};

/// One music playback channel.
#[derive(Debug)]
pub struct MusicChannel<V> {
    voice: V,
    entry: Option<Arc<SoundEntry>>,
    level: f32,
    fade: Option<Fade>,
}

impl<V: VoiceChannel> MusicChannel<V> {
    fn new(voice: V) -> Self {
        Self {
            voice,
            entry: None,
            level: 0.0,
            fade: None,
        }
    }

    fn load(&mut self, entry: Arc<SoundEntry>, clip: &AudioClip) {
        self.fade = None;
        self.voice.stop();
        self.voice.set_pitch(1.0);
        self.voice.start(clip, true);
        self.entry = Some(entry);
        self.level = 0.0;
    }

    fn halt(&mut self) {
        self.voice.stop();
        self.entry = None;
        self.level = 0.0;
        self.fade = None;
    }

    fn fade_to(&mut self, target: f32, duration: f32, curve: FadeCurve, stop: bool) {
        let fade = Fade::new(self.level, target, duration, curve);
        self.fade = Some(if stop { fade.stopping() } else { fade });
    }

    fn advance(&mut self, delta: f32) {
        let Some(fade) = self.fade.as_mut() else {
            return;
        };
        self.level = fade.advance(delta);
        if fade.is_complete() {
            let stop = fade.stops_on_complete();
            self.fade = None;
            if stop {
                self.halt();
            }
        }
    }

    fn apply_volume(&mut self, music_gain: f32) {
        let volume = self
            .entry
            .as_ref()
            .map_or(0.0, |entry| entry.volume * music_gain * self.level);
        self.voice.set_volume(volume);
    }

    /// Entry loaded on this channel.
    #[must_use]
    pub fn entry(&self) -> Option<&Arc<SoundEntry>> {
        self.entry.as_ref()
    }

    /// Fade level (0.0-1.0).
    #[must_use]
    pub const fn level(&self) -> f32 {
        self.level
    }

    /// The channel's voice.
    #[must_use]
    pub const fn voice(&self) -> &V {
        &self.voice
    }
}

/// A named music parameter ramping toward its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicParameter {
    /// Value currently forwarded to the backend.
    pub current: f32,
    /// Value the parameter is moving toward.
    pub target: f32,
}

/// Which channel a query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSlot {
    /// Channel A.
    A,
    /// Channel B.
    B,
}

/// Two-channel music player with named parameters.
#[derive(Debug)]
pub struct MusicTransport<V> {
    a: MusicChannel<V>,
    b: MusicChannel<V>,
    using_a: bool,
    current_id: Option<String>,
    parameters: AHashMap<String, MusicParameter>,
}

impl<V: VoiceChannel> MusicTransport<V> {
    /// Create a transport over two dedicated voices.
    #[must_use]
    pub fn new(voice_a: V, voice_b: V) -> Self {
        Self {
            a: MusicChannel::new(voice_a),
            b: MusicChannel::new(voice_b),
            using_a: true,
            current_id: None,
            parameters: AHashMap::new(),
        }
    }

    /// ID of the current track.
    #[must_use]
    pub fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    /// Whether `id` is the current track.
    #[must_use]
    pub fn is_current(&self, id: &str) -> bool {
        self.current_id.as_deref() == Some(id)
    }

    /// Slot of the current channel.
    #[must_use]
    pub const fn current_slot(&self) -> ChannelSlot {
        if self.using_a {
            ChannelSlot::A
        } else {
            ChannelSlot::B
        }
    }

    /// Access a channel.
    #[must_use]
    pub const fn channel(&self, slot: ChannelSlot) -> &MusicChannel<V> {
        match slot {
            ChannelSlot::A => &self.a,
            ChannelSlot::B => &self.b,
        }
    }

    fn current_mut(&mut self) -> &mut MusicChannel<V> {
        if self.using_a {
            &mut self.a
        } else {
            &mut self.b
        }
    }

    fn channels_mut(&mut self) -> [&mut MusicChannel<V>; 2] {
        [&mut self.a, &mut self.b]
    }

    /// Play a track on the current channel, fading in over `fade_in`.
    pub fn play(&mut self, entry: Arc<SoundEntry>, clip: &AudioClip, fade_in: f32, music_gain: f32) {
        if self.is_current(&entry.id) {
            return;
        }
        debug!("Playing music '{}' (fade in {:.2}s)", entry.id, fade_in);

        self.current_id = Some(entry.id.clone());
        let channel = self.current_mut();
        channel.load(entry, clip);
        if fade_in > 0.0 {
            channel.fade_to(1.0, fade_in, FadeCurve::Linear, false);
        } else {
            channel.level = 1.0;
        }
        channel.apply_volume(music_gain);
    }

    /// Stop the current track, fading out over `fade_out`.
    pub fn stop(&mut self, fade_out: f32) {
        let Some(id) = self.current_id.take() else {
            return;
        };
        debug!("Stopping music '{}' (fade out {:.2}s)", id, fade_out);

        let channel = self.current_mut();
        if fade_out > 0.0 {
            channel.fade_to(0.0, fade_out, FadeCurve::Linear, true);
        } else {
            channel.halt();
        }
    }

    /// Crossfade from the current track to `entry` over `time`.
    pub fn crossfade(
        &mut self,
        entry: Arc<SoundEntry>,
        clip: &AudioClip,
        time: f32,
        curve: FadeCurve,
        music_gain: f32,
    ) {
        if self.is_current(&entry.id) {
            return;
        }
        debug!("Crossfading music to '{}' over {:.2}s", entry.id, time);

        {
            let outgoing = self.current_mut();
            if time > 0.0 {
                outgoing.fade_to(0.0, time, curve, true);
            } else {
                outgoing.halt();
            }
        }

        self.using_a = !self.using_a;
        self.current_id = Some(entry.id.clone());

        let incoming = self.current_mut();
        incoming.load(entry, clip);
        if time > 0.0 {
            incoming.fade_to(1.0, time, curve, false);
        } else {
            incoming.level = 1.0;
        }

        for channel in self.channels_mut() {
            channel.apply_volume(music_gain);
        }
    }

    /// Advance fades and re-apply volumes. Fades hold while `paused`.
    pub fn update(&mut self, delta: f32, paused: bool, music_gain: f32) {
        for channel in self.channels_mut() {
            if !paused {
                channel.advance(delta);
            }
            channel.apply_volume(music_gain);
        }
    }

    /// Re-apply volumes after a mix change.
    pub fn apply_volume(&mut self, music_gain: f32) {
        for channel in self.channels_mut() {
            channel.apply_volume(music_gain);
        }
    }

    /// Pause both channels.
    pub fn pause(&mut self) {
        for channel in self.channels_mut() {
            channel.voice.pause();
        }
    }

    /// Resume both channels.
    pub fn resume(&mut self) {
        for channel in self.channels_mut() {
            channel.voice.resume();
        }
    }

    /// Stop both channels immediately.
    pub fn stop_all(&mut self) {
        self.current_id = None;
        for channel in self.channels_mut() {
            channel.halt();
        }
    }

    /// Stop any channel playing an entry from `bank`.
    pub fn stop_bank(&mut self, bank: &str) -> bool {
        let mut stopped = false;
        let mut current_stopped = false;
        let using_a = self.using_a;

        for (index, channel) in self.channels_mut().into_iter().enumerate() {
            if channel.entry.as_ref().is_some_and(|e| e.is_from_bank(bank)) {
                channel.halt();
                stopped = true;
                if (index == 0) == using_a {
                    current_stopped = true;
                }
            }
        }

        if current_stopped {
            self.current_id = None;
        }
        stopped
    }

    /// Set a parameter target, clamped to 0.0-1.0.
    ///
    /// A new parameter starts at its target; the value to forward to the
    /// backend is returned in that case.
    pub fn set_parameter(&mut self, name: &str, value: f32) -> Option<f32> {
        let value = value.clamp(0.0, 1.0);
        match self.parameters.get_mut(name) {
            Some(parameter) => {
                parameter.target = value;
                None
            },
            None => {
                self.parameters.insert(
                    name.to_string(),
                    MusicParameter {
                        current: value,
                        target: value,
                    },
                );
                Some(value)
            },
        }
    }

    /// Current value of a parameter, or 0 if unknown.
    #[must_use]
    pub fn parameter(&self, name: &str) -> f32 {
        self.parameters.get(name).map_or(0.0, |p| p.current)
    }

    /// Move parameters toward their targets and report changes.
    pub fn update_parameters<F>(&mut self, delta: f32, smooth: bool, rate: f32, mut changed: F)
    where
        F: FnMut(&str, f32),
    {
        for (name, parameter) in &mut self.parameters {
            if (parameter.current - parameter.target).abs() <= f32::EPSILON {
                continue;
            }
            if smooth {
                let step = rate * delta.max(0.0);
                let diff = parameter.target - parameter.current;
                if diff.abs() <= step {
                    parameter.current = parameter.target;
                } else {
                    parameter.current += step.copysign(diff);
                }
            } else {
                parameter.current = parameter.target;
            }
            changed(name, parameter.current);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use soundstage_common::SoundCategory;

    use super::*;
    use crate::backend::AudioBackend;
    use crate::sim_backend::{SimulatedBackend, SimulatedVoice};

    fn transport() -> MusicTransport<SimulatedVoice> {
        let mut backend = SimulatedBackend::new();
        let a = backend.create_voice().expect("voice");
        let b = backend.create_voice().expect("voice");
        MusicTransport::new(a, b)
    }

    fn track(id: &str, volume: f32) -> (Arc<SoundEntry>, AudioClip) {
        let entry = SoundEntry::new(id, SoundCategory::Music)
            .with_volume(volume)
            .with_looping(true);
        (Arc::new(entry), AudioClip::silent(id, Duration::from_secs(30)))
    }

    fn volume(t: &MusicTransport<SimulatedVoice>, slot: ChannelSlot) -> f32 {
        t.channel(slot).voice().volume()
    }

    #[test]
    fn test_play_immediate() {
        let mut t = transport();
        let (entry, clip) = track("theme", 0.8);
        t.play(entry, &clip, 0.0, 0.5);

        assert_eq!(t.current_id(), Some("theme"));
        assert!((volume(&t, ChannelSlot::A) - 0.4).abs() < 1e-5);
        assert!(!t.channel(ChannelSlot::A).voice().is_finished());
    }

    #[test]
    fn test_play_same_id_is_noop() {
        let mut t = transport();
        let (entry, clip) = track("theme", 1.0);
        t.play(Arc::clone(&entry), &clip, 1.0, 1.0);
        t.update(0.5, false, 1.0);
        t.play(entry, &clip, 1.0, 1.0);
        assert!((t.channel(ChannelSlot::A).level() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_fade_in_and_out() {
        let mut t = transport();
        let (entry, clip) = track("theme", 1.0);
        t.play(entry, &clip, 2.0, 1.0);
        assert!(volume(&t, ChannelSlot::A).abs() < 1e-5);

        t.update(1.0, false, 1.0);
        assert!((volume(&t, ChannelSlot::A) - 0.5).abs() < 1e-5);
        t.update(1.0, false, 1.0);
        assert!((volume(&t, ChannelSlot::A) - 1.0).abs() < 1e-5);

        t.stop(1.0);
        assert_eq!(t.current_id(), None);
        t.update(0.5, false, 1.0);
        assert!((volume(&t, ChannelSlot::A) - 0.5).abs() < 1e-5);
        t.update(0.5, false, 1.0);
        assert!(t.channel(ChannelSlot::A).voice().is_finished());
        assert!(t.channel(ChannelSlot::A).entry().is_none());
    }

    #[test]
    fn test_crossfade_is_conservative() {
        let mut t = transport();
        let (first, clip_1) = track("calm", 1.0);
        let (second, clip_2) = track("battle", 1.0);
        t.play(first, &clip_1, 0.0, 1.0);
        t.crossfade(second, &clip_2, 2.0, FadeCurve::Linear, 1.0);

        assert_eq!(t.current_slot(), ChannelSlot::B);
        let mut old_prev = volume(&t, ChannelSlot::A);
        let mut new_prev = volume(&t, ChannelSlot::B);
        assert!((old_prev - 1.0).abs() < 1e-5);
        assert!(new_prev.abs() < 1e-5);

        for _ in 0..2 {
            t.update(1.0, false, 1.0);
            let old = volume(&t, ChannelSlot::A);
            let new = volume(&t, ChannelSlot::B);
            assert!(old <= old_prev + 1e-6);
            assert!(new >= new_prev - 1e-6);
            assert!((old + new - 1.0).abs() < 1e-4);
            old_prev = old;
            new_prev = new;
        }

        assert!(t.channel(ChannelSlot::A).voice().is_finished());
        assert!((new_prev - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_crossfade_zero_time_cuts() {
        let mut t = transport();
        let (first, clip_1) = track("calm", 1.0);
        let (second, clip_2) = track("battle", 1.0);
        t.play(first, &clip_1, 0.0, 1.0);
        t.crossfade(second, &clip_2, 0.0, FadeCurve::Linear, 1.0);

        assert!(t.channel(ChannelSlot::A).voice().is_finished());
        assert!((volume(&t, ChannelSlot::B) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_paused_fades_hold() {
        let mut t = transport();
        let (entry, clip) = track("theme", 1.0);
        t.play(entry, &clip, 1.0, 1.0);
        t.update(0.5, true, 1.0);
        assert!(t.channel(ChannelSlot::A).level().abs() < 1e-5);
    }

    #[test]
    fn test_new_fade_replaces_old() {
        let mut t = transport();
        let (entry, clip) = track("theme", 1.0);
        t.play(entry, &clip, 1.0, 1.0);
        t.update(0.5, false, 1.0);
        t.stop(0.5);
        t.update(0.25, false, 1.0);
        assert!((t.channel(ChannelSlot::A).level() - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_stop_bank() {
        let mut t = transport();
        let entry = Arc::new(SoundEntry::new("boss", SoundCategory::Music).in_bank("level2"));
        let clip = AudioClip::silent("boss", Duration::from_secs(30));
        t.play(entry, &clip, 0.0, 1.0);

        assert!(!t.stop_bank("other"));
        assert!(t.stop_bank("level2"));
        assert_eq!(t.current_id(), None);
    }

    #[test]
    fn test_parameter_snap() {
        let mut t = transport();
        assert!(t.parameter("intensity").abs() < f32::EPSILON);
        assert_eq!(t.set_parameter("intensity", 2.0), Some(1.0));
        assert!(t.set_parameter("intensity", 0.2).is_none());

        let mut forwarded = Vec::new();
        t.update_parameters(0.1, false, 1.0, |name, v| forwarded.push((name.to_string(), v)));
        assert!((t.parameter("intensity") - 0.2).abs() < 1e-5);
        assert_eq!(forwarded.len(), 1);
    }

    #[test]
    fn test_parameter_smoothing_rate() {
        let mut t = transport();
        t.set_parameter("intensity", 0.0);
        t.set_parameter("intensity", 1.0);

        t.update_parameters(0.25, true, 2.0, |_, _| {});
        assert!((t.parameter("intensity") - 0.5).abs() < 1e-5);
        t.update_parameters(0.5, true, 2.0, |_, _| {});
        assert!((t.parameter("intensity") - 1.0).abs() < 1e-5);
    }
}
