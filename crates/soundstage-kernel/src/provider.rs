//! Sound provider facade.
//!
//! [`SoundEngine`] ties the voice pool, registry, admission policy, music
//! transport and mix state together behind the [`SoundProvider`] contract.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──initialize──▶ Initialized ──dispose──▶ Disposed
//! ```
//!
//! Outside `Initialized` every operation is a silent no-op that returns
//! `SoundHandle::INVALID`, `false` or `0`.
//!
//! # Update order
//!
//! backend tick → snapshot weights → reclaim finished sounds → processor and
//! commit → per-sound fades → music transport.

use std::sync::Arc;

use futures::future::{ready, Ready};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use soundstage_common::{SoundCategory, SoundError, SoundHandle, SoundResult};
use tracing::{debug, info, warn};

use crate::admission::{Admission, AdmissionPolicy};
use crate::backend::{AudioBackend, VoiceChannel};
use crate::config::SoundConfig;
use crate::library::SoundLibrary;
use crate::mix::MixState;
use crate::music::{ChannelSlot, MusicTransport};
use crate::processor::{ProcessorMultipliers, SoundInfo, SoundProcessor};
use crate::registry::{ActiveSound, SoundRegistry};
use crate::spatial;
use crate::voice_pool::VoicePool;

/// Caller-facing sound playback contract.
pub trait SoundProvider {
    /// Play a sound, optionally positioned, scaled by `volume_multiplier`.
    fn play_with(&mut self, id: &str, position: Option<Vec3>, volume_multiplier: f32)
        -> SoundHandle;

    /// Play a non-positioned sound.
    fn play(&mut self, id: &str) -> SoundHandle {
        self.play_with(id, None, 1.0)
    }

    /// Play a sound at a world position.
    fn play_at(&mut self, id: &str, position: Vec3) -> SoundHandle {
        self.play_with(id, Some(position), 1.0)
    }

    /// Stop a sound. Stale or invalid handles are ignored.
    fn stop(&mut self, handle: SoundHandle);

    /// Stop every sound in a category (every sound for Master).
    fn stop_category(&mut self, category: SoundCategory);

    /// Stop every sound. Music is left alone.
    fn stop_all(&mut self);

    /// Whether a handle refers to a sound that is still playing.
    fn is_playing(&self, handle: SoundHandle) -> bool;

    /// Start a music track, fading in over `fade_in` seconds.
    fn play_music(&mut self, id: &str, fade_in: f32);

    /// Stop the current music track.
    fn stop_music(&mut self, fade_out: f32);

    /// Crossfade to another music track.
    fn crossfade_music(&mut self, id: &str, time: f32);

    /// Set a named music parameter (0.0-1.0).
    fn set_music_parameter(&mut self, name: &str, value: f32);

    /// Current value of a music parameter.
    fn get_music_parameter(&self, name: &str) -> f32;

    /// Set a category volume.
    fn set_volume(&mut self, category: SoundCategory, volume: f32);

    /// Get a category volume.
    fn get_volume(&self, category: SoundCategory) -> f32;

    /// Mute or unmute everything.
    fn set_mute(&mut self, muted: bool);

    /// Whether everything is muted.
    fn is_muted(&self) -> bool;

    /// Pause a category.
    fn pause(&mut self, category: SoundCategory);

    /// Resume a category.
    fn resume(&mut self, category: SoundCategory);

    /// Pause every category.
    fn pause_all(&mut self);

    /// Resume every category.
    fn resume_all(&mut self);

    /// Blend a mix snapshot in over `time` seconds.
    fn set_snapshot(&mut self, id: &str, time: f32);

    /// Blend a mix snapshot out over `time` seconds.
    fn clear_snapshot(&mut self, id: &str, time: f32);

    /// Blend every snapshot out.
    fn clear_all_snapshots(&mut self, time: f32);

    /// Load a bank. Resolves to `true` on success.
    fn load_bank_async(&mut self, id: &str) -> Ready<bool>;

    /// Unload a bank, stopping any of its sounds first.
    fn unload_bank(&mut self, id: &str);

    /// Whether a bank is loaded.
    fn is_bank_loaded(&self, id: &str) -> bool;

    /// Install or remove the per-tick processor.
    fn set_sound_processor(&mut self, processor: Option<Box<dyn SoundProcessor>>);

    /// Number of registered sounds.
    fn active_sound_count(&self) -> usize;

    /// Upper bound on simultaneous sounds.
    fn max_simultaneous_sounds(&self) -> usize;

    /// Advance the engine by `delta` seconds.
    fn update(&mut self, delta: f32);
}

/// Lifecycle phase of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Not yet initialized.
    #[default]
    Uninitialized,
    /// Running.
    Initialized,
    /// Shut down for good.
    Disposed,
}

/// Snapshot of engine counters for diagnostics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// Lifecycle phase.
    pub state: EngineState,
    /// Backend name.
    pub backend: String,
    /// Engine clock in seconds.
    pub clock: f64,
    /// Registered sounds.
    pub active_sounds: usize,
    /// Upper bound on simultaneous sounds.
    pub max_sounds: usize,
    /// Voices created by the pool.
    pub voices_created: usize,
    /// Voices idle in the pool.
    pub voices_idle: usize,
    /// Current music track.
    pub music: Option<String>,
    /// Mute flag.
    pub muted: bool,
    /// Paused categories.
    pub paused: Vec<SoundCategory>,
    /// Active snapshots and their blend weights.
    pub snapshots: Vec<SnapshotLevel>,
    /// Plays that got a voice.
    pub plays_admitted: u64,
    /// Plays denied by cooldown, priority or pool exhaustion.
    pub plays_rejected: u64,
    /// Sounds stopped to make room for higher priorities.
    pub evictions: u64,
}

/// A snapshot contributing to the mix.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotLevel {
    /// Preset name.
    pub name: String,
    /// Current blend weight in `[0, 1]`.
    pub weight: f32,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    admitted: u64,
    rejected: u64,
    evictions: u64,
}

/// Everything that exists only while the engine is initialized.
struct EngineCore<V> {
    config: SoundConfig,
    pool: VoicePool<V>,
    registry: SoundRegistry<V>,
    admission: AdmissionPolicy,
    music: MusicTransport<V>,
    mix: MixState,
    music_paused: bool,
    clock: f64,
    counters: Counters,
}

enum Lifecycle<V> {
    Uninitialized,
    Initialized(Box<EngineCore<V>>),
    Disposed,
}

fn attenuation_range<V>(sound: &ActiveSound<V>, config: &SoundConfig) -> (f32, f32) {
    let min = sound.entry.min_distance.unwrap_or(config.default_min_distance);
    let max = sound.entry.max_distance.unwrap_or(config.default_max_distance);
    (min, max.max(min))
}

fn sound_volume<V>(sound: &ActiveSound<V>, mix: &MixState) -> f32 {
    sound.base_volume
        * mix.effective(sound.category())
        * sound.multipliers.volume
        * sound.fade.level
        * sound.attenuation
}

impl<V: VoiceChannel> EngineCore<V> {
    /// Recompute attenuation and push volume, pitch and filter to the voice.
    fn commit(sound: &mut ActiveSound<V>, mix: &MixState, config: &SoundConfig, listener: Vec3) {
        sound.attenuation = match sound.position {
            Some(position) if sound.is_spatial() => {
                let (min, max) = attenuation_range(sound, config);
                config
                    .attenuation
                    .calculate(spatial::distance(listener, position), min, max)
            },
            _ => 1.0,
        };

        let volume = sound_volume(sound, mix);
        sound.voice.set_volume(volume);
        sound.voice.set_pitch(sound.base_pitch * sound.multipliers.pitch);
        sound.voice.set_low_pass(sound.multipliers.low_pass());
    }

    fn retire(&mut self, sound: ActiveSound<V>) {
        debug!("Sound {} '{}' ended", sound.handle, sound.id());
        self.admission.on_remove(&sound.entry.id);
        self.pool.release(sound.voice);
    }

    fn stop_sound(&mut self, handle: SoundHandle) -> bool {
        match self.registry.unregister(handle) {
            Some(sound) => {
                self.retire(sound);
                true
            },
            None => false,
        }
    }

    fn stop_where<F>(&mut self, pred: F) -> usize
    where
        F: FnMut(&ActiveSound<V>) -> bool,
    {
        let removed = self.registry.remove_where(pred);
        let count = removed.len();
        for sound in removed {
            self.retire(sound);
        }
        count
    }

    /// Re-apply volumes after a category volume change.
    fn refresh_volumes(&mut self, category: SoundCategory) {
        let mix = &self.mix;
        for sound in self.registry.iter_mut() {
            if category == SoundCategory::Master || sound.category() == category {
                sound.voice.set_volume(sound_volume(sound, mix));
            }
        }
        if matches!(category, SoundCategory::Master | SoundCategory::Music) {
            self.music.apply_volume(mix.effective(SoundCategory::Music));
        }
    }

    /// Bring voice pause state in line with the mix state.
    fn sync_pause(&mut self) {
        let mix = &self.mix;
        for sound in self.registry.iter_mut() {
            let paused = mix.is_paused(sound.category());
            if paused != sound.paused {
                if paused {
                    sound.voice.pause();
                } else {
                    sound.voice.resume();
                }
                sound.paused = paused;
            }
        }

        let music_paused = mix.is_paused(SoundCategory::Music);
        if music_paused != self.music_paused {
            if music_paused {
                self.music.pause();
            } else {
                self.music.resume();
            }
            self.music_paused = music_paused;
        }
    }

    fn shutdown(&mut self) {
        let removed = self.registry.remove_where(|_| true);
        for sound in removed {
            self.retire(sound);
        }
        self.music.stop_all();
        self.pool.clear();
        self.admission.clear();
    }
}

/// Sound engine over a playback backend and a sound library.
pub struct SoundEngine<B: AudioBackend> {
    backend: B,
    library: Box<dyn SoundLibrary>,
    processor: Option<Box<dyn SoundProcessor>>,
    listener: Vec3,
    state: Lifecycle<B::Voice>,
}

impl<B: AudioBackend> std::fmt::Debug for SoundEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundEngine")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .field("listener", &self.listener)
            .field("has_processor", &self.processor.is_some())
            .finish_non_exhaustive()
    }
}

impl<B: AudioBackend> SoundEngine<B> {
    /// Create an uninitialized engine.
    pub fn new(backend: B, library: impl SoundLibrary + 'static) -> Self {
        Self {
            backend,
            library: Box::new(library),
            processor: None,
            listener: Vec3::ZERO,
            state: Lifecycle::Uninitialized,
        }
    }

    /// Build the pool, transport and mix state.
    pub fn initialize(&mut self, mut config: SoundConfig) -> SoundResult<()> {
        match self.state {
            Lifecycle::Initialized(_) => return Err(SoundError::AlreadyInitialized),
            Lifecycle::Disposed => return Err(SoundError::Disposed),
            Lifecycle::Uninitialized => {},
        }

        config.validate();
        let pool = VoicePool::new(
            &mut self.backend,
            config.initial_pool_size,
            config.max_pool_size,
        )?;
        let music = MusicTransport::new(self.backend.create_voice()?, self.backend.create_voice()?);
        let mix = MixState::new(config.volumes.clone(), &config.snapshots);

        info!(
            "Sound engine initialized on {} backend ({} voices, max {})",
            self.backend.name(),
            pool.capacity(),
            pool.max_size()
        );

        self.state = Lifecycle::Initialized(Box::new(EngineCore {
            registry: SoundRegistry::with_capacity(config.max_pool_size),
            config,
            pool,
            admission: AdmissionPolicy::new(),
            music,
            mix,
            music_paused: false,
            clock: 0.0,
            counters: Counters::default(),
        }));
        Ok(())
    }

    /// Stop everything and release all voices. The engine cannot be
    /// initialized again.
    pub fn dispose(&mut self) {
        if let Lifecycle::Initialized(core) = &mut self.state {
            core.shutdown();
            info!("Sound engine disposed");
        }
        self.processor = None;
        self.state = Lifecycle::Disposed;
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        match self.state {
            Lifecycle::Uninitialized => EngineState::Uninitialized,
            Lifecycle::Initialized(_) => EngineState::Initialized,
            Lifecycle::Disposed => EngineState::Disposed,
        }
    }

    /// Whether the engine is running.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        matches!(self.state, Lifecycle::Initialized(_))
    }

    /// The playback backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The sound library.
    #[must_use]
    pub fn library(&self) -> &dyn SoundLibrary {
        self.library.as_ref()
    }

    fn core(&self) -> Option<&EngineCore<B::Voice>> {
        match &self.state {
            Lifecycle::Initialized(core) => Some(&**core),
            _ => None,
        }
    }

    fn core_mut(&mut self) -> Option<&mut EngineCore<B::Voice>> {
        match &mut self.state {
            Lifecycle::Initialized(core) => Some(&mut **core),
            _ => None,
        }
    }

    /// Listener position used for distance attenuation.
    #[must_use]
    pub const fn listener_position(&self) -> Vec3 {
        self.listener
    }

    /// Move the listener.
    pub fn set_listener_position(&mut self, position: Vec3) {
        self.listener = position;
    }

    /// Move a playing sound.
    pub fn set_sound_position(&mut self, handle: SoundHandle, position: Vec3) -> bool {
        let Some(core) = self.core_mut() else {
            return false;
        };
        match core.registry.get_mut(handle) {
            Some(sound) => {
                sound.position = Some(position);
                true
            },
            None => false,
        }
    }

    /// Fade a sound's level toward `target` over `duration` seconds.
    pub fn fade_sound(&mut self, handle: SoundHandle, target: f32, duration: f32) -> bool {
        let Some(core) = self.core_mut() else {
            return false;
        };
        match core.registry.get_mut(handle) {
            Some(sound) => {
                sound.fade.fade_to(target, duration, false);
                true
            },
            None => false,
        }
    }

    /// Fade a sound out and stop it once silent.
    pub fn stop_with_fade(&mut self, handle: SoundHandle, duration: f32) -> bool {
        if duration <= 0.0 {
            let stopped = self.is_playing(handle);
            self.stop(handle);
            return stopped;
        }
        let Some(core) = self.core_mut() else {
            return false;
        };
        match core.registry.get_mut(handle) {
            Some(sound) => {
                sound.fade.fade_to(0.0, duration, true);
                true
            },
            None => false,
        }
    }

    /// ID of the current music track.
    #[must_use]
    pub fn current_music(&self) -> Option<&str> {
        self.core().and_then(|core| core.music.current_id())
    }

    /// Voice-level volume of an active sound, after mixing.
    #[must_use]
    pub fn sound_volume(&self, handle: SoundHandle) -> Option<f32> {
        let core = self.core()?;
        core.registry.get(handle).map(|sound| sound.voice.volume())
    }

    /// Music channel voices, current channel first.
    pub fn music_voices(&self) -> Option<(&B::Voice, &B::Voice)> {
        let core = self.core()?;
        let current = core.music.current_slot();
        let other = match current {
            ChannelSlot::A => ChannelSlot::B,
            ChannelSlot::B => ChannelSlot::A,
        };
        Some((
            core.music.channel(current).voice(),
            core.music.channel(other).voice(),
        ))
    }

    /// Diagnostic counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let mut stats = EngineStats {
            state: self.state(),
            backend: self.backend.name().to_string(),
            ..EngineStats::default()
        };

        if let Some(core) = self.core() {
            let mut paused: Vec<_> = core.mix.paused_categories().collect();
            paused.sort_by_key(|category| *category as u8);

            stats.clock = core.clock;
            stats.active_sounds = core.registry.len();
            stats.max_sounds = core.pool.max_size();
            stats.voices_created = core.pool.capacity();
            stats.voices_idle = core.pool.idle_count();
            stats.music = core.music.current_id().map(str::to_string);
            stats.muted = core.mix.is_muted();
            stats.paused = paused;
            stats.snapshots = core
                .mix
                .active_snapshots()
                .map(|name| SnapshotLevel {
                    name: name.to_string(),
                    weight: core.mix.snapshot_weight(name),
                })
                .collect();
            stats.plays_admitted = core.counters.admitted;
            stats.plays_rejected = core.counters.rejected;
            stats.evictions = core.counters.evictions;
        }
        stats
    }
}

impl<B: AudioBackend> SoundProvider for SoundEngine<B> {
    fn play_with(
        &mut self,
        id: &str,
        position: Option<Vec3>,
        volume_multiplier: f32,
    ) -> SoundHandle {
        let Lifecycle::Initialized(core) = &mut self.state else {
            debug!("play('{}') ignored: engine not initialized", id);
            return SoundHandle::INVALID;
        };
        let core = &mut **core;

        if core.mix.is_muted() {
            debug!("play('{}') ignored: muted", id);
            return SoundHandle::INVALID;
        }

        let Some(entry) = self.library.get(id) else {
            warn!("Sound '{}' not found", id);
            return SoundHandle::INVALID;
        };
        let Some(clip) = self.library.random_clip(&entry) else {
            warn!("Sound '{}' has no playable clip", id);
            return SoundHandle::INVALID;
        };

        if !core.admission.cooldown_allows(&entry, core.clock, &core.config) {
            core.counters.rejected += 1;
            return SoundHandle::INVALID;
        }

        let capacity = core.pool.max_size();
        match AdmissionPolicy::priority_gate(entry.priority, &core.registry, capacity, &core.config)
        {
            Admission::Admit => {},
            Admission::Evict(victim) => {
                core.stop_sound(victim);
                core.counters.evictions += 1;
            },
            Admission::Reject => {
                core.counters.rejected += 1;
                return SoundHandle::INVALID;
            },
        }

        let Some(mut voice) = core.pool.acquire(&mut self.backend) else {
            warn!("Voice pool exhausted, dropping '{}'", id);
            core.counters.rejected += 1;
            return SoundHandle::INVALID;
        };

        let pitch = self.library.random_pitch(&entry);
        voice.set_pitch(pitch);
        voice.start(&clip, entry.looping);

        let mut sound = ActiveSound::new(Arc::clone(&entry), voice, core.clock);
        sound.position = position;
        sound.base_volume = entry.volume * volume_multiplier.max(0.0);
        sound.base_pitch = pitch;
        EngineCore::commit(&mut sound, &core.mix, &core.config, self.listener);

        if core.mix.is_paused(entry.category) {
            sound.voice.pause();
            sound.paused = true;
        }

        let handle = core.registry.register(sound);
        core.admission.on_register(&entry.id);
        core.admission.record_play(&entry.id, core.clock);
        core.counters.admitted += 1;

        debug!("Playing '{}' as {} (clip '{}')", id, handle, clip.name);
        handle
    }

    fn stop(&mut self, handle: SoundHandle) {
        if let Some(core) = self.core_mut() {
            core.stop_sound(handle);
        }
    }

    fn stop_category(&mut self, category: SoundCategory) {
        if let Some(core) = self.core_mut() {
            let count = core.stop_where(|sound| {
                category == SoundCategory::Master || sound.category() == category
            });
            debug!("Stopped {} {} sounds", count, category);
        }
    }

    fn stop_all(&mut self) {
        self.stop_category(SoundCategory::Master);
    }

    fn is_playing(&self, handle: SoundHandle) -> bool {
        self.core().is_some_and(|core| {
            core.registry
                .get(handle)
                .is_some_and(|sound| sound.paused || !sound.voice.is_finished())
        })
    }

    fn play_music(&mut self, id: &str, fade_in: f32) {
        let Lifecycle::Initialized(core) = &mut self.state else {
            return;
        };
        if core.music.is_current(id) {
            return;
        }
        let Some(entry) = self.library.get(id) else {
            warn!("Music '{}' not found", id);
            return;
        };
        let Some(clip) = self.library.random_clip(&entry) else {
            warn!("Music '{}' has no playable clip", id);
            return;
        };

        let gain = core.mix.effective(SoundCategory::Music);
        core.music.play(entry, &clip, fade_in, gain);
        if core.music_paused {
            core.music.pause();
        }
    }

    fn stop_music(&mut self, fade_out: f32) {
        if let Some(core) = self.core_mut() {
            core.music.stop(fade_out);
        }
    }

    fn crossfade_music(&mut self, id: &str, time: f32) {
        let Lifecycle::Initialized(core) = &mut self.state else {
            return;
        };
        if core.music.is_current(id) {
            return;
        }
        let Some(entry) = self.library.get(id) else {
            warn!("Music '{}' not found", id);
            return;
        };
        let Some(clip) = self.library.random_clip(&entry) else {
            warn!("Music '{}' has no playable clip", id);
            return;
        };

        let gain = core.mix.effective(SoundCategory::Music);
        let curve = core.config.crossfade_curve;
        core.music.crossfade(entry, &clip, time, curve, gain);
        if core.music_paused {
            core.music.pause();
        }
    }

    fn set_music_parameter(&mut self, name: &str, value: f32) {
        let Lifecycle::Initialized(core) = &mut self.state else {
            return;
        };
        if let Some(initial) = core.music.set_parameter(name, value) {
            self.backend.set_parameter(name, initial);
        }
    }

    fn get_music_parameter(&self, name: &str) -> f32 {
        self.core().map_or(0.0, |core| core.music.parameter(name))
    }

    fn set_volume(&mut self, category: SoundCategory, volume: f32) {
        if let Some(core) = self.core_mut() {
            core.mix.set_volume(category, volume);
            core.refresh_volumes(category);
            debug!("{} volume set to {:.2}", category, core.mix.volume(category));
        }
    }

    fn get_volume(&self, category: SoundCategory) -> f32 {
        self.core().map_or(0.0, |core| core.mix.volume(category))
    }

    fn set_mute(&mut self, muted: bool) {
        if let Some(core) = self.core_mut() {
            if core.mix.set_muted(muted) {
                core.sync_pause();
                info!("Sound {}", if muted { "muted" } else { "unmuted" });
            }
        }
    }

    fn is_muted(&self) -> bool {
        self.core().is_some_and(|core| core.mix.is_muted())
    }

    fn pause(&mut self, category: SoundCategory) {
        if category == SoundCategory::Master {
            self.pause_all();
            return;
        }
        if let Some(core) = self.core_mut() {
            if core.mix.pause(category) {
                core.sync_pause();
                debug!("Paused {}", category);
            }
        }
    }

    fn resume(&mut self, category: SoundCategory) {
        if category == SoundCategory::Master {
            self.resume_all();
            return;
        }
        if let Some(core) = self.core_mut() {
            if core.mix.resume(category) {
                core.sync_pause();
                debug!("Resumed {}", category);
            }
        }
    }

    fn pause_all(&mut self) {
        if let Some(core) = self.core_mut() {
            for category in SoundCategory::PLAYABLE {
                core.mix.pause(category);
            }
            core.sync_pause();
        }
    }

    fn resume_all(&mut self) {
        if let Some(core) = self.core_mut() {
            for category in SoundCategory::PLAYABLE {
                core.mix.resume(category);
            }
            core.sync_pause();
        }
    }

    fn set_snapshot(&mut self, id: &str, time: f32) {
        if let Some(core) = self.core_mut() {
            core.mix.set_snapshot(id, time);
        }
    }

    fn clear_snapshot(&mut self, id: &str, time: f32) {
        if let Some(core) = self.core_mut() {
            core.mix.clear_snapshot(id, time);
        }
    }

    fn clear_all_snapshots(&mut self, time: f32) {
        if let Some(core) = self.core_mut() {
            core.mix.clear_all_snapshots(time);
        }
    }

    fn load_bank_async(&mut self, id: &str) -> Ready<bool> {
        if !self.is_initialized() {
            return ready(false);
        }
        ready(self.library.load_bank(id))
    }

    fn unload_bank(&mut self, id: &str) {
        let Lifecycle::Initialized(core) = &mut self.state else {
            return;
        };
        let stopped = core.stop_where(|sound| sound.entry.is_from_bank(id));
        let music_stopped = core.music.stop_bank(id);
        if stopped > 0 || music_stopped {
            debug!(
                "Unloading bank '{}' stopped {} sounds{}",
                id,
                stopped,
                if music_stopped { " and music" } else { "" }
            );
        }
        self.library.unload_bank(id);
    }

    fn is_bank_loaded(&self, id: &str) -> bool {
        self.is_initialized() && self.library.is_bank_loaded(id)
    }

    fn set_sound_processor(&mut self, processor: Option<Box<dyn SoundProcessor>>) {
        if self.is_initialized() {
            self.processor = processor;
        }
    }

    fn active_sound_count(&self) -> usize {
        self.core().map_or(0, |core| core.registry.len())
    }

    fn max_simultaneous_sounds(&self) -> usize {
        self.core().map_or(0, |core| core.pool.max_size())
    }

    fn update(&mut self, delta: f32) {
        let Lifecycle::Initialized(core) = &mut self.state else {
            return;
        };
        let core = &mut **core;
        let delta = delta.max(0.0);

        self.backend.update(delta);
        core.clock += f64::from(delta);
        core.mix.advance(delta);

        // Reclaim finished sounds; paused voices never count as finished.
        let mix = &core.mix;
        let finished = core
            .registry
            .remove_where(|sound| !mix.is_paused(sound.category()) && sound.voice.is_finished());
        for sound in finished {
            core.retire(sound);
        }

        // Processor and commit.
        let listener = self.listener;
        let clock = core.clock;
        for sound in core.registry.iter_mut() {
            sound.multipliers = ProcessorMultipliers::default();
            if let (Some(processor), Some(position)) = (self.processor.as_mut(), sound.position) {
                if sound.is_spatial() {
                    let (min_distance, max_distance) = attenuation_range(sound, &core.config);
                    let info = SoundInfo {
                        handle: sound.handle,
                        sound_id: sound.entry.id.clone(),
                        category: sound.category(),
                        priority: sound.priority(),
                        position,
                        listener,
                        distance: spatial::distance(listener, position),
                        base_volume: sound.base_volume,
                        base_pitch: sound.base_pitch,
                        elapsed: (clock - sound.start_time) as f32,
                        min_distance,
                        max_distance,
                    };
                    processor.process(&info, &mut sound.multipliers);
                }
            }
            EngineCore::commit(sound, &core.mix, &core.config, listener);
        }

        // Per-sound fades.
        let mut silenced = Vec::new();
        for sound in core.registry.iter_mut() {
            if !sound.paused && !sound.fade.complete {
                sound.fade.advance(delta);
                sound.voice.set_volume(sound_volume(sound, &core.mix));
            }
            if sound.fade.should_stop() {
                silenced.push(sound.handle);
            }
        }
        for handle in silenced {
            core.stop_sound(handle);
        }

        // Music transport and parameters.
        let music_gain = core.mix.effective(SoundCategory::Music);
        core.music.update(delta, core.music_paused, music_gain);
        let backend = &mut self.backend;
        core.music.update_parameters(
            delta,
            core.config.smooth_parameter_transitions,
            core.config.parameter_smoothing_rate,
            |name, value| backend.set_parameter(name, value),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;
    use soundstage_common::{AudioClip, SoundEntry, SoundPriority};

    use super::*;
    use crate::library::MemoryLibrary;
    use crate::mix::SnapshotPreset;
    use crate::sim_backend::SimulatedBackend;

    fn clip(name: &str, secs: f32) -> AudioClip {
        AudioClip::silent(name, Duration::from_secs_f32(secs))
    }

    fn library() -> MemoryLibrary {
        let mut lib = MemoryLibrary::new();
        for id in ["a", "b", "c", "d"] {
            lib.add_entry(SoundEntry::new(id, SoundCategory::Sfx));
            lib.add_clip(clip(id, 1.0));
        }
        lib.add_entry(SoundEntry::new("low", SoundCategory::Sfx).with_priority(SoundPriority::Low));
        lib.add_entry(
            SoundEntry::new("alarm", SoundCategory::Sfx).with_priority(SoundPriority::Critical),
        );
        lib.add_entry(SoundEntry::new("cooldown", SoundCategory::Sfx).with_cooldown(1.0));
        lib.add_entry(SoundEntry::new("loop", SoundCategory::Ambient).with_looping(true));
        lib.add_entry(SoundEntry::new("buzz", SoundCategory::Sfx).with_spatial(1.0, 11.0));
        lib.add_entry(
            SoundEntry::new("theme", SoundCategory::Music)
                .with_volume(0.8)
                .with_looping(true),
        );
        lib.add_entry(SoundEntry::new("battle", SoundCategory::Music).with_looping(true));
        lib.add_entry(SoundEntry::new("roar", SoundCategory::Sfx).in_bank("boss"));
        lib.add_entry(
            SoundEntry::new("boss_theme", SoundCategory::Music)
                .with_looping(true)
                .in_bank("boss"),
        );
        for id in ["low", "alarm", "cooldown", "loop", "buzz", "theme", "battle", "roar", "boss_theme"] {
            lib.add_clip(clip(id, 2.0));
        }
        lib
    }

    fn config(pool: usize) -> SoundConfig {
        SoundConfig::default()
            .with_pool_size(pool, pool)
            .with_default_cooldown(0.0)
            .with_max_same_sound(8)
            .with_snapshot(SnapshotPreset::new("underwater").with_gain(SoundCategory::Sfx, 0.5))
    }

    fn engine(config: SoundConfig) -> SoundEngine<SimulatedBackend> {
        let mut engine = SoundEngine::new(SimulatedBackend::new(), library());
        engine.initialize(config).expect("initialize");
        engine
    }

    #[test]
    fn test_lifecycle() {
        let mut engine = SoundEngine::new(SimulatedBackend::new(), library());
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert_eq!(engine.play("a"), SoundHandle::INVALID);
        assert_eq!(engine.max_simultaneous_sounds(), 0);
        engine.update(1.0);

        engine.initialize(config(4)).expect("initialize");
        assert!(matches!(
            engine.initialize(config(4)),
            Err(SoundError::AlreadyInitialized)
        ));
        assert_eq!(engine.max_simultaneous_sounds(), 4);

        let handle = engine.play("a");
        assert!(engine.is_playing(handle));

        engine.dispose();
        assert_eq!(engine.state(), EngineState::Disposed);
        assert!(!engine.is_playing(handle));
        assert_eq!(engine.active_sound_count(), 0);
        assert!(matches!(engine.initialize(config(4)), Err(SoundError::Disposed)));
    }

    #[test]
    fn test_unknown_sound_is_invalid() {
        let mut engine = engine(config(4));
        assert_eq!(engine.play("missing"), SoundHandle::INVALID);
    }

    #[test]
    fn test_pool_of_two_without_priority() {
        let mut engine = engine(config(2).with_priority(false));
        let a = engine.play("a");
        let b = engine.play("b");
        assert!(a.is_valid());
        assert!(b.is_valid());
        assert_eq!(engine.play("c"), SoundHandle::INVALID);

        engine.stop(a);
        assert!(engine.play("c").is_valid());
    }

    #[test]
    fn test_critical_evicts_at_capacity() {
        let mut engine = engine(config(2));
        let low = engine.play("low");
        engine.update(0.1);
        let a = engine.play("a");
        assert_eq!(engine.active_sound_count(), 2);

        let alarm = engine.play("alarm");
        assert!(alarm.is_valid());
        assert_eq!(engine.active_sound_count(), 2);
        assert!(!engine.is_playing(low));
        assert!(engine.is_playing(a));
        assert_eq!(engine.stats().evictions, 1);
    }

    #[test]
    fn test_equal_priority_rejected_at_capacity() {
        let mut engine = engine(config(2));
        engine.play("a");
        engine.play("b");
        assert_eq!(engine.play("c"), SoundHandle::INVALID);
        assert_eq!(engine.stats().plays_rejected, 1);
    }

    #[test]
    fn test_cooldown_enforced() {
        let mut engine = engine(config(4));
        assert!(engine.play("cooldown").is_valid());
        engine.update(0.5);
        assert_eq!(engine.play("cooldown"), SoundHandle::INVALID);
        engine.update(0.6);
        assert!(engine.play("cooldown").is_valid());
    }

    #[test]
    fn test_finished_sounds_are_reclaimed() {
        let mut engine = engine(config(4));
        let handle = engine.play("a");
        engine.update(0.5);
        assert!(engine.is_playing(handle));
        engine.update(0.6);
        assert!(!engine.is_playing(handle));
        assert_eq!(engine.active_sound_count(), 0);
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut engine = engine(config(1));
        let first = engine.play("a");
        engine.stop(first);
        let second = engine.play("b");
        assert_eq!(first.id(), second.id());
        assert!(!engine.is_playing(first));
        assert!(engine.is_playing(second));

        engine.stop(first);
        assert!(engine.is_playing(second));
    }

    #[test]
    fn test_volume_mixing() {
        let mut engine = engine(config(4));
        engine.set_volume(SoundCategory::Sfx, 0.5);
        engine.set_volume(SoundCategory::Master, 0.5);
        let handle = engine.play_with("a", None, 0.8);
        let volume = engine.sound_volume(handle).expect("volume");
        assert!((volume - 0.2).abs() < 1e-5);

        engine.set_volume(SoundCategory::Sfx, 1.0);
        let volume = engine.sound_volume(handle).expect("volume");
        assert!((volume - 0.4).abs() < 1e-5);
        assert!((engine.get_volume(SoundCategory::Sfx) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_music_volume_scenario() {
        let mut engine = engine(config(4));
        engine.set_volume(SoundCategory::Music, 0.5);
        engine.play_music("theme", 0.0);

        let (current, _) = engine.music_voices().expect("music");
        let expected = 0.8 * 0.5 * engine.get_volume(SoundCategory::Master);
        assert!((current.volume() - expected).abs() < 1e-5);
        assert_eq!(engine.current_music(), Some("theme"));
    }

    #[test]
    fn test_volume_change_rescales_playing_music() {
        let mut engine = engine(config(4));
        engine.set_volume(SoundCategory::Music, 0.7);
        engine.play_music("theme", 0.0);

        engine.set_volume(SoundCategory::Master, 0.5);
        let (current, _) = engine.music_voices().expect("music");
        assert!((current.volume() - 0.8 * 0.7 * 0.5).abs() < 1e-5);

        engine.set_volume(SoundCategory::Music, 0.25);
        let (current, _) = engine.music_voices().expect("music");
        assert!((current.volume() - 0.8 * 0.25 * 0.5).abs() < 1e-5);

        engine.set_volume(SoundCategory::Sfx, 0.1);
        let (current, _) = engine.music_voices().expect("music");
        assert!((current.volume() - 0.8 * 0.25 * 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_crossfade_through_engine() {
        let mut engine = engine(config(4).with_crossfade_curve(crate::fade::FadeCurve::Linear));
        engine.set_volume(SoundCategory::Music, 1.0);
        engine.play_music("battle", 0.0);
        engine.crossfade_music("theme", 1.0);
        engine.update(0.5);

        let (incoming, outgoing) = engine.music_voices().expect("music");
        assert!((incoming.volume() - 0.4).abs() < 1e-5);
        assert!((outgoing.volume() - 0.5).abs() < 1e-5);

        engine.update(0.5);
        let (_, outgoing) = engine.music_voices().expect("music");
        assert!(outgoing.is_finished());
    }

    #[test]
    fn test_mute_and_pause_idempotent() {
        let mut engine = engine(config(4));
        let handle = engine.play("loop");

        engine.set_mute(true);
        let once = engine.stats();
        engine.set_mute(true);
        assert_eq!(once, engine.stats());
        assert!(engine.is_muted());
        assert_eq!(engine.play("a"), SoundHandle::INVALID);

        engine.set_mute(false);
        engine.pause(SoundCategory::Ambient);
        let once = engine.stats();
        engine.pause(SoundCategory::Ambient);
        assert_eq!(once, engine.stats());
        assert!(engine.is_playing(handle));

        engine.resume(SoundCategory::Ambient);
        assert!(engine.is_playing(handle));
    }

    #[test]
    fn test_paused_sound_is_not_reclaimed() {
        let mut engine = engine(config(4));
        let handle = engine.play("a");
        engine.pause(SoundCategory::Sfx);
        engine.update(5.0);
        assert!(engine.is_playing(handle));

        engine.resume(SoundCategory::Sfx);
        engine.update(0.5);
        assert!(engine.is_playing(handle));
        engine.update(0.6);
        assert!(!engine.is_playing(handle));
    }

    #[test]
    fn test_play_into_paused_category_starts_paused() {
        let mut engine = engine(config(4));
        engine.pause(SoundCategory::Sfx);
        let handle = engine.play("a");
        engine.update(2.0);
        assert!(engine.is_playing(handle));
    }

    #[test]
    fn test_stop_with_fade_reclaims_voice() {
        let mut engine = engine(config(4));
        let handle = engine.play("loop");
        assert!(engine.stop_with_fade(handle, 0.5));

        engine.update(0.25);
        assert!(engine.is_playing(handle));
        engine.update(0.25);
        engine.update(0.0);
        assert!(!engine.is_playing(handle));
        assert_eq!(engine.stats().voices_idle, engine.stats().voices_created);
    }

    #[test]
    fn test_fade_sound() {
        let mut engine = engine(config(4));
        engine.set_volume(SoundCategory::Ambient, 1.0);
        let handle = engine.play("loop");
        assert!(engine.fade_sound(handle, 0.5, 1.0));
        engine.update(1.0);
        let volume = engine.sound_volume(handle).expect("volume");
        assert!((volume - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_stop_category_and_all() {
        let mut engine = engine(config(4));
        let ambient = engine.play("loop");
        let sfx = engine.play("a");
        engine.play_music("theme", 0.0);

        engine.stop_category(SoundCategory::Sfx);
        assert!(!engine.is_playing(sfx));
        assert!(engine.is_playing(ambient));

        engine.stop_all();
        assert_eq!(engine.active_sound_count(), 0);
        assert_eq!(engine.current_music(), Some("theme"));
    }

    #[test]
    fn test_spatial_attenuation() {
        let mut engine = engine(config(4).with_attenuation(spatial::AttenuationModel::Linear));
        let near = engine.play_at("buzz", Vec3::new(0.5, 0.0, 0.0));
        let mid = engine.play_at("buzz", Vec3::new(6.0, 0.0, 0.0));
        let far = engine.play_at("buzz", Vec3::new(20.0, 0.0, 0.0));

        assert!((engine.sound_volume(near).expect("near") - 1.0).abs() < 1e-5);
        assert!((engine.sound_volume(mid).expect("mid") - 0.5).abs() < 1e-5);
        assert!(engine.sound_volume(far).expect("far").abs() < 1e-5);

        engine.set_listener_position(Vec3::new(20.0, 0.0, 0.0));
        engine.update(0.01);
        assert!((engine.sound_volume(far).expect("far") - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_processor_applies_multipliers() {
        let mut engine = engine(config(4));
        engine.set_sound_processor(Some(Box::new(
            |info: &SoundInfo, m: &mut ProcessorMultipliers| {
                assert_eq!(info.sound_id, "buzz");
                m.volume = 0.5;
                m.low_pass_cutoff = 800.0;
            },
        )));
        let spatial = engine.play_at("buzz", Vec3::ZERO);
        let flat = engine.play("a");
        engine.update(0.01);

        assert!((engine.sound_volume(spatial).expect("spatial") - 0.5).abs() < 1e-5);
        assert!((engine.sound_volume(flat).expect("flat") - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_snapshot_blend_through_engine() {
        let mut engine = engine(config(4));
        let handle = engine.play("loop");
        let sfx = engine.play("a");
        engine.set_snapshot("underwater", 1.0);
        engine.update(0.5);
        assert!((engine.sound_volume(sfx).expect("sfx") - 0.75).abs() < 1e-5);
        assert!((engine.sound_volume(handle).expect("ambient") - 0.5).abs() < 1e-5);

        let stats = engine.stats();
        assert_eq!(stats.snapshots.len(), 1);
        assert_eq!(stats.snapshots[0].name, "underwater");
        assert!((stats.snapshots[0].weight - 0.5).abs() < 1e-5);

        engine.clear_all_snapshots(0.0);
        engine.update(0.1);
        assert!((engine.sound_volume(sfx).expect("sfx") - 1.0).abs() < 1e-5);
        assert!(engine.stats().snapshots.is_empty());
    }

    #[test]
    fn test_music_parameter_forwarded() {
        let mut engine = engine(config(4).with_parameter_smoothing(true, 1.0));
        assert!(engine.get_music_parameter("intensity").abs() < f32::EPSILON);

        engine.set_music_parameter("intensity", 0.0);
        engine.set_music_parameter("intensity", 1.0);
        engine.update(0.5);
        assert!((engine.get_music_parameter("intensity") - 0.5).abs() < 1e-5);
        assert_eq!(engine.backend().parameter("intensity"), Some(0.5));
    }

    #[test]
    fn test_bank_load_and_unload() {
        let mut engine = engine(config(4));
        assert_eq!(engine.play("roar"), SoundHandle::INVALID);

        assert!(pollster::block_on(engine.load_bank_async("boss")));
        assert!(engine.is_bank_loaded("boss"));
        assert!(!pollster::block_on(engine.load_bank_async("nope")));

        let roar = engine.play("roar");
        let other = engine.play("loop");
        engine.play_music("boss_theme", 0.0);
        assert!(engine.is_playing(roar));

        engine.unload_bank("boss");
        assert!(!engine.is_playing(roar));
        assert!(engine.is_playing(other));
        assert_eq!(engine.current_music(), None);
        assert!(!engine.is_bank_loaded("boss"));
        assert_eq!(engine.play("roar"), SoundHandle::INVALID);
    }

    #[test]
    fn test_music_channel_slot_flips() {
        let mut engine = engine(config(4));
        engine.play_music("theme", 0.0);
        engine.crossfade_music("battle", 0.0);
        let core = engine.core().expect("core");
        assert_eq!(core.music.current_slot(), ChannelSlot::B);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Play(usize),
        PlayCritical,
        Stop(usize),
        Update(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..5).prop_map(Op::Play),
            Just(Op::PlayCritical),
            (0usize..16).prop_map(Op::Stop),
            (1u8..20).prop_map(Op::Update),
        ]
    }

    proptest! {
        #[test]
        fn prop_handles_unique_and_pool_conserved(
            ops in proptest::collection::vec(op(), 1..80),
            pool in 1usize..5,
            priority in any::<bool>(),
        ) {
            let ids = ["a", "b", "c", "d", "low"];
            let mut engine = engine(config(pool).with_priority(priority));
            let mut handles: Vec<SoundHandle> = Vec::new();

            for op in ops {
                match op {
                    Op::Play(i) => handles.push(engine.play(ids[i])),
                    Op::PlayCritical => handles.push(engine.play("alarm")),
                    Op::Stop(i) => {
                        if let Some(handle) = handles.get(i) {
                            engine.stop(*handle);
                        }
                    },
                    Op::Update(tenths) => engine.update(f32::from(tenths) / 10.0),
                }

                prop_assert!(engine.active_sound_count() <= engine.max_simultaneous_sounds());

                let core = engine.core().expect("core");
                let mut voices: Vec<_> = core.registry.iter().map(|s| s.voice.id()).collect();
                let total = voices.len();
                voices.sort_by_key(|v| v.raw());
                voices.dedup();
                prop_assert_eq!(voices.len(), total);

                let live: Vec<_> = handles.iter().filter(|h| engine.is_playing(**h)).collect();
                for (i, a) in live.iter().enumerate() {
                    for b in &live[i + 1..] {
                        prop_assert_ne!(**a, **b);
                    }
                }
            }
        }
    }
}
