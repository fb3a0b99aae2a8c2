//! Active sound registry.
//!
//! Every playing sound lives in a generational arena slot. The handle given
//! to callers is `(slot index + 1, slot generation)`; the generation is
//! bumped whenever a slot is vacated, which is what makes stale handles
//! harmless.

use std::sync::Arc;

use glam::Vec3;
use soundstage_common::{SoundCategory, SoundEntry, SoundHandle, SoundPriority};

use crate::processor::ProcessorMultipliers;

/// Per-sound volume fade, advanced at a fixed rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeState {
    /// Current fade multiplier (0.0-1.0).
    pub level: f32,
    /// Level the fade is heading to.
    pub target_volume: f32,
    /// Units per second.
    pub fade_speed: f32,
    /// Whether the target has been reached.
    pub complete: bool,
    /// Stop the sound once the fade reaches silence.
    pub stop_when_silent: bool,
}

impl Default for FadeState {
    fn default() -> Self {
        Self {
            level: 1.0,
            target_volume: 1.0,
            fade_speed: 0.0,
            complete: true,
            stop_when_silent: false,
        }
    }
}

impl FadeState {
    /// Start fading toward `target` over `duration` seconds.
    pub fn fade_to(&mut self, target: f32, duration: f32, stop_when_silent: bool) {
        let target = target.clamp(0.0, 1.0);
        self.target_volume = target;
        self.stop_when_silent = stop_when_silent;
        if duration <= 0.0 {
            self.level = target;
            self.fade_speed = 0.0;
            self.complete = true;
        } else {
            self.fade_speed = (target - self.level).abs() / duration;
            self.complete = false;
        }
    }

    /// Move toward the target by `fade_speed * delta`.
    pub fn advance(&mut self, delta: f32) {
        if self.complete {
            return;
        }
        let step = self.fade_speed * delta.max(0.0);
        if (self.target_volume - self.level).abs() <= step {
            self.level = self.target_volume;
            self.complete = true;
        } else if self.target_volume > self.level {
            self.level += step;
        } else {
            self.level -= step;
        }
    }

    /// True once a stopping fade has gone silent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.complete && self.stop_when_silent && self.level <= 0.0
    }
}

/// Runtime record binding a handle to its voice and live parameters.
#[derive(Debug)]
pub struct ActiveSound<V> {
    /// Handle issued to the caller.
    pub handle: SoundHandle,
    /// Static descriptor.
    pub entry: Arc<SoundEntry>,
    /// The voice this sound owns while playing.
    pub voice: V,
    /// World position for spatial sounds.
    pub position: Option<Vec3>,
    /// Engine clock time when playback started.
    pub start_time: f64,
    /// `entry.volume * caller volume multiplier`.
    pub base_volume: f32,
    /// Randomized pitch chosen at play time.
    pub base_pitch: f32,
    /// Whether the voice is paused by its category.
    pub paused: bool,
    /// Multipliers written by the sound processor this tick.
    pub multipliers: ProcessorMultipliers,
    /// Volume fade.
    pub fade: FadeState,
    /// Distance attenuation computed for the last commit.
    pub attenuation: f32,
}

impl<V> ActiveSound<V> {
    /// Create an unregistered record. The registry assigns the handle.
    #[must_use]
    pub fn new(entry: Arc<SoundEntry>, voice: V, start_time: f64) -> Self {
        Self {
            handle: SoundHandle::INVALID,
            base_volume: entry.volume,
            entry,
            voice,
            position: None,
            start_time,
            base_pitch: 1.0,
            paused: false,
            multipliers: ProcessorMultipliers::default(),
            fade: FadeState::default(),
            attenuation: 1.0,
        }
    }

    /// Sound ID from the entry.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.entry.id
    }

    /// Mixing category from the entry.
    #[must_use]
    pub fn category(&self) -> SoundCategory {
        self.entry.category
    }

    /// Priority tier from the entry.
    #[must_use]
    pub fn priority(&self) -> SoundPriority {
        self.entry.priority
    }

    /// Whether the sound is positioned in the world.
    #[must_use]
    pub fn is_spatial(&self) -> bool {
        self.entry.spatial && self.position.is_some()
    }
}

#[derive(Debug)]
struct Slot<V> {
    generation: u32,
    sound: Option<ActiveSound<V>>,
}

/// Generational arena of active sounds.
#[derive(Debug)]
pub struct SoundRegistry<V> {
    slots: Vec<Slot<V>>,
    free: Vec<usize>,
    len: usize,
}

impl<V> Default for SoundRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SoundRegistry<V> {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Create a registry with room for `capacity` sounds.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            len: 0,
        }
    }

    fn index_of(&self, handle: SoundHandle) -> Option<usize> {
        if !handle.is_valid() {
            return None;
        }
        let index = handle.id() as usize - 1;
        let slot = self.slots.get(index)?;
        (slot.generation == handle.generation() && slot.sound.is_some()).then_some(index)
    }

    /// Insert a sound and return its freshly issued handle.
    pub fn register(&mut self, mut sound: ActiveSound<V>) -> SoundHandle {
        let index = if let Some(index) = self.free.pop() {
            index
        } else {
            self.slots.push(Slot {
                generation: 1,
                sound: None,
            });
            self.slots.len() - 1
        };

        let slot = &mut self.slots[index];
        let handle = SoundHandle::new(index as u32 + 1, slot.generation);
        sound.handle = handle;
        slot.sound = Some(sound);
        self.len += 1;
        handle
    }

    /// Remove a sound, returning it if the handle was current.
    pub fn unregister(&mut self, handle: SoundHandle) -> Option<ActiveSound<V>> {
        let index = self.index_of(handle)?;
        self.vacate(index)
    }

    fn vacate(&mut self, index: usize) -> Option<ActiveSound<V>> {
        let slot = &mut self.slots[index];
        let sound = slot.sound.take()?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(index);
        self.len -= 1;
        Some(sound)
    }

    /// Look up a sound by handle.
    #[must_use]
    pub fn get(&self, handle: SoundHandle) -> Option<&ActiveSound<V>> {
        let index = self.index_of(handle)?;
        self.slots[index].sound.as_ref()
    }

    /// Look up a sound mutably by handle.
    pub fn get_mut(&mut self, handle: SoundHandle) -> Option<&mut ActiveSound<V>> {
        let index = self.index_of(handle)?;
        self.slots[index].sound.as_mut()
    }

    /// Check whether a handle refers to a registered sound.
    #[must_use]
    pub fn contains(&self, handle: SoundHandle) -> bool {
        self.index_of(handle).is_some()
    }

    /// Iterate over active sounds.
    pub fn iter(&self) -> impl Iterator<Item = &ActiveSound<V>> {
        self.slots.iter().filter_map(|slot| slot.sound.as_ref())
    }

    /// Iterate mutably over active sounds.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ActiveSound<V>> {
        self.slots.iter_mut().filter_map(|slot| slot.sound.as_mut())
    }

    /// Apply `f` to every active sound.
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut ActiveSound<V>),
    {
        for sound in self.iter_mut() {
            f(sound);
        }
    }

    /// Remove and return every sound matching `pred`.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<ActiveSound<V>>
    where
        F: FnMut(&ActiveSound<V>) -> bool,
    {
        let matching: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.sound.as_ref().is_some_and(&mut pred))
            .map(|(index, _)| index)
            .collect();

        matching
            .into_iter()
            .filter_map(|index| self.vacate(index))
            .collect()
    }

    /// Number of registered sounds.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if no sounds are registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sound(id: &str, start: f64) -> ActiveSound<u32> {
        let entry = Arc::new(SoundEntry::new(id, SoundCategory::Sfx));
        ActiveSound::new(entry, 0, start)
    }

    #[test]
    fn test_register_and_find() {
        let mut registry = SoundRegistry::new();
        let a = registry.register(sound("a", 0.0));
        let b = registry.register(sound("b", 1.0));

        assert!(a.is_valid());
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).map(ActiveSound::id), Some("a"));
        assert_eq!(registry.get(b).map(|s| s.handle), Some(b));
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut registry = SoundRegistry::new();
        let first = registry.register(sound("a", 0.0));
        assert!(registry.unregister(first).is_some());
        assert!(registry.unregister(first).is_none());

        let second = registry.register(sound("b", 1.0));
        assert_eq!(first.id(), second.id());
        assert_ne!(first.generation(), second.generation());
        assert!(registry.get(first).is_none());
        assert!(registry.get(second).is_some());
    }

    #[test]
    fn test_invalid_handle_never_matches() {
        let mut registry = SoundRegistry::new();
        registry.register(sound("a", 0.0));
        assert!(registry.get(SoundHandle::INVALID).is_none());
        assert!(!registry.contains(SoundHandle::new(42, 1)));
    }

    #[test]
    fn test_remove_where() {
        let mut registry = SoundRegistry::new();
        registry.register(sound("keep", 0.0));
        registry.register(sound("drop", 1.0));
        registry.register(sound("drop", 2.0));

        let removed = registry.remove_where(|s| s.id() == "drop");
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.iter().all(|s| s.id() == "keep"));
    }

    #[test]
    fn test_fade_state_reaches_target() {
        let mut fade = FadeState::default();
        fade.fade_to(0.0, 0.5, true);
        assert!(!fade.complete);

        fade.advance(0.25);
        assert!((fade.level - 0.5).abs() < 1e-5);
        assert!(!fade.should_stop());

        fade.advance(0.3);
        assert!(fade.complete);
        assert!(fade.level.abs() < f32::EPSILON);
        assert!(fade.should_stop());
    }

    #[test]
    fn test_fade_state_immediate() {
        let mut fade = FadeState::default();
        fade.fade_to(0.4, 0.0, false);
        assert!(fade.complete);
        assert!((fade.level - 0.4).abs() < f32::EPSILON);
    }
}
