//! Mix state: category volumes, mute, pause and snapshots.
//!
//! The mix controller only tracks state. The engine is responsible for
//! pushing the resulting levels and pause flags onto voices.
//!
//! ```text
//! effective(cat) = volume(Master) * volume(cat) * snapshot_gain(cat)
//!
//! snapshot_gain(cat) = Π lerp(1.0, preset_gain(cat), weight)
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use soundstage_common::SoundCategory;
use tracing::{debug, warn};

use crate::fade::{Fade, FadeCurve};

/// Per-category volume multipliers, master included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeSettings {
    volumes: HashMap<SoundCategory, f32>,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        let volumes = SoundCategory::ALL
            .into_iter()
            .map(|category| (category, category.default_volume()))
            .collect();
        Self { volumes }
    }
}

impl VolumeSettings {
    /// Get volume for a category.
    #[must_use]
    pub fn get(&self, category: SoundCategory) -> f32 {
        self.volumes.get(&category).copied().unwrap_or(1.0)
    }

    /// Set volume for a category.
    pub fn set(&mut self, category: SoundCategory, volume: f32) {
        self.volumes.insert(category, volume.clamp(0.0, 1.0));
    }

    /// Get effective volume for a category (includes master).
    #[must_use]
    pub fn effective(&self, category: SoundCategory) -> f32 {
        let master = self.get(SoundCategory::Master);
        if category == SoundCategory::Master {
            return master;
        }
        master * self.get(category)
    }

    /// Clamp every stored volume to 0.0-1.0.
    pub fn clamp_all(&mut self) {
        for volume in self.volumes.values_mut() {
            *volume = volume.clamp(0.0, 1.0);
        }
    }
}

/// A named mix preset: a gain per category.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotPreset {
    /// Preset name used by `set_snapshot`.
    pub name: String,
    /// Gain applied to each listed category at full weight.
    pub gains: HashMap<SoundCategory, f32>,
}

impl SnapshotPreset {
    /// Create an empty preset.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gains: HashMap::new(),
        }
    }

    /// Add a category gain.
    #[must_use]
    pub fn with_gain(mut self, category: SoundCategory, gain: f32) -> Self {
        self.gains.insert(category, gain.max(0.0));
        self
    }

    /// Gain at full weight for a category. Master gain applies to all.
    #[must_use]
    pub fn gain(&self, category: SoundCategory) -> f32 {
        let master = self.gains.get(&SoundCategory::Master).copied().unwrap_or(1.0);
        if category == SoundCategory::Master {
            return master;
        }
        master * self.gains.get(&category).copied().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone)]
struct ActiveSnapshot {
    name: String,
    weight: f32,
    fade: Option<Fade>,
    remove_when_done: bool,
}

/// Mutable mix state owned by the engine.
#[derive(Debug, Clone, Default)]
pub struct MixState {
    volumes: VolumeSettings,
    muted: bool,
    paused: HashSet<SoundCategory>,
    presets: HashMap<String, SnapshotPreset>,
    snapshots: Vec<ActiveSnapshot>,
}

impl MixState {
    /// Create a mix state with initial volumes and snapshot presets.
    #[must_use]
    pub fn new(volumes: VolumeSettings, presets: &[SnapshotPreset]) -> Self {
        Self {
            volumes,
            presets: presets
                .iter()
                .map(|preset| (preset.name.clone(), preset.clone()))
                .collect(),
            ..Self::default()
        }
    }

    /// Stored volume for a category.
    #[must_use]
    pub fn volume(&self, category: SoundCategory) -> f32 {
        self.volumes.get(category)
    }

    /// Set the stored volume for a category.
    pub fn set_volume(&mut self, category: SoundCategory, volume: f32) {
        self.volumes.set(category, volume);
    }

    /// Master * category * snapshot gain.
    #[must_use]
    pub fn effective(&self, category: SoundCategory) -> f32 {
        self.volumes.effective(category) * self.snapshot_gain(category)
    }

    /// Whether everything is muted.
    #[must_use]
    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    /// Set the mute flag. Muting pauses every category; unmuting resumes
    /// every category. Returns `false` if nothing changed.
    pub fn set_muted(&mut self, muted: bool) -> bool {
        if self.muted == muted {
            return false;
        }
        self.muted = muted;
        if muted {
            self.paused.extend(SoundCategory::PLAYABLE);
        } else {
            self.paused.clear();
        }
        true
    }

    /// Whether a category is paused.
    #[must_use]
    pub fn is_paused(&self, category: SoundCategory) -> bool {
        self.paused.contains(&category)
    }

    /// Mark a category paused. Returns `false` if it already was.
    pub fn pause(&mut self, category: SoundCategory) -> bool {
        self.paused.insert(category)
    }

    /// Clear a category's paused mark. Returns `false` if it was not paused.
    pub fn resume(&mut self, category: SoundCategory) -> bool {
        self.paused.remove(&category)
    }

    /// Currently paused categories.
    pub fn paused_categories(&self) -> impl Iterator<Item = SoundCategory> + '_ {
        self.paused.iter().copied()
    }

    /// Whether a snapshot preset with this name is configured.
    #[must_use]
    pub fn has_preset(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    /// Ramp a snapshot's weight to 1 over `time` seconds.
    pub fn set_snapshot(&mut self, name: &str, time: f32) -> bool {
        if !self.has_preset(name) {
            warn!("Unknown snapshot '{}'", name);
            return false;
        }

        let index = match self.snapshots.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.snapshots.push(ActiveSnapshot {
                    name: name.to_string(),
                    weight: 0.0,
                    fade: None,
                    remove_when_done: false,
                });
                self.snapshots.len() - 1
            },
        };

        let snapshot = &mut self.snapshots[index];
        snapshot.remove_when_done = false;
        Self::ramp(snapshot, 1.0, time);
        debug!("Snapshot '{}' -> 1.0 over {:.2}s", name, time);
        true
    }

    /// Ramp a snapshot's weight to 0 over `time` seconds, then drop it.
    pub fn clear_snapshot(&mut self, name: &str, time: f32) -> bool {
        let Some(snapshot) = self.snapshots.iter_mut().find(|s| s.name == name) else {
            return false;
        };
        snapshot.remove_when_done = true;
        Self::ramp(snapshot, 0.0, time);
        debug!("Snapshot '{}' -> 0.0 over {:.2}s", name, time);
        self.snapshots.retain(|s| !(s.remove_when_done && s.fade.is_none()));
        true
    }

    /// Clear every active snapshot.
    pub fn clear_all_snapshots(&mut self, time: f32) {
        for snapshot in &mut self.snapshots {
            snapshot.remove_when_done = true;
            Self::ramp(snapshot, 0.0, time);
        }
        self.snapshots.retain(|s| !(s.remove_when_done && s.fade.is_none()));
    }

    fn ramp(snapshot: &mut ActiveSnapshot, target: f32, time: f32) {
        if time <= 0.0 {
            snapshot.weight = target;
            snapshot.fade = None;
        } else {
            snapshot.fade = Some(Fade::new(snapshot.weight, target, time, FadeCurve::Linear));
        }
    }

    /// Advance snapshot weights.
    pub fn advance(&mut self, delta: f32) {
        for snapshot in &mut self.snapshots {
            if let Some(fade) = snapshot.fade.as_mut() {
                snapshot.weight = fade.advance(delta);
                if fade.is_complete() {
                    snapshot.fade = None;
                }
            }
        }
        self.snapshots.retain(|s| !(s.remove_when_done && s.fade.is_none()));
    }

    /// Current weight of a snapshot, or 0 if inactive.
    #[must_use]
    pub fn snapshot_weight(&self, name: &str) -> f32 {
        self.snapshots
            .iter()
            .find(|s| s.name == name)
            .map_or(0.0, |s| s.weight)
    }

    /// Names of snapshots currently contributing to the mix.
    pub fn active_snapshots(&self) -> impl Iterator<Item = &str> {
        self.snapshots.iter().map(|s| s.name.as_str())
    }

    /// Blended gain of all active snapshots for a category.
    #[must_use]
    pub fn snapshot_gain(&self, category: SoundCategory) -> f32 {
        self.snapshots
            .iter()
            .filter_map(|s| {
                let preset = self.presets.get(&s.name)?;
                let gain = preset.gain(category);
                Some(1.0 + (gain - 1.0) * s.weight)
            })
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mix() -> MixState {
        let underwater = SnapshotPreset::new("underwater")
            .with_gain(SoundCategory::Sfx, 0.2)
            .with_gain(SoundCategory::Music, 0.5);
        let quiet = SnapshotPreset::new("quiet").with_gain(SoundCategory::Master, 0.5);
        MixState::new(VolumeSettings::default(), &[underwater, quiet])
    }

    #[test]
    fn test_volume_defaults() {
        let volumes = VolumeSettings::default();
        assert!((volumes.get(SoundCategory::Master) - 1.0).abs() < f32::EPSILON);
        assert!((volumes.get(SoundCategory::Music) - 0.7).abs() < f32::EPSILON);
        assert!((volumes.effective(SoundCategory::Ambient) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_volume_clamped() {
        let mut mix = mix();
        mix.set_volume(SoundCategory::Sfx, 2.0);
        assert!((mix.volume(SoundCategory::Sfx) - 1.0).abs() < f32::EPSILON);
        mix.set_volume(SoundCategory::Master, -1.0);
        assert!(mix.effective(SoundCategory::Sfx).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mute_is_idempotent() {
        let mut mix = mix();
        assert!(mix.set_muted(true));
        let paused: HashSet<_> = mix.paused_categories().collect();
        assert!(!mix.set_muted(true));
        assert_eq!(paused, mix.paused_categories().collect::<HashSet<_>>());
        assert!(mix.is_paused(SoundCategory::Ui));

        assert!(mix.set_muted(false));
        assert!(!mix.is_paused(SoundCategory::Ui));
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut mix = mix();
        assert!(mix.pause(SoundCategory::Sfx));
        assert!(!mix.pause(SoundCategory::Sfx));
        assert!(mix.is_paused(SoundCategory::Sfx));
        assert!(mix.resume(SoundCategory::Sfx));
        assert!(!mix.resume(SoundCategory::Sfx));
    }

    #[test]
    fn test_unknown_snapshot_rejected() {
        let mut mix = mix();
        assert!(!mix.set_snapshot("nope", 1.0));
        assert!(!mix.clear_snapshot("nope", 1.0));
    }

    #[test]
    fn test_snapshot_blends_over_time() {
        let mut mix = mix();
        assert!(mix.set_snapshot("underwater", 1.0));
        assert!((mix.snapshot_gain(SoundCategory::Sfx) - 1.0).abs() < 1e-5);

        mix.advance(0.5);
        assert!((mix.snapshot_gain(SoundCategory::Sfx) - 0.6).abs() < 1e-5);

        mix.advance(0.5);
        assert!((mix.snapshot_gain(SoundCategory::Sfx) - 0.2).abs() < 1e-5);
        assert!((mix.snapshot_gain(SoundCategory::Ui) - 1.0).abs() < 1e-5);

        assert!(mix.clear_snapshot("underwater", 1.0));
        mix.advance(1.0);
        assert!((mix.snapshot_gain(SoundCategory::Sfx) - 1.0).abs() < 1e-5);
        assert_eq!(mix.active_snapshots().count(), 0);
    }

    #[test]
    fn test_master_gain_applies_everywhere() {
        let mut mix = mix();
        mix.set_snapshot("quiet", 0.0);
        mix.set_snapshot("underwater", 0.0);
        assert!((mix.snapshot_gain(SoundCategory::Ui) - 0.5).abs() < 1e-5);
        assert!((mix.snapshot_gain(SoundCategory::Sfx) - 0.1).abs() < 1e-5);

        mix.clear_all_snapshots(0.0);
        assert!((mix.snapshot_gain(SoundCategory::Sfx) - 1.0).abs() < 1e-5);
    }
}
