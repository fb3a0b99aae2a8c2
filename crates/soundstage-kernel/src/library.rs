//! Sound library: entries, clip variants and banks.

use std::collections::HashSet;
use std::sync::Arc;

use ahash::AHashMap;
use soundstage_common::{AudioClip, SoundEntry};
use tracing::{debug, info, warn};

/// Source of sound descriptors and clip data.
pub trait SoundLibrary {
    /// Look up an available entry.
    fn get(&self, id: &str) -> Option<Arc<SoundEntry>>;

    /// Pick one clip variant for an entry.
    fn random_clip(&self, entry: &SoundEntry) -> Option<Arc<AudioClip>>;

    /// Pick a pitch within the entry's range.
    fn random_pitch(&self, entry: &SoundEntry) -> f32;

    /// Make a bank's entries available. Returns `false` if the bank is unknown.
    fn load_bank(&mut self, bank: &str) -> bool;

    /// Make a bank's entries unavailable.
    fn unload_bank(&mut self, bank: &str);

    /// Whether a bank is loaded.
    fn is_bank_loaded(&self, bank: &str) -> bool;
}

/// In-memory library with random variant selection.
///
/// Entries without a bank are always available; bank entries only while
/// their bank is loaded.
#[derive(Debug, Default)]
pub struct MemoryLibrary {
    entries: AHashMap<String, Arc<SoundEntry>>,
    clips: AHashMap<String, Arc<AudioClip>>,
    banks: HashSet<String>,
    loaded: HashSet<String>,
}

impl MemoryLibrary {
    /// Create an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn add_entry(&mut self, entry: SoundEntry) {
        if let Some(bank) = &entry.bank {
            self.banks.insert(bank.clone());
        }
        debug!("Registered sound '{}'", entry.id);
        self.entries.insert(entry.id.clone(), Arc::new(entry));
    }

    /// Add or replace a clip.
    pub fn add_clip(&mut self, clip: AudioClip) {
        self.clips.insert(clip.name.clone(), Arc::new(clip));
    }

    /// Builder form of [`add_entry`](Self::add_entry).
    #[must_use]
    pub fn with_entry(mut self, entry: SoundEntry) -> Self {
        self.add_entry(entry);
        self
    }

    /// Builder form of [`add_clip`](Self::add_clip).
    #[must_use]
    pub fn with_clip(mut self, clip: AudioClip) -> Self {
        self.add_clip(clip);
        self
    }

    /// Number of entries, available or not.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of clips.
    #[must_use]
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    /// Known bank IDs.
    pub fn banks(&self) -> impl Iterator<Item = &str> {
        self.banks.iter().map(String::as_str)
    }

    fn is_available(&self, entry: &SoundEntry) -> bool {
        entry
            .bank
            .as_deref()
            .map_or(true, |bank| self.loaded.contains(bank))
    }
}

impl SoundLibrary for MemoryLibrary {
    fn get(&self, id: &str) -> Option<Arc<SoundEntry>> {
        self.entries
            .get(id)
            .filter(|entry| self.is_available(entry))
            .cloned()
    }

    fn random_clip(&self, entry: &SoundEntry) -> Option<Arc<AudioClip>> {
        let available: Vec<&Arc<AudioClip>> = entry
            .clips
            .iter()
            .filter_map(|name| self.clips.get(name))
            .collect();

        if available.is_empty() {
            return None;
        }
        Some(Arc::clone(available[fastrand::usize(..available.len())]))
    }

    fn random_pitch(&self, entry: &SoundEntry) -> f32 {
        entry.pitch.lerp(fastrand::f32())
    }

    fn load_bank(&mut self, bank: &str) -> bool {
        if !self.banks.contains(bank) {
            warn!("Unknown bank '{}'", bank);
            return false;
        }
        if self.loaded.insert(bank.to_string()) {
            info!("Loaded bank '{}'", bank);
        }
        true
    }

    fn unload_bank(&mut self, bank: &str) {
        if self.loaded.remove(bank) {
            info!("Unloaded bank '{}'", bank);
        }
    }

    fn is_bank_loaded(&self, bank: &str) -> bool {
        self.loaded.contains(bank)
    }
}
