//! Sound catalog manifests.
//!
//! A catalog lists clips and the sound entries that play them:
//!
//! ```toml
//! [[clips]]
//! name = "step_1"
//! duration = 0.25
//! path = "sfx/step_1.wav"   # decoded with the rodio backend, else silent
//!
//! [[sounds]]
//! id = "footstep"
//! category = "sfx"
//! clips = ["step_1"]
//! pitch = { min = 0.9, max = 1.1 }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use soundstage_common::{
    AudioClip, PitchRange, SoundCategory, SoundEntry, SoundError, SoundPriority,
};
use soundstage_kernel::{MemoryLibrary, SoundLibrary};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to read the manifest.
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        /// Manifest path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Manifest is not valid TOML for a catalog.
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    /// A sound references a clip the catalog does not define.
    #[error("Sound '{sound}' references unknown clip '{clip}'")]
    UnknownClip {
        /// Sound ID.
        sound: String,
        /// Missing clip name.
        clip: String,
    },

    /// Clip decoding failed.
    #[error(transparent)]
    Sound(#[from] SoundError),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// One clip in a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    /// Clip name referenced by sounds.
    pub name: String,
    /// Duration in seconds used for silent clips.
    #[serde(default = "default_clip_duration")]
    pub duration: f32,
    /// Audio file, relative to the catalog.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_clip_duration() -> f32 {
    1.0
}

impl ClipSpec {
    /// A silent clip of the given length.
    #[must_use]
    pub fn silent(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            path: None,
        }
    }

    fn build(&self, base: &Path) -> CatalogResult<AudioClip> {
        match &self.path {
            Some(path) => load_file(&self.name, &base.join(path), self.duration),
            None => Ok(AudioClip::silent(
                self.name.clone(),
                Duration::from_secs_f32(self.duration.max(0.0)),
            )),
        }
    }
}

#[cfg(feature = "rodio-backend")]
fn load_file(name: &str, path: &Path, _duration: f32) -> CatalogResult<AudioClip> {
    Ok(soundstage_kernel::rodio_backend::load_clip(name, path)?)
}

#[cfg(not(feature = "rodio-backend"))]
fn load_file(name: &str, path: &Path, duration: f32) -> CatalogResult<AudioClip> {
    debug!("Skipping decode of {} without an audio backend", path.display());
    Ok(AudioClip::silent(
        name.to_string(),
        Duration::from_secs_f32(duration.max(0.0)),
    ))
}

/// A catalog of clips and sound entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    /// Clip definitions.
    pub clips: Vec<ClipSpec>,
    /// Sound entries.
    pub sounds: Vec<SoundEntry>,
    /// Banks loaded as soon as the library is built.
    pub preload_banks: Vec<String>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Catalog {
    /// Load a catalog manifest from a TOML file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut catalog: Self = toml::from_str(&contents)?;
        catalog.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        info!(
            "Loaded catalog {} ({} sounds, {} clips)",
            path.display(),
            catalog.sounds.len(),
            catalog.clips.len()
        );
        Ok(catalog)
    }

    /// Check that every sound's clips are defined.
    pub fn validate(&self) -> CatalogResult<()> {
        for sound in &self.sounds {
            for clip in &sound.clips {
                if !self.clips.iter().any(|c| &c.name == clip) {
                    return Err(CatalogError::UnknownClip {
                        sound: sound.id.clone(),
                        clip: clip.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Build an in-memory library from the catalog.
    pub fn build_library(&self) -> CatalogResult<MemoryLibrary> {
        self.validate()?;

        let mut library = MemoryLibrary::new();
        for spec in &self.clips {
            library.add_clip(spec.build(&self.base_dir)?);
        }
        for sound in &self.sounds {
            library.add_entry(sound.clone());
        }

        for bank in &self.preload_banks {
            if !library.load_bank(bank) {
                warn!("Preload bank '{}' has no sounds", bank);
            }
        }

        debug!(
            "Built library with {} entries and {} clips",
            library.entry_count(),
            library.clip_count()
        );
        Ok(library)
    }

    /// A small built-in catalog for trying the engine without assets.
    #[must_use]
    pub fn demo() -> Self {
        let clips = vec![
            ClipSpec::silent("step_1", 0.25),
            ClipSpec::silent("step_2", 0.3),
            ClipSpec::silent("click", 0.1),
            ClipSpec::silent("explosion", 1.5),
            ClipSpec::silent("alarm", 2.0),
            ClipSpec::silent("wind", 8.0),
            ClipSpec::silent("theme_calm", 30.0),
            ClipSpec::silent("theme_battle", 30.0),
            ClipSpec::silent("boss_roar", 1.2),
            ClipSpec::silent("boss_theme", 40.0),
        ];

        let sounds = vec![
            SoundEntry::new("footstep", SoundCategory::Sfx)
                .with_clips(["step_1", "step_2"])
                .with_pitch(PitchRange::new(0.9, 1.1))
                .with_priority(SoundPriority::Low)
                .with_cooldown(0.2)
                .with_spatial(1.0, 30.0),
            SoundEntry::new("click", SoundCategory::Ui),
            SoundEntry::new("explosion", SoundCategory::Sfx)
                .with_priority(SoundPriority::High)
                .with_spatial(5.0, 200.0),
            SoundEntry::new("alarm", SoundCategory::Sfx).with_priority(SoundPriority::Critical),
            SoundEntry::new("wind", SoundCategory::Ambient)
                .with_looping(true)
                .with_volume(0.6),
            SoundEntry::new("calm", SoundCategory::Music)
                .with_clips(["theme_calm"])
                .with_looping(true),
            SoundEntry::new("battle", SoundCategory::Music)
                .with_clips(["theme_battle"])
                .with_looping(true)
                .with_volume(0.9),
            SoundEntry::new("boss_roar", SoundCategory::Sfx)
                .with_priority(SoundPriority::High)
                .in_bank("boss"),
            SoundEntry::new("boss_theme", SoundCategory::Music)
                .with_looping(true)
                .in_bank("boss"),
        ];

        Self {
            clips,
            sounds,
            preload_banks: Vec::new(),
            base_dir: PathBuf::new(),
        }
    }
}
