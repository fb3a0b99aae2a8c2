//! Host configuration.
//!
//! Selects the playback backend, frame pacing and session length, and carries
//! the [`SoundConfig`] handed to the engine. Configuration can be loaded from
//! and saved to a TOML file.

use serde::{Deserialize, Serialize};
use soundstage_common::SoundCategory;
use soundstage_kernel::{SnapshotPreset, SoundConfig};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "soundstage.toml";

/// Which playback backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Virtual clock, no audio device.
    #[default]
    Simulated,
    /// Default output device through rodio.
    Rodio,
}

/// Host configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Session ===
    /// Playback backend
    pub backend: BackendKind,
    /// Engine updates per second
    pub frame_rate: u32,
    /// Session length in seconds
    pub session_length: f32,
    /// Pace frames against the wall clock
    pub realtime: bool,

    // === Content ===
    /// Sound catalog manifest (built-in demo catalog if unset)
    pub catalog: Option<PathBuf>,
    /// Cue script (built-in demo script if unset)
    pub script: Option<PathBuf>,
    /// Where to write the final stats as JSON
    pub stats_path: Option<PathBuf>,

    // === Engine ===
    /// Sound engine settings
    pub sound: SoundConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Simulated,
            frame_rate: 60,
            session_length: 12.0,
            realtime: false,

            catalog: None,
            script: None,
            stats_path: None,

            sound: SoundConfig::default().with_snapshot(
                SnapshotPreset::new("pause_menu")
                    .with_gain(SoundCategory::Sfx, 0.2)
                    .with_gain(SoundCategory::Music, 0.5),
            ),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let mut config: Self = match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        return Self::default();
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                return Self::default();
            },
        };

        config.resolve_paths(path.parent());
        config.validate();
        config
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Make relative content paths relative to the config file's directory.
    fn resolve_paths(&mut self, base: Option<&Path>) {
        let Some(base) = base else {
            return;
        };
        for path in [&mut self.catalog, &mut self.script, &mut self.stats_path]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.frame_rate = self.frame_rate.clamp(1, 1000);
        self.session_length = self.session_length.clamp(0.0, 3600.0);
        self.sound.validate();
    }

    /// Seconds per frame.
    #[must_use]
    pub fn frame_delta(&self) -> f32 {
        1.0 / self.frame_rate.max(1) as f32
    }

    /// Number of frames in the session.
    #[must_use]
    pub fn total_frames(&self) -> u64 {
        (self.session_length * self.frame_rate as f32).ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.backend, BackendKind::Simulated);
        assert_eq!(config.frame_rate, 60);
        assert!(!config.realtime);
        assert!(config.catalog.is_none());
        assert_eq!(config.sound.snapshots.len(), 1);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.frame_rate = 0;
        config.session_length = -5.0;
        config.sound.max_pool_size = 0;

        config.validate();

        assert_eq!(config.frame_rate, 1);
        assert!(config.session_length.abs() < f32::EPSILON);
        assert_eq!(config.sound.max_pool_size, 1);
    }

    #[test]
    fn test_frame_math() {
        let mut config = EngineConfig::default();
        config.frame_rate = 50;
        config.session_length = 2.0;
        assert!((config.frame_delta() - 0.02).abs() < 1e-6);
        assert_eq!(config.total_frames(), 100);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let mut config = EngineConfig::default();
        config.frame_rate = 30;
        config.backend = BackendKind::Rodio;
        config.catalog = Some(PathBuf::from("catalog.toml"));
        config.sound = config
            .sound
            .with_pool_size(4, 16)
            .with_volume(SoundCategory::Music, 0.25)
            .with_snapshot(SnapshotPreset::new("menu").with_gain(SoundCategory::Sfx, 0.3));

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded.frame_rate, 30);
        assert_eq!(loaded.backend, BackendKind::Rodio);
        assert_eq!(loaded.sound.max_pool_size, 16);
        assert!((loaded.sound.volumes.get(SoundCategory::Music) - 0.25).abs() < f32::EPSILON);
        assert_eq!(loaded.sound.snapshots.len(), 2);
        assert_eq!(loaded.catalog, Some(temp_dir.path().join("catalog.toml")));
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = EngineConfig::load_from("/nonexistent/path/config.toml");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_config_load_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "frame_rate = \"fast\"").expect("write");

        let config = EngineConfig::load_from(&config_path);
        assert_eq!(config.frame_rate, 60);
    }

    #[test]
    fn test_partial_config() {
        let config: EngineConfig =
            toml::from_str("session_length = 3.5\n[sound]\nenforce_priority = false\n")
                .expect("parse");
        assert!((config.session_length - 3.5).abs() < f32::EPSILON);
        assert!(!config.sound.enforce_priority);
        assert_eq!(config.frame_rate, 60);
    }
}
