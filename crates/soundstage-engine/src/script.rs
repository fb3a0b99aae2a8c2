//! Timed cue scripts.
//!
//! A script is a list of cues, each firing one engine call at a point on the
//! session timeline:
//!
//! ```toml
//! [[cues]]
//! at = 0.0
//! action = "play_music"
//! sound = "calm"
//! fade = 1.5
//!
//! [[cues]]
//! at = 2.0
//! action = "play"
//! sound = "explosion"
//! position = [20.0, 0.0, 0.0]
//! tag = "boom"
//! ```
//!
//! Tags name the handle returned by a `play` cue so later cues can stop,
//! fade or move that sound.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use soundstage_common::{SoundCategory, SoundHandle};
use soundstage_kernel::{
    AudioBackend, AudioEnvironment, EnvironmentProcessor, SoundEngine, SoundProvider,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Slack when comparing cue times against the frame clock.
const CUE_EPSILON: f64 = 1e-6;

/// Errors that can occur while loading a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Failed to read the script file.
    #[error("Failed to read script {path}: {source}")]
    Read {
        /// Script path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Script is not valid TOML for a cue list.
    #[error("Failed to parse script: {0}")]
    Parse(#[from] toml::de::Error),

    /// A cue is scheduled before the session starts.
    #[error("Cue {index} has negative time {at}")]
    NegativeTime {
        /// Cue position in the file.
        index: usize,
        /// Offending time.
        at: f32,
    },
}

/// Result type for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

fn one() -> f32 {
    1.0
}

fn default_blend_time() -> f32 {
    0.5
}

/// One engine call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CueAction {
    /// Play a sound, optionally at a world position.
    Play {
        /// Sound ID.
        sound: String,
        /// World position for spatial playback.
        #[serde(default)]
        position: Option<Vec3>,
        /// Volume multiplier.
        #[serde(default = "one")]
        volume: f32,
        /// Name for the returned handle.
        #[serde(default)]
        tag: Option<String>,
    },
    /// Stop a tagged sound, fading out if `fade > 0`.
    Stop {
        /// Handle tag.
        tag: String,
        /// Fade-out seconds.
        #[serde(default)]
        fade: f32,
    },
    /// Fade a tagged sound to a level.
    FadeSound {
        /// Handle tag.
        tag: String,
        /// Target level.
        target: f32,
        /// Fade seconds.
        duration: f32,
    },
    /// Move a tagged sound.
    MoveSound {
        /// Handle tag.
        tag: String,
        /// New world position.
        position: Vec3,
    },
    /// Stop every sound in a category.
    StopCategory {
        /// Category to stop.
        category: SoundCategory,
    },
    /// Stop every registered sound.
    StopAll,
    /// Start a music track.
    PlayMusic {
        /// Music sound ID.
        sound: String,
        /// Fade-in seconds.
        #[serde(default)]
        fade: f32,
    },
    /// Stop the music.
    StopMusic {
        /// Fade-out seconds.
        #[serde(default)]
        fade: f32,
    },
    /// Crossfade to another track.
    CrossfadeMusic {
        /// Music sound ID.
        sound: String,
        /// Crossfade seconds.
        time: f32,
    },
    /// Set a music parameter.
    SetParameter {
        /// Parameter name.
        name: String,
        /// Target value.
        value: f32,
    },
    /// Set a category volume.
    SetVolume {
        /// Category.
        category: SoundCategory,
        /// Volume in `[0, 1]`.
        volume: f32,
    },
    /// Set the global mute flag.
    SetMute {
        /// Mute on or off.
        muted: bool,
    },
    /// Pause a category.
    Pause {
        /// Category.
        category: SoundCategory,
    },
    /// Resume a category.
    Resume {
        /// Category.
        category: SoundCategory,
    },
    /// Pause everything.
    PauseAll,
    /// Resume everything.
    ResumeAll,
    /// Blend a snapshot in.
    SetSnapshot {
        /// Preset name.
        name: String,
        /// Blend seconds.
        #[serde(default = "default_blend_time")]
        time: f32,
    },
    /// Blend a snapshot out.
    ClearSnapshot {
        /// Preset name.
        name: String,
        /// Blend seconds.
        #[serde(default = "default_blend_time")]
        time: f32,
    },
    /// Blend every snapshot out.
    ClearAllSnapshots {
        /// Blend seconds.
        #[serde(default = "default_blend_time")]
        time: f32,
    },
    /// Load a bank and wait for it.
    LoadBank {
        /// Bank ID.
        bank: String,
    },
    /// Unload a bank.
    UnloadBank {
        /// Bank ID.
        bank: String,
    },
    /// Move the listener.
    Listener {
        /// New listener position.
        position: Vec3,
    },
    /// Filter spatial sounds through an acoustic environment.
    SetEnvironment {
        /// Environment preset.
        environment: AudioEnvironment,
    },
    /// Remove the environment filter.
    ClearEnvironment,
}

/// A scheduled action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Session time in seconds.
    pub at: f32,
    /// What to do.
    #[serde(flatten)]
    pub action: CueAction,
}

impl Cue {
    /// Create a cue.
    #[must_use]
    pub fn new(at: f32, action: CueAction) -> Self {
        Self { at, action }
    }
}

/// An ordered list of cues.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CueScript {
    /// Cues in firing order.
    pub cues: Vec<Cue>,
}

impl CueScript {
    /// Build a script from cues in any order.
    #[must_use]
    pub fn new(mut cues: Vec<Cue>) -> Self {
        cues.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self { cues }
    }

    /// Load a script from a TOML file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ScriptResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let script = Self::parse(&contents)?;
        info!("Loaded {} cues from {}", script.cues.len(), path.display());
        Ok(script)
    }

    /// Parse a script from TOML text.
    pub fn parse(contents: &str) -> ScriptResult<Self> {
        let raw: Self = toml::from_str(contents)?;
        if let Some((index, cue)) = raw.cues.iter().enumerate().find(|(_, c)| c.at < 0.0) {
            return Err(ScriptError::NegativeTime { index, at: cue.at });
        }
        Ok(Self::new(raw.cues))
    }

    /// Time of the last cue.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.cues.last().map_or(0.0, |cue| cue.at)
    }

    /// Script exercising the built-in demo catalog.
    #[must_use]
    pub fn demo() -> Self {
        use CueAction as A;

        let mut cues = vec![
            Cue::new(0.0, A::Listener { position: Vec3::ZERO }),
            Cue::new(0.0, A::PlayMusic { sound: "calm".into(), fade: 1.0 }),
            Cue::new(
                0.5,
                A::Play {
                    sound: "wind".into(),
                    position: None,
                    volume: 1.0,
                    tag: Some("wind".into()),
                },
            ),
            Cue::new(
                2.0,
                A::Play {
                    sound: "explosion".into(),
                    position: Some(Vec3::new(20.0, 0.0, 0.0)),
                    volume: 1.0,
                    tag: None,
                },
            ),
            Cue::new(2.5, A::Play { sound: "click".into(), position: None, volume: 0.8, tag: None }),
            Cue::new(3.0, A::SetParameter { name: "intensity".into(), value: 0.8 }),
            Cue::new(4.0, A::SetSnapshot { name: "pause_menu".into(), time: 0.5 }),
            Cue::new(4.0, A::SetEnvironment { environment: AudioEnvironment::Cave }),
            Cue::new(5.0, A::ClearSnapshot { name: "pause_menu".into(), time: 0.5 }),
            Cue::new(5.0, A::ClearEnvironment),
            Cue::new(5.5, A::LoadBank { bank: "boss".into() }),
            Cue::new(6.0, A::CrossfadeMusic { sound: "boss_theme".into(), time: 2.0 }),
            Cue::new(
                6.5,
                A::Play { sound: "boss_roar".into(), position: None, volume: 1.0, tag: None },
            ),
            Cue::new(7.0, A::Play { sound: "alarm".into(), position: None, volume: 1.0, tag: None }),
            Cue::new(8.0, A::Pause { category: SoundCategory::Sfx }),
            Cue::new(9.0, A::Resume { category: SoundCategory::Sfx }),
            Cue::new(9.5, A::SetMute { muted: true }),
            Cue::new(10.0, A::SetMute { muted: false }),
            Cue::new(10.5, A::Stop { tag: "wind".into(), fade: 1.0 }),
            Cue::new(11.0, A::StopMusic { fade: 0.5 }),
            Cue::new(11.5, A::UnloadBank { bank: "boss".into() }),
        ];

        // A walk from the listener out past the footstep range.
        for step in 0..12u8 {
            let x = f32::from(step) * 3.0;
            cues.push(Cue::new(
                0.5 + f32::from(step) * 0.25,
                A::Play {
                    sound: "footstep".into(),
                    position: Some(Vec3::new(x, 0.0, 0.0)),
                    volume: 1.0,
                    tag: None,
                },
            ));
        }

        Self::new(cues)
    }
}

/// Counters for a script run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Cues fired.
    pub cues_applied: usize,
    /// `play` cues that got no handle.
    pub plays_failed: usize,
    /// Cues naming a tag no `play` cue produced.
    pub unknown_tags: usize,
}

/// Fires a script's cues against an engine.
#[derive(Debug)]
pub struct CuePlayer {
    script: CueScript,
    next: usize,
    tags: HashMap<String, SoundHandle>,
    stats: PlayerStats,
}

impl CuePlayer {
    /// Create a player at the start of a script.
    #[must_use]
    pub fn new(script: CueScript) -> Self {
        Self {
            script,
            next: 0,
            tags: HashMap::new(),
            stats: PlayerStats::default(),
        }
    }

    /// Fire every cue due at or before `now`. Returns the number fired.
    pub fn apply_due<B: AudioBackend>(&mut self, now: f64, engine: &mut SoundEngine<B>) -> usize {
        let mut fired = 0;
        while let Some(cue) = self.script.cues.get(self.next) {
            if f64::from(cue.at) > now + CUE_EPSILON {
                break;
            }
            let action = cue.action.clone();
            self.next += 1;
            self.apply(&action, engine);
            fired += 1;
        }
        self.stats.cues_applied += fired;
        fired
    }

    /// Whether every cue has fired.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.next >= self.script.cues.len()
    }

    /// Handle recorded under a tag.
    #[must_use]
    pub fn handle(&self, tag: &str) -> Option<SoundHandle> {
        self.tags.get(tag).copied()
    }

    /// Run counters.
    #[must_use]
    pub const fn stats(&self) -> PlayerStats {
        self.stats
    }

    fn tagged(&mut self, tag: &str) -> Option<SoundHandle> {
        let handle = self.tags.get(tag).copied();
        if handle.is_none() {
            warn!("Cue references unknown tag '{}'", tag);
            self.stats.unknown_tags += 1;
        }
        handle
    }

    fn apply<B: AudioBackend>(&mut self, action: &CueAction, engine: &mut SoundEngine<B>) {
        debug!("Cue: {:?}", action);
        match action {
            CueAction::Play {
                sound,
                position,
                volume,
                tag,
            } => {
                let handle = engine.play_with(sound, *position, *volume);
                if !handle.is_valid() {
                    self.stats.plays_failed += 1;
                }
                if let Some(tag) = tag {
                    self.tags.insert(tag.clone(), handle);
                }
            },
            CueAction::Stop { tag, fade } => {
                if let Some(handle) = self.tagged(tag) {
                    if *fade > 0.0 {
                        engine.stop_with_fade(handle, *fade);
                    } else {
                        engine.stop(handle);
                    }
                }
            },
            CueAction::FadeSound {
                tag,
                target,
                duration,
            } => {
                if let Some(handle) = self.tagged(tag) {
                    engine.fade_sound(handle, *target, *duration);
                }
            },
            CueAction::MoveSound { tag, position } => {
                if let Some(handle) = self.tagged(tag) {
                    engine.set_sound_position(handle, *position);
                }
            },
            CueAction::StopCategory { category } => engine.stop_category(*category),
            CueAction::StopAll => engine.stop_all(),
            CueAction::PlayMusic { sound, fade } => engine.play_music(sound, *fade),
            CueAction::StopMusic { fade } => engine.stop_music(*fade),
            CueAction::CrossfadeMusic { sound, time } => engine.crossfade_music(sound, *time),
            CueAction::SetParameter { name, value } => engine.set_music_parameter(name, *value),
            CueAction::SetVolume { category, volume } => engine.set_volume(*category, *volume),
            CueAction::SetMute { muted } => engine.set_mute(*muted),
            CueAction::Pause { category } => engine.pause(*category),
            CueAction::Resume { category } => engine.resume(*category),
            CueAction::PauseAll => engine.pause_all(),
            CueAction::ResumeAll => engine.resume_all(),
            CueAction::SetSnapshot { name, time } => engine.set_snapshot(name, *time),
            CueAction::ClearSnapshot { name, time } => engine.clear_snapshot(name, *time),
            CueAction::ClearAllSnapshots { time } => engine.clear_all_snapshots(*time),
            CueAction::LoadBank { bank } => {
                if !pollster::block_on(engine.load_bank_async(bank)) {
                    warn!("Bank '{}' failed to load", bank);
                }
            },
            CueAction::UnloadBank { bank } => engine.unload_bank(bank),
            CueAction::Listener { position } => engine.set_listener_position(*position),
            CueAction::SetEnvironment { environment } => {
                engine.set_sound_processor(Some(Box::new(EnvironmentProcessor::new(*environment))));
            },
            CueAction::ClearEnvironment => engine.set_sound_processor(None),
        }
    }
}
