//! Mixing categories and priority tiers.

use serde::{Deserialize, Serialize};

/// Audio category for volume mixing and bulk pause control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCategory {
    /// Master volume (affects all audio).
    Master,
    /// Background music.
    Music,
    /// Sound effects.
    #[default]
    Sfx,
    /// Voice/dialogue.
    Voice,
    /// Ambient/environmental sounds.
    Ambient,
    /// UI/menu sounds.
    Ui,
}

impl SoundCategory {
    /// Every category that sounds can actually belong to (everything but Master).
    pub const PLAYABLE: [Self; 5] = [Self::Music, Self::Sfx, Self::Voice, Self::Ambient, Self::Ui];

    /// All categories including Master.
    pub const ALL: [Self; 6] = [
        Self::Master,
        Self::Music,
        Self::Sfx,
        Self::Voice,
        Self::Ambient,
        Self::Ui,
    ];

    /// Get the default volume for this category.
    #[must_use]
    pub const fn default_volume(self) -> f32 {
        match self {
            Self::Master | Self::Sfx | Self::Voice => 1.0,
            Self::Music => 0.7,
            Self::Ambient => 0.5,
            Self::Ui => 0.8,
        }
    }

    /// Get a human-readable name for this category.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Master => "Master",
            Self::Music => "Music",
            Self::Sfx => "SFX",
            Self::Voice => "Voice",
            Self::Ambient => "Ambient",
            Self::Ui => "UI",
        }
    }
}

impl std::fmt::Display for SoundCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Priority tier used when the voice pool is at capacity.
///
/// Ordered so that `Low < Normal < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SoundPriority {
    /// Background detail that may be cut first.
    Low,
    /// Most sound effects.
    #[default]
    Normal,
    /// Important gameplay feedback.
    High,
    /// Always admitted; evicts the lowest-priority sound when full.
    Critical,
}
