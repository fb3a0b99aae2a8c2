//! Handle and ID types for playing sounds and voices.

use serde::{Deserialize, Serialize};

/// Identifier for a specific playing sound instance.
///
/// A handle is only valid for the generation it was issued in. When the
/// registry slot behind it is reused, the generation is bumped so an old
/// handle can never address the newer sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundHandle {
    id: u32,
    generation: u32,
}

impl SoundHandle {
    /// The invalid handle. Never matches a real instance.
    pub const INVALID: Self = Self {
        id: 0,
        generation: 0,
    };

    /// Creates a handle from its raw parts.
    #[must_use]
    pub const fn new(id: u32, generation: u32) -> Self {
        Self { id, generation }
    }

    /// Returns the raw ID.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Returns the generation the handle was issued in.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Checks if this is anything other than [`SoundHandle::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.id != 0
    }
}

impl Default for SoundHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Display for SoundHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.id, self.generation)
    }
}

/// Identifier of a backend voice (playback channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoiceId(u32);

impl VoiceId {
    /// Creates a voice ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}
