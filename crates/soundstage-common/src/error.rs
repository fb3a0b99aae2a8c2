//! Error types for Soundstage.
//!
//! Runtime playback denials (missing sounds, a full voice pool, stale
//! handles) are not errors: they are logged and the call degrades to a
//! no-op. These types cover lifecycle contract violations and backend
//! failures only.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for Soundstage operations.
#[derive(Debug, Error)]
pub enum SoundError {
    /// `initialize` was called on an engine that is already running.
    #[error("Sound engine is already initialized")]
    AlreadyInitialized,

    /// The engine was disposed and cannot be used again.
    #[error("Sound engine has been disposed")]
    Disposed,

    /// The audio output device could not be opened.
    #[error("Failed to initialize audio device: {0}")]
    DeviceInit(String),

    /// The backend could not create a voice.
    #[error("Failed to create voice: {0}")]
    VoiceCreation(String),

    /// A clip file could not be loaded or decoded.
    #[error("Failed to load clip '{path}': {message}")]
    ClipLoad {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Error message.
        message: String,
    },
}

/// Result type for sound operations.
pub type SoundResult<T> = Result<T, SoundError>;
