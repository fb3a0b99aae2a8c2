//! # Soundstage Kernel
//!
//! Frame-driven sound playback engine for games.
//!
//! This crate provides:
//! - A bounded pool of reusable voices
//! - A registry of active sounds addressed by generational handles
//! - Admission control (cooldowns, instance limits, priority eviction)
//! - Two-channel music transport with crossfades and named parameters
//! - Category mixing, mute, pause and blended snapshots
//! - An optional per-tick sound processor hook
//!
//! ## Architecture
//!
//! [`SoundEngine`] is driven by the host calling `update(delta)` once per
//! frame. It never mixes samples itself: an [`AudioBackend`] creates voices
//! and does the actual rendering. Two backends ship with the crate:
//! - [`SimulatedBackend`]: deterministic virtual clock, no device needed
//! - `RodioBackend` (feature `rodio-backend`): real output through rodio
//!
//! ## Handles
//!
//! Every successful `play` returns a [`SoundHandle`](soundstage_common::SoundHandle).
//! Handles carry a generation so a handle to a finished sound never
//! addresses whatever reuses its slot later.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod admission;
pub mod backend;
pub mod config;
pub mod fade;
pub mod library;
pub mod mix;
pub mod music;
pub mod processor;
pub mod provider;
pub mod registry;
#[cfg(feature = "rodio-backend")]
pub mod rodio_backend;
pub mod sim_backend;
pub mod spatial;
pub mod voice_pool;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::admission::*;
    pub use crate::backend::*;
    pub use crate::config::*;
    pub use crate::fade::*;
    pub use crate::library::*;
    pub use crate::mix::*;
    pub use crate::music::*;
    pub use crate::processor::*;
    pub use crate::provider::*;
    pub use crate::registry::*;
    #[cfg(feature = "rodio-backend")]
    pub use crate::rodio_backend::*;
    pub use crate::sim_backend::*;
    pub use crate::spatial::*;
    pub use crate::voice_pool::*;
}

pub use prelude::*;
