//! Soundstage host: configuration, content loading and scripted sessions.
//!
//! This crate drives a [`soundstage_kernel::SoundEngine`] the way a game
//! would, one `update` per frame:
//! - [`config`]: host settings loaded from `soundstage.toml`
//! - [`catalog`]: sound entries and clips from a TOML manifest
//! - [`script`]: timed cues that call into the engine
//! - [`session`]: the frame loop and its report

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod catalog;
pub mod config;
pub mod script;
pub mod session;
pub mod timing;

pub use catalog::{Catalog, CatalogError};
pub use config::{BackendKind, EngineConfig, CONFIG_FILE};
pub use script::{Cue, CueAction, CuePlayer, CueScript, ScriptError};
pub use session::SessionReport;
pub use timing::FrameClock;
