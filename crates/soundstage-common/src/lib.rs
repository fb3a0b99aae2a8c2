//! # Soundstage Common
//!
//! Common types shared by every Soundstage crate:
//! - Sound and voice handles
//! - Mixing categories and priority tiers
//! - Sound entry descriptors and clip data
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod category;
pub mod entry;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::category::*;
    pub use crate::entry::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;
