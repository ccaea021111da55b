//! fj-core: shared errors, configuration, and media-domain enums.
//!
//! This crate is the foundational dependency for the other fj-* crates,
//! providing a unified error type, the JSON configuration model, and the
//! closed sets of codecs, sample rates, channel layouts, and streaming
//! protocols that jobs are described with.

pub mod config;
pub mod error;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
