//! Media metadata probing.
//!
//! [`FfprobeProber`] shells out to ffprobe and implements [`Prober`], the
//! interface the rest of the crate depends on.

pub mod ffprobe;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

pub use self::ffprobe::FfprobeProber;

/// Probe a file and describe its audio.
pub trait Prober: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn probe(&self, path: &Path) -> fj_core::Result<AudioMetadata>;
}

/// Format-level information plus the first audio stream's parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioMetadata {
    /// Container name as reported by the prober, `unknown` when absent.
    pub format: String,
    pub duration_secs: f64,
    /// Overall bitrate in bit/s, 0 when unknown.
    pub bitrate: u64,
    /// Sample rate of the first audio stream, 0 when there is none.
    pub sample_rate: u32,
    /// e.g. `stereo`, `5.1(side)`, `<n>ch`, or `unknown`.
    pub channel_layout: String,
    pub tags: BTreeMap<String, String>,
}

impl AudioMetadata {
    pub fn duration_millis(&self) -> u64 {
        (self.duration_secs * 1000.0) as u64
    }
}
