//! Constructors for common audio filter expressions.
//!
//! The returned strings are passed to [`JobBuilder::add_filter`](super::JobBuilder::add_filter)
//! and end up comma-joined in the `-af` argument.

use fj_core::SampleRate;

/// Maximum gain accepted by [`volume`].
pub const MAX_VOLUME: f64 = 10.0;

/// `volume=<v>`; 1.0 leaves the level unchanged. Accepts `0.0..=10.0`.
pub fn volume(volume: f64) -> fj_core::Result<String> {
    if !(0.0..=MAX_VOLUME).contains(&volume) {
        return Err(fj_core::Error::config(format!(
            "volume must be between 0.0 and {MAX_VOLUME}, got {volume}"
        )));
    }
    Ok(format!("volume={volume}"))
}

/// `atrim=start=<s>:duration=<d>`, both in seconds.
pub fn trim(start: f64, duration: f64) -> String {
    format!("atrim=start={start}:duration={duration}")
}

/// `aresample=<hz>`.
pub fn resample(rate: SampleRate) -> String {
    format!("aresample={}", rate.hz())
}
