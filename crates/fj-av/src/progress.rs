//! Progress-line parsing and the observer callbacks that receive it.
//!
//! ffmpeg's `-stats` output prints lines such as
//!
//! ```text
//! frame=  120 fps= 30 q=-1.0 size=    500kB time=00:00:05.00 bitrate= 128.0kbits/s speed=1.02x
//! size=     256kB time=00:00:16.38 bitrate= 128.0kbits/s speed=32.7x
//! ```
//!
//! Audio-only runs usually omit the `frame=` counter, so it is optional.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

static PROGRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:frame=\s*(\d+).*?)?bitrate=\s*([\d.]+)kbits/s.*?speed=\s*([\d.]+)x")
        .expect("progress regex is valid")
});

/// One parsed progress line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    /// Frames processed so far, 0 when the line has no counter.
    pub frame: u64,
    /// Current output bitrate in kbit/s.
    pub bitrate_kbps: f64,
    /// Processing speed relative to real time.
    pub speed: f64,
}

impl ProgressEvent {
    /// Bitrate in bit/s, as reported to stats observers.
    pub fn bitrate_bps(&self) -> u64 {
        (self.bitrate_kbps * 1000.0) as u64
    }
}

/// Parse a single output line. Returns `None` for anything that is not a
/// progress line, including lines reporting `bitrate=N/A`.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let caps = PROGRESS_RE.captures(line)?;

    let frame = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    let bitrate_kbps = caps.get(2)?.as_str().parse().ok()?;
    let speed = caps.get(3)?.as_str().parse().ok()?;

    Some(ProgressEvent {
        frame,
        bitrate_kbps,
        speed,
    })
}

/// `(percentage, frame, bitrate_kbps)`. Percentage is always 0 because the
/// total duration is not known to the supervisor.
pub type ProgressFn = Arc<dyn Fn(f64, u64, f64) + Send + Sync>;

/// `(bitrate_bps, speed, dropped_frames)`. Dropped frames are always 0.
pub type StatsFn = Arc<dyn Fn(u64, f64, u32) + Send + Sync>;

/// Invoked with the session description path once the file exists.
pub type ArtifactFn = Arc<dyn Fn(&Path) + Send + Sync>;

/// The callbacks a running job reports to.
#[derive(Clone, Default)]
pub struct Observers {
    pub progress: Option<ProgressFn>,
    pub stats: Option<StatsFn>,
    /// Session description ready; fires at most once per job.
    pub artifact: Option<ArtifactFn>,
}

impl Observers {
    pub fn is_empty(&self) -> bool {
        self.progress.is_none() && self.stats.is_none() && self.artifact.is_none()
    }

    /// Deliver one event to every registered observer.
    pub fn notify(&self, event: &ProgressEvent) {
        if let Some(ref progress) = self.progress {
            progress(0.0, event.frame, event.bitrate_kbps);
        }
        if let Some(ref stats) = self.stats {
            stats(event.bitrate_bps(), event.speed, 0);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("progress", &self.progress.is_some())
            .field("stats", &self.stats.is_some())
            .field("artifact", &self.artifact.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn parses_video_style_line() {
        let line = "frame=  120 fps= 30 q=-1.0 size=    500kB time=00:00:05.00 bitrate= 128.0kbits/s speed=1.02x";
        let ev = parse_progress_line(line).unwrap();
        assert_eq!(ev.frame, 120);
        assert!((ev.bitrate_kbps - 128.0).abs() < 1e-9);
        assert!((ev.speed - 1.02).abs() < 1e-9);
        assert_eq!(ev.bitrate_bps(), 128_000);
    }

    #[test]
    fn frame_counter_is_optional() {
        let line = "size=     256kB time=00:00:16.38 bitrate= 128.0kbits/s speed=32.7x";
        let ev = parse_progress_line(line).unwrap();
        assert_eq!(ev.frame, 0);
        assert!((ev.speed - 32.7).abs() < 1e-9);
    }

    #[test]
    fn ignores_non_progress_lines() {
        assert!(parse_progress_line("").is_none());
        assert!(parse_progress_line("Input #0, wav, from 'in.wav':").is_none());
        assert!(
            parse_progress_line("size=       0kB time=00:00:00.00 bitrate=N/A speed=   0x")
                .is_none()
        );
        assert!(parse_progress_line("bitrate= 128.0kbits/s").is_none());
    }

    #[test]
    fn observers_receive_translated_values() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let progress_seen = Arc::new(Mutex::new(Vec::new()));

        let stats_sink = Arc::clone(&seen);
        let progress_sink = Arc::clone(&progress_seen);
        let observers = Observers {
            progress: Some(Arc::new(move |pct: f64, frame: u64, kbps: f64| {
                progress_sink.lock().unwrap().push((pct, frame, kbps));
            })),
            stats: Some(Arc::new(move |bps: u64, speed: f64, dropped: u32| {
                stats_sink.lock().unwrap().push((bps, speed, dropped));
            })),
            artifact: None,
        };

        observers.notify(&ProgressEvent {
            frame: 7,
            bitrate_kbps: 64.5,
            speed: 2.0,
        });

        assert_eq!(*progress_seen.lock().unwrap(), vec![(0.0, 7, 64.5)]);
        assert_eq!(*seen.lock().unwrap(), vec![(64_500, 2.0, 0)]);
    }

    #[test]
    fn debug_does_not_require_fn_debug() {
        let observers = Observers::default();
        assert!(observers.is_empty());
        assert_eq!(
            format!("{observers:?}"),
            "Observers { progress: false, stats: false, artifact: false }"
        );
    }
}
