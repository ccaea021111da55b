//! FFprobe-based [`Prober`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into [`AudioMetadata`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{AudioMetadata, Prober};
use crate::command::ToolCommand;
use crate::tools::BinaryLocator;

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober from whatever `locator` resolves `ffprobe` to.
    pub fn from_locator(locator: &dyn BinaryLocator) -> fj_core::Result<Self> {
        locator.locate("ffprobe").map(Self::new)
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe")
            .ok()
            .map(|p| Self { ffprobe_path: p })
    }

    pub async fn probe_async(&self, path: &Path) -> fj_core::Result<AudioMetadata> {
        // ffprobe may run from a different working directory.
        let resolved = std::path::absolute(path)?;

        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(resolved.to_string_lossy().as_ref());

        let output = cmd.execute().await?;
        if output.stdout.trim().is_empty() {
            return Err(fj_core::Error::Probe(format!(
                "ffprobe produced no output for {}",
                resolved.display()
            )));
        }
        parse_ffprobe_json(&output.stdout)
    }
}

impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    fn probe(&self, path: &Path) -> fj_core::Result<AudioMetadata> {
        crate::blocking::block_on(self.probe_async(path))?
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    channel_layout: Option<String>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Parse ffprobe's JSON output.
pub fn parse_ffprobe_json(json: &str) -> fj_core::Result<AudioMetadata> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| fj_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;
    Ok(map_output(ff))
}

fn map_output(ff: FfprobeOutput) -> AudioMetadata {
    let format = ff.format.unwrap_or_default();

    let tags: BTreeMap<String, String> = format
        .tags
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect();

    let audio = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let (sample_rate, channel_layout) = match audio {
        Some(stream) => (
            parse_num(stream.sample_rate.as_deref()).unwrap_or(0),
            stream
                .channel_layout
                .clone()
                .unwrap_or_else(|| format!("{}ch", stream.channels.unwrap_or(0))),
        ),
        None => (0, "unknown".to_string()),
    };

    AudioMetadata {
        format: format.format_name.unwrap_or_else(|| "unknown".into()),
        duration_secs: parse_num(format.duration.as_deref()).unwrap_or(0.0),
        bitrate: parse_num(format.bit_rate.as_deref()).unwrap_or(0),
        sample_rate,
        channel_layout,
        tags,
    }
}

fn parse_num<T: std::str::FromStr>(s: Option<&str>) -> Option<T> {
    s?.trim().parse().ok()
}
