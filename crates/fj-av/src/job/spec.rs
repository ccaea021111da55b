//! The declarative description of one job.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use fj_core::{AudioCodec, ChannelLayout, SampleRate, StreamingProtocol};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::progress::Observers;

static BITRATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d+[kM]?$").expect("bitrate regex is valid"));

/// Check a bitrate string such as `128k`, `1M` or `320000`.
pub fn validate_bitrate(bitrate: &str) -> fj_core::Result<()> {
    if BITRATE_RE.is_match(bitrate) {
        Ok(())
    } else {
        Err(fj_core::Error::config(format!(
            "invalid bitrate format: {bitrate}; expected something like '128k' or '1M'"
        )))
    }
}

// ---------------------------------------------------------------------------
// StreamDestination
// ---------------------------------------------------------------------------

/// A network URI a job streams to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamDestination {
    uri: String,
    protocol: StreamingProtocol,
}

impl StreamDestination {
    pub fn rtp(host: &str, port: u16) -> Self {
        Self::from_parts(StreamingProtocol::Rtp, host, port)
    }

    pub fn udp(host: &str, port: u16) -> Self {
        Self::from_parts(StreamingProtocol::Udp, host, port)
    }

    pub fn srt(host: &str, port: u16) -> Self {
        Self::from_parts(StreamingProtocol::Srt, host, port)
    }

    fn from_parts(protocol: StreamingProtocol, host: &str, port: u16) -> Self {
        Self {
            uri: format!("{}://{host}:{port}", protocol.scheme()),
            protocol,
        }
    }

    /// Parse a full URI. The scheme must be a known [`StreamingProtocol`]
    /// and something must follow `://`.
    pub fn parse(uri: &str) -> fj_core::Result<Self> {
        let protocol = StreamingProtocol::from_uri(uri).ok_or_else(|| {
            fj_core::Error::config(format!("unsupported stream destination: {uri}"))
        })?;
        let rest = uri.split_once("://").map(|(_, rest)| rest).unwrap_or("");
        if rest.is_empty() {
            return Err(fj_core::Error::config(format!(
                "stream destination has no address: {uri}"
            )));
        }
        Ok(Self {
            uri: uri.to_string(),
            protocol,
        })
    }

    pub fn protocol(&self) -> StreamingProtocol {
        self.protocol
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl fmt::Display for StreamDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl FromStr for StreamDestination {
    type Err = fj_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StreamDestination {
    type Error = fj_core::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<StreamDestination> for String {
    fn from(dest: StreamDestination) -> Self {
        dest.uri
    }
}

// ---------------------------------------------------------------------------
// NetworkConfig
// ---------------------------------------------------------------------------

/// Transport tuning for stream destinations. Ignored for file output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Multicast time-to-live, 0 = leave ffmpeg's default.
    pub ttl: u32,
    /// Real-time buffer size (`-rtbufsize`) in bytes, 0 = default.
    pub buffer_size: u64,
    /// Disable demuxer buffering (`-fflags nobuffer`).
    pub no_buffer: bool,
    /// Explicit RTCP port appended to the URI.
    pub rtcp_port: Option<u16>,
}

impl NetworkConfig {
    /// TTL 32, 2 MiB buffer, buffering disabled, no RTCP port.
    pub fn default_low_latency() -> Self {
        Self {
            ttl: 32,
            buffer_size: 2 * 1024 * 1024,
            no_buffer: true,
            rtcp_port: None,
        }
    }
}

// ---------------------------------------------------------------------------
// OutputTarget
// ---------------------------------------------------------------------------

/// Where a compiled job writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    File(PathBuf),
    Stream(StreamDestination),
}

// ---------------------------------------------------------------------------
// JobSpec
// ---------------------------------------------------------------------------

/// Every parameter of one transcode or streaming job.
///
/// `None`, `false`, and empty collections mean "omit the argument".
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    pub input: String,
    pub output_path: Option<PathBuf>,
    pub stream: Option<StreamDestination>,

    pub codec: Option<AudioCodec>,
    pub bitrate: Option<String>,
    pub sample_rate: Option<SampleRate>,
    pub channels: Option<ChannelLayout>,
    pub filters: Vec<String>,

    pub live_source: bool,
    pub read_rate: Option<f64>,
    pub wallclock: bool,
    pub probe_size: Option<u64>,
    pub analyze_duration: Option<u64>,
    pub network: Option<NetworkConfig>,

    pub sdp_path: Option<PathBuf>,
    /// Tags in insertion order; keys are unique.
    pub metadata: Vec<(String, String)>,
    /// Seconds, 0 = unbounded.
    pub timeout_secs: u64,

    pub observers: Observers,
}

impl JobSpec {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    /// Insert a tag, replacing the value of an existing key in place.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.metadata.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.metadata.push((key, value)),
        }
    }

    /// Check the invariants that must hold before compilation.
    ///
    /// Does not touch the filesystem; see
    /// [`JobBuilder::validate`](crate::job::JobBuilder::validate).
    pub fn validate(&self) -> fj_core::Result<OutputTarget> {
        if self.input.trim().is_empty() {
            return Err(fj_core::Error::config("input source is not set"));
        }
        if let Some(ref bitrate) = self.bitrate {
            validate_bitrate(bitrate)?;
        }
        match (&self.output_path, &self.stream) {
            (Some(path), None) => Ok(OutputTarget::File(path.clone())),
            (None, Some(dest)) => Ok(OutputTarget::Stream(dest.clone())),
            (None, None) => Err(fj_core::Error::config(
                "no output specified; set an output path or a stream destination",
            )),
            (Some(_), Some(_)) => Err(fj_core::Error::config(
                "both an output path and a stream destination are set",
            )),
        }
    }
}
