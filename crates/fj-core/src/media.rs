//! Media-domain enums for codecs, sample rates, channel layouts, and
//! streaming protocols.
//!
//! Every enum implements `Display` manually (the string ffmpeg expects or the
//! conventional name) and `FromStr` so it can be parsed from CLI arguments and
//! config values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// ---------------------------------------------------------------------------
// AudioCodec
// ---------------------------------------------------------------------------

/// Audio encoders a job can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    #[serde(rename = "libmp3lame")]
    LibMp3Lame,
    #[serde(rename = "libopus")]
    LibOpus,
    Aac,
    Flac,
    PcmS16le,
    PcmU8,
}

impl AudioCodec {
    /// All supported codecs.
    pub const ALL: [AudioCodec; 6] = [
        Self::LibMp3Lame,
        Self::LibOpus,
        Self::Aac,
        Self::Flac,
        Self::PcmS16le,
        Self::PcmU8,
    ];

    /// Encoder name passed to `-c:a`.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::LibMp3Lame => "libmp3lame",
            Self::LibOpus => "libopus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::PcmS16le => "pcm_s16le",
            Self::PcmU8 => "pcm_u8",
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

impl FromStr for AudioCodec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "libmp3lame" | "mp3" => Ok(Self::LibMp3Lame),
            "libopus" | "opus" => Ok(Self::LibOpus),
            "aac" => Ok(Self::Aac),
            "flac" => Ok(Self::Flac),
            "pcm_s16le" => Ok(Self::PcmS16le),
            "pcm_u8" => Ok(Self::PcmU8),
            _ => Err(Error::config(format!("unsupported audio codec: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// SampleRate
// ---------------------------------------------------------------------------

/// Standard sample rates, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SampleRate {
    Hz8000,
    Hz16000,
    Hz22050,
    Hz44100,
    Hz48000,
    Hz96000,
}

impl SampleRate {
    /// The rate in Hz.
    pub fn hz(&self) -> u32 {
        match self {
            Self::Hz8000 => 8_000,
            Self::Hz16000 => 16_000,
            Self::Hz22050 => 22_050,
            Self::Hz44100 => 44_100,
            Self::Hz48000 => 48_000,
            Self::Hz96000 => 96_000,
        }
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> Self {
        rate.hz()
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = Error;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        match hz {
            8_000 => Ok(Self::Hz8000),
            16_000 => Ok(Self::Hz16000),
            22_050 => Ok(Self::Hz22050),
            44_100 => Ok(Self::Hz44100),
            48_000 => Ok(Self::Hz48000),
            96_000 => Ok(Self::Hz96000),
            other => Err(Error::config(format!("unsupported sample rate: {other}"))),
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hz())
    }
}

impl FromStr for SampleRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hz: u32 = s
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("invalid sample rate: {s}")))?;
        Self::try_from(hz)
    }
}

// ---------------------------------------------------------------------------
// ChannelLayout
// ---------------------------------------------------------------------------

/// Output channel layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    #[serde(rename = "mono")]
    Mono,
    #[serde(rename = "stereo")]
    Stereo,
    #[serde(rename = "5.1")]
    Surround51,
}

impl ChannelLayout {
    /// Channel count passed to `-ac`.
    pub fn channels(&self) -> u8 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Surround51 => 6,
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mono => write!(f, "mono"),
            Self::Stereo => write!(f, "stereo"),
            Self::Surround51 => write!(f, "5.1"),
        }
    }
}

impl FromStr for ChannelLayout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mono" | "1" => Ok(Self::Mono),
            "stereo" | "2" => Ok(Self::Stereo),
            "5.1" | "6" => Ok(Self::Surround51),
            _ => Err(Error::config(format!("unsupported channel layout: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// StreamingProtocol
// ---------------------------------------------------------------------------

/// Network protocols a job can stream to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingProtocol {
    Rtp,
    Udp,
    Srt,
    Rtsp,
}

impl StreamingProtocol {
    /// URI scheme, without `://`.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Rtp => "rtp",
            Self::Udp => "udp",
            Self::Srt => "srt",
            Self::Rtsp => "rtsp",
        }
    }

    /// Detect the protocol of a URI from its scheme prefix.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (scheme, _) = uri.split_once("://")?;
        scheme.parse().ok()
    }
}

impl fmt::Display for StreamingProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for StreamingProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rtp" => Ok(Self::Rtp),
            "udp" => Ok(Self::Udp),
            "srt" => Ok(Self::Srt),
            "rtsp" => Ok(Self::Rtsp),
            _ => Err(Error::config(format!("unsupported streaming protocol: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// RTP payload types
// ---------------------------------------------------------------------------

/// Standard RTP payload type numbers (RFC 3551) and the dynamic ones ffjob
/// uses for Opus and AAC.
pub mod rtp_payload {
    pub const PCMU: u8 = 0;
    pub const DVI4_8000: u8 = 5;
    pub const DVI4_16000: u8 = 6;
    pub const LPC: u8 = 7;
    pub const PCMA: u8 = 8;
    pub const G722: u8 = 9;
    pub const L16_STEREO: u8 = 10;
    pub const L16_MONO: u8 = 11;

    // Dynamic range (96-127).
    pub const OPUS: u8 = 96;
    pub const AAC_LATM: u8 = 97;
}
