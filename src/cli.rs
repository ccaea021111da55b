use clap::{Parser, Subcommand};
use fj_core::{AudioCodec, ChannelLayout, SampleRate};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ffjob")]
#[command(author, version, about = "Build and run supervised ffmpeg audio jobs")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcode a media file into an audio file
    Transcode {
        /// Input file
        #[arg(required = true)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        encoding: EncodingArgs,

        /// Volume multiplier (0.0 to 10.0)
        #[arg(long)]
        volume: Option<f64>,

        /// Metadata tag as KEY=VALUE (repeatable)
        #[arg(short, long = "metadata", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,

        /// Kill ffmpeg after this many seconds (0 = no limit)
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the ffmpeg command line without running it
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stream an input to an rtp://, udp:// or srt:// destination
    Stream {
        /// Input file or URL
        #[arg(required = true)]
        input: String,

        /// Destination URI
        #[arg(long = "to")]
        destination: String,

        #[command(flatten)]
        encoding: EncodingArgs,

        /// Read the input at native pace
        #[arg(long)]
        live: bool,

        /// Explicit read rate multiplier, instead of native pace
        #[arg(long)]
        read_rate: Option<f64>,

        /// Write the session description (SDP) to this path
        #[arg(long)]
        sdp: Option<PathBuf>,

        /// RTCP port for RTP destinations
        #[arg(long)]
        rtcp_port: Option<u16>,

        /// Skip input probing so output starts immediately
        #[arg(long)]
        instant_startup: bool,

        /// Stop after this many seconds (0 = until interrupted)
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the ffmpeg command line without running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Probe a media file and display audio information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg and ffprobe are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Encoding options shared by `transcode` and `stream`.
#[derive(clap::Args)]
pub struct EncodingArgs {
    /// Audio codec (libmp3lame, libopus, aac, flac, pcm_s16le, pcm_u8)
    #[arg(long)]
    pub codec: Option<AudioCodec>,

    /// Audio bitrate, e.g. 128k or 1M
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// Sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<SampleRate>,

    /// Channel layout (mono, stereo, 5.1)
    #[arg(long)]
    pub channels: Option<ChannelLayout>,

    /// Raw audio filter expression (repeatable, applied in order)
    #[arg(long = "filter")]
    pub filters: Vec<String>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}
