//! Translation of a [`JobSpec`] into an ffmpeg argument list.
//!
//! ffmpeg is sensitive to argument order: input options must precede `-i`,
//! output options must follow it, and the destination comes last. The order
//! produced here is part of the contract with the tool and is pinned by the
//! golden tests below.

use std::fmt;
use std::path::{Path, PathBuf};

use fj_core::StreamingProtocol;
use serde::Serialize;

use super::spec::{JobSpec, OutputTarget};

/// The argument list for one execution, ready to spawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub output: OutputTarget,
}

impl CompiledCommand {
    /// All tokens, executable first.
    pub fn tokens(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Whether the job writes to a network destination.
    pub fn is_stream(&self) -> bool {
        matches!(self.output, OutputTarget::Stream(_))
    }
}

impl fmt::Display for CompiledCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens().join(" "))
    }
}

/// Build the command for an already validated spec.
///
/// `output` is the target returned by [`JobSpec::validate`]; compilation
/// itself never fails.
pub fn compile(spec: &JobSpec, ffmpeg: &Path, output: OutputTarget) -> CompiledCommand {
    let mut args: Vec<String> = Vec::new();
    args.push("-hide_banner".into());
    push_opt(&mut args, "-loglevel", "warning");

    let stream = match &output {
        OutputTarget::Stream(dest) => Some(dest),
        OutputTarget::File(_) => None,
    };
    // Network tuning only applies to stream destinations.
    let network = stream.and(spec.network);

    // Input-side tuning.
    if let Some(size) = spec.probe_size {
        push_opt(&mut args, "-probesize", size);
    }
    if let Some(duration) = spec.analyze_duration {
        push_opt(&mut args, "-analyzeduration", duration);
    }

    if spec.live_source {
        match spec.read_rate {
            Some(rate) => push_opt(&mut args, "-readrate", rate),
            None => args.push("-re".into()),
        }
        if spec.wallclock {
            push_opt(&mut args, "-use_wallclock_as_timestamps", 1);
        }
        if network.is_some_and(|n| n.no_buffer) {
            push_opt(&mut args, "-fflags", "nobuffer");
        }
    }

    args.push("-y".into());
    args.push("-stats".into());
    push_opt(&mut args, "-i", &spec.input);

    // Encoding parameters.
    if let Some(codec) = spec.codec {
        push_opt(&mut args, "-c:a", codec.ffmpeg_name());
    }
    if let Some(ref bitrate) = spec.bitrate {
        push_opt(&mut args, "-b:a", bitrate);
    }
    if let Some(rate) = spec.sample_rate {
        push_opt(&mut args, "-ar", rate.hz());
    }
    if let Some(layout) = spec.channels {
        push_opt(&mut args, "-ac", layout.channels());
    }
    if !spec.filters.is_empty() {
        push_opt(&mut args, "-af", spec.filters.join(","));
    }

    if let Some(net) = network {
        if net.ttl > 0 {
            push_opt(&mut args, "-ttl", net.ttl);
        }
        if net.buffer_size > 0 {
            push_opt(&mut args, "-rtbufsize", net.buffer_size);
        }
    }

    if let Some(ref sdp) = spec.sdp_path {
        push_opt(&mut args, "-sdp_file", sdp.display());
    }

    for (key, value) in &spec.metadata {
        push_opt(&mut args, "-metadata", format!("{key}={value}"));
    }

    match &output {
        OutputTarget::Stream(dest) => {
            let mut uri = dest.uri().to_string();
            if let Some(port) = network.and_then(|n| n.rtcp_port) {
                let sep = if uri.contains('?') { '&' } else { '?' };
                uri.push_str(&format!("{sep}rtcpport={port}"));
            }
            // ffmpeg cannot infer the muxer from the rtp:// scheme alone.
            if dest.protocol() == StreamingProtocol::Rtp {
                push_opt(&mut args, "-f", "rtp");
            }
            args.push(uri);
        }
        OutputTarget::File(path) => args.push(path.to_string_lossy().to_string()),
    }

    CompiledCommand {
        program: ffmpeg.to_path_buf(),
        args,
        output,
    }
}

fn push_opt(args: &mut Vec<String>, flag: &str, value: impl fmt::Display) {
    args.push(flag.to_string());
    args.push(value.to_string());
}
