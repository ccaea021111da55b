//! # fj-av
//!
//! Building, compiling, and supervising ffmpeg jobs.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`], [`BinaryLocator`]) -- find ffmpeg
//!   and ffprobe from configuration, `PATH`, or a bundled directory.
//! - **Job construction** ([`JobBuilder`]) -- fluent description of a
//!   transcode or network stream, validated and compiled into an exact
//!   argument list ([`CompiledCommand`]).
//! - **Supervised execution** ([`ProcessSupervisor`]) -- runs one ffmpeg
//!   process with timeout and cancellation, draining its output and feeding
//!   progress lines to observers.
//! - **Probing** ([`FfprobeProber`]) -- audio metadata through ffprobe.
//! - **Captured commands** ([`ToolCommand`]) -- short-lived tool invocations.

pub mod artifact;
mod blocking;
pub mod command;
pub mod input;
pub mod job;
pub mod platform;
pub mod probe;
pub mod progress;
pub mod supervisor;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use input::MediaInput;
pub use job::{
    filters, CompiledCommand, EncodingResult, JobBuilder, JobHandle, JobListener, JobSpec,
    NetworkConfig, OutputTarget, StreamDestination,
};
pub use platform::{Os, Platform};
pub use probe::{AudioMetadata, FfprobeProber, Prober};
pub use progress::{parse_progress_line, Observers, ProgressEvent};
pub use supervisor::ProcessSupervisor;
pub use tools::{BinaryLocator, FixedLocator, ToolInfo, ToolRegistry};

pub use tokio_util::sync::CancellationToken;
