//! Job model, command compilation, and the fluent builder.

pub mod builder;
pub mod compiler;
pub mod filters;
pub mod result;
pub mod spec;

pub use builder::{JobBuilder, JobHandle, JobListener};
pub use compiler::{compile, CompiledCommand};
pub use result::EncodingResult;
pub use spec::{validate_bitrate, JobSpec, NetworkConfig, OutputTarget, StreamDestination};
