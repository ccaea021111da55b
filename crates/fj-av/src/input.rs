//! Entry point for jobs that start from a local media file.

use std::path::{Path, PathBuf};

use crate::job::{JobBuilder, StreamDestination};
use crate::probe::{AudioMetadata, FfprobeProber, Prober};
use crate::tools::ToolRegistry;

/// A local media file that has been checked to exist and be readable.
#[derive(Debug, Clone)]
pub struct MediaInput {
    path: PathBuf,
}

impl MediaInput {
    /// Open `path` as a job input.
    ///
    /// # Errors
    ///
    /// [`fj_core::Error::Config`] if the path does not exist, is not a
    /// regular file, or cannot be opened for reading.
    pub fn open(path: impl AsRef<Path>) -> fj_core::Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|_| {
            fj_core::Error::config(format!("input file does not exist: {}", path.display()))
        })?;
        if !meta.is_file() {
            return Err(fj_core::Error::config(format!(
                "input is not a file: {}",
                path.display()
            )));
        }
        std::fs::File::open(path).map_err(|e| {
            fj_core::Error::config(format!("input file is not readable: {}: {e}", path.display()))
        })?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a file-to-file job.
    pub fn output(&self, path: impl Into<PathBuf>) -> JobBuilder {
        self.builder().output(path)
    }

    /// Start a streaming job.
    pub fn to_stream(&self, destination: StreamDestination) -> JobBuilder {
        self.builder().to_stream(destination)
    }

    /// Start a job that reads this file at native pace.
    pub fn as_live_source(&self) -> JobBuilder {
        self.builder().as_live_source()
    }

    /// Probe with ffprobe found by default discovery.
    pub fn probe(&self) -> fj_core::Result<AudioMetadata> {
        let registry = ToolRegistry::discover(&Default::default());
        self.probe_with(&FfprobeProber::from_locator(&registry)?)
    }

    pub fn probe_with(&self, prober: &dyn Prober) -> fj_core::Result<AudioMetadata> {
        tracing::debug!("probing {} with {}", self.path.display(), prober.name());
        prober.probe(&self.path)
    }

    fn builder(&self) -> JobBuilder {
        JobBuilder::new(self.path.to_string_lossy())
    }
}
