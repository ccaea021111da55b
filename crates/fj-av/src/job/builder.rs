//! Fluent job construction and execution.
//!
//! A [`JobBuilder`] accumulates a [`JobSpec`], validates it, compiles it into
//! a [`CompiledCommand`] and hands it to the [`ProcessSupervisor`]. Every
//! execution works on its own snapshot of the spec, so a builder can be
//! reused for several runs.
//!
//! ```no_run
//! use fj_av::job::{filters, JobBuilder};
//! use fj_core::{AudioCodec, SampleRate};
//!
//! # fn example() -> fj_core::Result<()> {
//! let result = JobBuilder::new("input.wav")
//!     .output("out/track.mp3")
//!     .with_codec(AudioCodec::LibMp3Lame)
//!     .with_bitrate("192k")?
//!     .with_sample_rate(SampleRate::Hz44100)
//!     .add_filter(filters::volume(0.8)?)
//!     .on_progress(|_, frame, kbps| println!("frame {frame} at {kbps} kbit/s"))
//!     .execute()?;
//! println!("wrote {:.1} KB", result.file_size_kb());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fj_core::config::{ArtifactPollConfig, Config, SupervisorConfig};
use fj_core::{AudioCodec, ChannelLayout, SampleRate};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::compiler::{compile, CompiledCommand};
use super::result::EncodingResult;
use super::spec::{validate_bitrate, JobSpec, NetworkConfig, OutputTarget, StreamDestination};
use crate::artifact::spawn_artifact_poller;
use crate::progress::ProgressFn;
use crate::supervisor::ProcessSupervisor;
use crate::tools::{BinaryLocator, FixedLocator, ToolRegistry};

/// Lifecycle notifications for [`JobBuilder::spawn_with_listener`].
pub trait JobListener: Send + Sync {
    /// Called before launch with the space-joined command line.
    fn on_start(&self, _command_line: &str) {}

    /// Called for every progress line, in output order.
    fn on_progress(&self, _percentage: f64, _frame: u64, _bitrate_kbps: f64) {}

    fn on_success(&self, result: &EncodingResult);

    fn on_error(&self, error: &fj_core::Error);
}

/// Fluent builder for a single ffmpeg job.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    spec: JobSpec,
    locator: Option<Arc<dyn BinaryLocator>>,
    supervisor: SupervisorConfig,
    artifact_poll: ArtifactPollConfig,
}

impl JobBuilder {
    /// Start a job reading from `input` (a path or any URL ffmpeg accepts).
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            spec: JobSpec::new(input),
            locator: None,
            supervisor: SupervisorConfig::default(),
            artifact_poll: ArtifactPollConfig::default(),
        }
    }

    /// The spec accumulated so far.
    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    // -- destination ---------------------------------------------------------

    /// Write to a file. Does not clear a stream destination; setting both is
    /// rejected by validation.
    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.output_path = Some(path.into());
        self
    }

    /// Stream to a network destination, replacing any output path.
    #[must_use]
    pub fn to_stream(mut self, destination: StreamDestination) -> Self {
        self.spec.stream = Some(destination);
        self.spec.output_path = None;
        self
    }

    // -- encoding ------------------------------------------------------------

    #[must_use]
    pub fn with_codec(mut self, codec: AudioCodec) -> Self {
        self.spec.codec = Some(codec);
        self
    }

    /// Set the audio bitrate (`128k`, `1M`, `320000`).
    ///
    /// # Errors
    ///
    /// [`fj_core::Error::Config`] if the value is not digits with an optional
    /// `k`/`M` suffix.
    pub fn with_bitrate(mut self, bitrate: impl Into<String>) -> fj_core::Result<Self> {
        let bitrate = bitrate.into();
        validate_bitrate(&bitrate)?;
        self.spec.bitrate = Some(bitrate);
        Ok(self)
    }

    #[must_use]
    pub fn with_sample_rate(mut self, rate: SampleRate) -> Self {
        self.spec.sample_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn with_channels(mut self, layout: ChannelLayout) -> Self {
        self.spec.channels = Some(layout);
        self
    }

    /// Append a filter expression; see [`super::filters`].
    #[must_use]
    pub fn add_filter(mut self, filter: impl Into<String>) -> Self {
        self.spec.filters.push(filter.into());
        self
    }

    /// Set a metadata tag. A repeated key replaces the earlier value.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.set_metadata(key, value);
        self
    }

    // -- live streaming ------------------------------------------------------

    /// Read the input at native pace for live streaming.
    ///
    /// Turns wallclock timestamps off and installs
    /// [`NetworkConfig::default_low_latency`] unless network tuning was
    /// already configured.
    #[must_use]
    pub fn as_live_source(mut self) -> Self {
        self.spec.live_source = true;
        self.spec.wallclock = false;
        if self.spec.network.is_none() {
            self.spec.network = Some(NetworkConfig::default_low_latency());
        }
        self
    }

    /// Explicit pacing multiplier (`-readrate`), used instead of `-re`.
    #[must_use]
    pub fn with_read_rate(mut self, rate: f64) -> Self {
        self.spec.read_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn with_wallclock(mut self, enabled: bool) -> Self {
        self.spec.wallclock = enabled;
        self
    }

    /// Minimal probing so output starts as soon as possible.
    #[must_use]
    pub fn with_instant_startup(mut self) -> Self {
        self.spec.probe_size = Some(32);
        self.spec.analyze_duration = Some(0);
        self
    }

    #[must_use]
    pub fn with_probe_size(mut self, bytes: u64) -> Self {
        self.spec.probe_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_analyze_duration(mut self, micros: u64) -> Self {
        self.spec.analyze_duration = Some(micros);
        self
    }

    #[must_use]
    pub fn with_network_config(mut self, config: NetworkConfig) -> Self {
        self.spec.network = Some(config);
        self
    }

    /// Have ffmpeg write the session description to `path`.
    #[must_use]
    pub fn save_sdp_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.sdp_path = Some(path.into());
        self
    }

    // -- callbacks -----------------------------------------------------------

    /// Called once the session description file exists.
    #[must_use]
    pub fn on_sdp_created(mut self, callback: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.spec.observers.artifact = Some(Arc::new(callback));
        self
    }

    /// `(percentage, frame, bitrate_kbps)`; percentage is always 0.
    #[must_use]
    pub fn on_progress(mut self, callback: impl Fn(f64, u64, f64) + Send + Sync + 'static) -> Self {
        self.spec.observers.progress = Some(Arc::new(callback));
        self
    }

    /// `(bitrate_bps, speed, dropped_frames)`; dropped frames are always 0.
    #[must_use]
    pub fn on_stream_stats(mut self, callback: impl Fn(u64, f64, u32) + Send + Sync + 'static) -> Self {
        self.spec.observers.stats = Some(Arc::new(callback));
        self
    }

    // -- execution settings --------------------------------------------------

    /// Kill the process after `secs` seconds; 0 disables the timeout.
    #[must_use]
    pub fn timeout(mut self, secs: u64) -> Self {
        self.spec.timeout_secs = secs;
        self
    }

    /// Resolve ffmpeg through `locator` instead of a `PATH` lookup.
    #[must_use]
    pub fn with_tools(mut self, locator: Arc<dyn BinaryLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Use the ffmpeg executable at `path`.
    #[must_use]
    pub fn with_ffmpeg_path(self, path: impl Into<PathBuf>) -> Self {
        self.with_tools(Arc::new(FixedLocator::new(path)))
    }

    /// Apply defaults from a loaded [`Config`]: timeout, tool locations,
    /// supervisor grace periods, and session description polling.
    #[must_use]
    pub fn with_config(mut self, config: &Config) -> Self {
        self.spec.timeout_secs = config.job.timeout_secs;
        self.supervisor = config.supervisor;
        self.artifact_poll = config.artifact_poll;
        self.locator = Some(Arc::new(ToolRegistry::discover(&config.tools)));
        self
    }

    // -- validation and compilation -----------------------------------------

    /// Check the spec and create the output file's parent directory if it is
    /// missing.
    pub fn validate(&self) -> fj_core::Result<OutputTarget> {
        let target = self.spec.validate()?;
        if let OutputTarget::File(ref path) = target {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if !parent.exists() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!("could not create {}: {e}", parent.display());
                    }
                }
            }
        }
        Ok(target)
    }

    fn resolve_ffmpeg(&self) -> fj_core::Result<PathBuf> {
        match self.locator {
            Some(ref locator) => locator.locate("ffmpeg"),
            None => ToolRegistry::discover(&Default::default()).locate("ffmpeg"),
        }
    }

    /// Compile without touching the filesystem, for dry runs.
    pub fn compile(&self) -> fj_core::Result<CompiledCommand> {
        let target = self.spec.validate()?;
        let ffmpeg = self.resolve_ffmpeg()?;
        Ok(compile(&self.spec, &ffmpeg, target))
    }

    /// The command line [`JobBuilder::execute`] would run.
    pub fn command_line(&self) -> fj_core::Result<String> {
        self.compile().map(|cmd| cmd.to_string())
    }

    fn prepare(&self) -> fj_core::Result<CompiledCommand> {
        let target = self.validate()?;
        let ffmpeg = self.resolve_ffmpeg()?;
        let command = compile(&self.spec, &ffmpeg, target);
        tracing::debug!("compiled: {command}");
        Ok(command)
    }

    async fn supervise(
        &self,
        command: &CompiledCommand,
        cancel: &CancellationToken,
    ) -> fj_core::Result<EncodingResult> {
        tracing::info!("starting ffmpeg job for {}", self.spec.input);
        ProcessSupervisor::new(self.supervisor)
            .run(
                command,
                &self.spec.observers,
                Duration::from_secs(self.spec.timeout_secs),
                cancel,
            )
            .await
    }

    // -- execution -----------------------------------------------------------

    /// Run the job and wait for it, from async code.
    pub async fn run(&self, cancel: &CancellationToken) -> fj_core::Result<EncodingResult> {
        let command = self.prepare()?;
        self.supervise(&command, cancel).await
    }

    /// Run the job and block until it finishes.
    ///
    /// If a session description path and callback are set and the file
    /// exists after a successful run, the callback fires once.
    pub fn execute(&self) -> fj_core::Result<EncodingResult> {
        let command = self.prepare()?;
        let cancel = CancellationToken::new();
        let result = crate::blocking::block_on(self.supervise(&command, &cancel))??;

        if let (Some(path), Some(callback)) = (&self.spec.sdp_path, &self.spec.observers.artifact) {
            if path.exists() {
                callback(path);
            }
        }
        Ok(result)
    }

    /// Start the job on a Tokio task and return immediately.
    ///
    /// Configuration errors are returned here, before anything is spawned.
    /// If a session description path and callback are set, a poller watches
    /// for the file alongside the job.
    pub fn spawn(&self) -> fj_core::Result<JobHandle> {
        self.spawn_inner(None)
    }

    /// Like [`JobBuilder::spawn`], reporting the whole lifecycle to
    /// `listener`. Progress goes to both the listener and any
    /// [`JobBuilder::on_progress`] callback.
    pub fn spawn_with_listener(&self, listener: Arc<dyn JobListener>) -> fj_core::Result<JobHandle> {
        self.spawn_inner(Some(listener))
    }

    fn spawn_inner(&self, listener: Option<Arc<dyn JobListener>>) -> fj_core::Result<JobHandle> {
        tokio::runtime::Handle::try_current()
            .map_err(|_| fj_core::Error::config("spawning a job requires a Tokio runtime"))?;

        let mut job = self.clone();
        if let Some(ref listener) = listener {
            let previous = job.spec.observers.progress.take();
            let listener = Arc::clone(listener);
            let combined: ProgressFn = Arc::new(move |pct: f64, frame: u64, kbps: f64| {
                if let Some(ref previous) = previous {
                    previous(pct, frame, kbps);
                }
                listener.on_progress(pct, frame, kbps);
            });
            job.spec.observers.progress = Some(combined);
        }

        let command = match job.prepare() {
            Ok(command) => command,
            Err(e) => {
                if let Some(ref listener) = listener {
                    listener.on_error(&e);
                }
                return Err(e);
            }
        };
        let command_line = command.to_string();
        if let Some(ref listener) = listener {
            listener.on_start(&command_line);
        }

        let cancel = CancellationToken::new();

        if let (Some(path), Some(callback)) =
            (job.spec.sdp_path.clone(), job.spec.observers.artifact.clone())
        {
            spawn_artifact_poller(path, callback, job.artifact_poll, cancel.child_token());
        }

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let result = job.supervise(&command, &token).await;
            if let Some(listener) = listener {
                match result {
                    Ok(ref r) => listener.on_success(r),
                    Err(ref e) => listener.on_error(e),
                }
            }
            result
        });

        Ok(JobHandle {
            command_line,
            cancel,
            task,
        })
    }
}

/// A job running on a Tokio task.
///
/// Dropping the handle detaches the job; it keeps running until it exits.
#[derive(Debug)]
pub struct JobHandle {
    command_line: String,
    cancel: CancellationToken,
    task: JoinHandle<fj_core::Result<EncodingResult>>,
}

impl JobHandle {
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Kill the process. [`JobHandle::wait`] then returns
    /// [`fj_core::Error::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this job when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job's outcome.
    pub async fn wait(self) -> fj_core::Result<EncodingResult> {
        self.task
            .await
            .map_err(|e| fj_core::Error::execution(-1, format!("job task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn fake_ffmpeg() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ffmpeg");
        std::fs::write(&path, b"").unwrap();
        (dir, path)
    }

    #[test]
    fn bitrate_rejected_at_configuration() {
        assert_matches!(
            JobBuilder::new("in.wav").with_bitrate("high"),
            Err(fj_core::Error::Config(_))
        );
        assert!(JobBuilder::new("in.wav").with_bitrate("128k").is_ok());
        assert!(JobBuilder::new("in.wav").with_bitrate("1M").is_ok());
    }

    #[test]
    fn no_output_fails_validation() {
        let err = JobBuilder::new("in.wav").validate().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn no_output_fails_before_binary_lookup() {
        let err = JobBuilder::new("in.wav")
            .with_ffmpeg_path("/nonexistent/ffmpeg")
            .execute()
            .unwrap_err();
        assert!(err.is_config(), "unexpected error: {err}");
    }

    #[test]
    fn to_stream_replaces_output() {
        let builder = JobBuilder::new("in.wav")
            .output("out.mp3")
            .to_stream(StreamDestination::rtp("127.0.0.1", 5004));
        assert!(builder.spec().output_path.is_none());
        assert!(builder.validate().is_ok());
    }

    #[test]
    fn output_after_stream_is_rejected() {
        let builder = JobBuilder::new("in.wav")
            .to_stream(StreamDestination::rtp("127.0.0.1", 5004))
            .output("out.mp3");
        assert!(builder.validate().unwrap_err().is_config());
    }

    #[test]
    fn live_source_installs_low_latency_profile() {
        let builder = JobBuilder::new("in.wav").with_wallclock(true).as_live_source();
        let spec = builder.spec();
        assert!(spec.live_source);
        assert!(!spec.wallclock);
        assert_eq!(spec.network, Some(NetworkConfig::default_low_latency()));
    }

    #[test]
    fn live_source_keeps_existing_network_config() {
        let custom = NetworkConfig {
            ttl: 4,
            ..Default::default()
        };
        let builder = JobBuilder::new("in.wav")
            .with_network_config(custom)
            .as_live_source();
        assert_eq!(builder.spec().network, Some(custom));
    }

    #[test]
    fn instant_startup_sets_probe_parameters() {
        let spec = JobBuilder::new("in.wav").with_instant_startup().spec().clone();
        assert_eq!(spec.probe_size, Some(32));
        assert_eq!(spec.analyze_duration, Some(0));
    }

    #[test]
    fn validate_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/deeper/out.mp3");
        JobBuilder::new("in.wav").output(&out).validate().unwrap();
        assert!(out.parent().unwrap().is_dir());
    }

    #[test]
    fn compile_does_not_create_directories() {
        let (_dir, ffmpeg) = fake_ffmpeg();
        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("missing/out.mp3");
        let cmd = JobBuilder::new("in.wav")
            .output(&out)
            .with_ffmpeg_path(&ffmpeg)
            .compile()
            .unwrap();
        assert_eq!(cmd.program, ffmpeg);
        assert!(!out.parent().unwrap().exists());
    }

    #[test]
    fn command_line_is_space_joined() {
        let (_dir, ffmpeg) = fake_ffmpeg();
        let line = JobBuilder::new("in.wav")
            .to_stream(StreamDestination::rtp("127.0.0.1", 5004))
            .with_ffmpeg_path(&ffmpeg)
            .command_line()
            .unwrap();
        assert!(line.starts_with(&ffmpeg.display().to_string()));
        assert!(line.ends_with("-f rtp rtp://127.0.0.1:5004"));
    }

    #[test]
    fn missing_binary_is_reported() {
        let err = JobBuilder::new("in.wav")
            .output("out.mp3")
            .with_ffmpeg_path("/nonexistent/bin/ffmpeg")
            .compile()
            .unwrap_err();
        assert_matches!(err, fj_core::Error::BinaryNotFound { .. });
    }

    #[test]
    fn with_config_applies_job_defaults() {
        let mut config = Config::default();
        config.job.timeout_secs = 45;
        config.artifact_poll.attempts = 3;
        let builder = JobBuilder::new("in.wav").with_config(&config);
        assert_eq!(builder.spec().timeout_secs, 45);
        assert_eq!(builder.artifact_poll.attempts, 3);
    }

    #[test]
    fn spawn_outside_runtime_is_an_error() {
        let (_dir, ffmpeg) = fake_ffmpeg();
        let result = JobBuilder::new("in.wav")
            .output("out.mp3")
            .with_ffmpeg_path(&ffmpeg)
            .spawn();
        assert!(result.unwrap_err().is_config());
    }
}
