//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool locations, job defaults, supervisor grace periods, and side-artifact
//! polling settings. Every section defaults sensibly so a completely empty
//! `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub job: JobDefaults,
    pub supervisor: SupervisorConfig,
    pub artifact_poll: ArtifactPollConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    ///
    /// This is intentionally string-based so the caller can read the file
    /// however it sees fit.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path.
    ///
    /// Unlike [`Config::load_or_default`] a missing or malformed file is an
    /// error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "{name} {} does not exist; PATH lookup will be used",
                        p.display()
                    ));
                }
            }
        }

        if let Some(ref dir) = self.tools.bin_dir {
            if !dir.is_dir() {
                warnings.push(format!("tools.bin_dir {} is not a directory", dir.display()));
            }
        }

        if self.artifact_poll.attempts == 0 {
            warnings.push(
                "artifact_poll.attempts is 0; session description callbacks will never fire"
                    .into(),
            );
        }
        if self.artifact_poll.interval_ms == 0 {
            warnings.push("artifact_poll.interval_ms is 0; the poller will spin".into());
        }

        if self.supervisor.exit_drain_grace_ms == 0 || self.supervisor.timeout_drain_grace_ms == 0
        {
            warnings.push(
                "supervisor drain grace is 0; trailing output lines may be lost".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Directory holding bundled binaries, searched after `PATH`.
    pub bin_dir: Option<PathBuf>,
}

/// Defaults applied to every job built with a config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDefaults {
    /// Timeout in seconds, 0 = unbounded.
    pub timeout_secs: u64,
}

/// Grace periods the supervisor grants the output drain task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Grace after a timeout or cancellation kill.
    #[serde(default = "default_timeout_drain_grace")]
    pub timeout_drain_grace_ms: u64,
    /// Grace after a normal process exit.
    #[serde(default = "default_exit_drain_grace")]
    pub exit_drain_grace_ms: u64,
}

fn default_timeout_drain_grace() -> u64 {
    2_000
}
fn default_exit_drain_grace() -> u64 {
    5_000
}

impl SupervisorConfig {
    pub fn timeout_drain_grace(&self) -> Duration {
        Duration::from_millis(self.timeout_drain_grace_ms)
    }

    pub fn exit_drain_grace(&self) -> Duration {
        Duration::from_millis(self.exit_drain_grace_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            timeout_drain_grace_ms: default_timeout_drain_grace(),
            exit_drain_grace_ms: default_exit_drain_grace(),
        }
    }
}

/// Polling window for the session description side artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPollConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_poll_attempts")]
    pub attempts: u32,
}

fn default_poll_interval() -> u64 {
    100
}
fn default_poll_attempts() -> u32 {
    50
}

impl ArtifactPollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ArtifactPollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            attempts: default_poll_attempts(),
        }
    }
}
