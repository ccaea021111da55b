//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of ffmpeg and
//! ffprobe. Job execution depends only on the [`BinaryLocator`] trait, so
//! callers (and tests) can substitute a fixed path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fj_core::config::ToolsConfig;
use serde::Serialize;

use crate::platform::Platform;

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Resolves a logical binary name to an executable path.
pub trait BinaryLocator: Send + Sync + std::fmt::Debug {
    /// Return the path to `name`, or [`fj_core::Error::BinaryNotFound`].
    fn locate(&self, name: &str) -> fj_core::Result<PathBuf>;
}

/// A locator that always answers with the same path.
#[derive(Debug, Clone)]
pub struct FixedLocator {
    path: PathBuf,
}

impl FixedLocator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BinaryLocator for FixedLocator {
    fn locate(&self, name: &str) -> fj_core::Result<PathBuf> {
        if self.path.exists() {
            Ok(self.path.clone())
        } else {
            tracing::debug!("configured {name} path {:?} does not exist", self.path);
            Err(fj_core::Error::binary_not_found(name))
        }
    }
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool paths.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Discover tools using overrides from config, then `PATH`, then the
    /// bundled binary directory.
    ///
    /// For each known tool, if the [`ToolsConfig`] supplies a custom path
    /// **and** that path exists, it is used directly. Otherwise
    /// [`which::which`] is used to locate the tool in `PATH`, and finally
    /// `bin_dir` is searched for the platform's executable name. Tools that
    /// are not found are silently omitted from the registry.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let platform = Platform::current();
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                "ffprobe" => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = custom_path
                .filter(|p| p.exists())
                .map(Path::to_path_buf)
                .or_else(|| which::which(name).ok())
                .or_else(|| {
                    let dir = tools_config.bin_dir.as_deref()?;
                    let candidate = dir.join(platform.executable_name(name));
                    candidate.is_file().then_some(candidate)
                });

            match resolved {
                Some(path) => {
                    tracing::debug!("resolved {name} at {}", path.display());
                    tools.insert(name.to_string(), path);
                }
                None => tracing::debug!("{name} not found"),
            }
        }

        Self { tools }
    }

    /// Register (or replace) a tool path explicitly.
    pub fn with_tool(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.tools.insert(name.to_string(), path.into());
        self
    }

    /// Return the path for the given tool, or
    /// [`fj_core::Error::BinaryNotFound`] if it was not found during
    /// discovery.
    pub fn require(&self, name: &str) -> fj_core::Result<&Path> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| fj_core::Error::binary_not_found(name))
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

impl BinaryLocator for ToolRegistry {
    fn locate(&self, name: &str) -> fj_core::Result<PathBuf> {
        self.require(name).map(Path::to_path_buf)
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
