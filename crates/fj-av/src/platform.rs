//! Current platform descriptor.

use serde::Serialize;
use std::fmt;

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Linux,
    MacOs,
    Other,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Linux => write!(f, "linux"),
            Self::MacOs => write!(f, "macos"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// The platform ffjob is running on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Platform {
    pub os: Os,
    /// CPU architecture as reported by the standard library (e.g. `x86_64`).
    pub arch: &'static str,
}

impl Platform {
    /// Describe the current platform.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "windows" => Os::Windows,
            "linux" => Os::Linux,
            "macos" => Os::MacOs,
            _ => Os::Other,
        };
        Self {
            os,
            arch: std::env::consts::ARCH,
        }
    }

    /// File name of an executable on this platform (`ffmpeg` → `ffmpeg.exe`
    /// on Windows).
    pub fn executable_name(&self, tool: &str) -> String {
        match self.os {
            Os::Windows if !tool.ends_with(".exe") => format!("{tool}.exe"),
            _ => tool.to_string(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_name_on_windows() {
        let p = Platform {
            os: Os::Windows,
            arch: "x86_64",
        };
        assert_eq!(p.executable_name("ffmpeg"), "ffmpeg.exe");
        assert_eq!(p.executable_name("ffprobe.exe"), "ffprobe.exe");
    }

    #[test]
    fn executable_name_elsewhere() {
        let p = Platform {
            os: Os::Linux,
            arch: "aarch64",
        };
        assert_eq!(p.executable_name("ffmpeg"), "ffmpeg");
        assert_eq!(p.to_string(), "linux-aarch64");
    }

    #[test]
    fn current_matches_std() {
        let p = Platform::current();
        assert_eq!(p.arch, std::env::consts::ARCH);
        if cfg!(target_os = "linux") {
            assert_eq!(p.os, Os::Linux);
        }
    }
}
