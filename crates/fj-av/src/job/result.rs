//! Successful job outcome.

use std::path::PathBuf;

use serde::Serialize;

/// What a successful job produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingResult {
    /// Written file, `None` for stream destinations.
    pub output_path: Option<PathBuf>,
    /// Wall-clock time from launch to exit, in milliseconds.
    pub time_taken_ms: u64,
    /// Size of the output file in bytes, 0 for streams or a missing file.
    pub file_size: u64,
}

impl EncodingResult {
    pub fn file_size_kb(&self) -> f64 {
        self.file_size as f64 / 1024.0
    }

    pub fn file_size_mb(&self) -> f64 {
        self.file_size as f64 / (1024.0 * 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_helpers() {
        let result = EncodingResult {
            output_path: Some(PathBuf::from("out.mp3")),
            time_taken_ms: 1200,
            file_size: 3 * 1024 * 1024,
        };
        assert_eq!(result.file_size_kb(), 3072.0);
        assert_eq!(result.file_size_mb(), 3.0);
    }

    #[test]
    fn serializes_for_cli_output() {
        let result = EncodingResult {
            output_path: None,
            time_taken_ms: 5,
            file_size: 0,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["output_path"], serde_json::Value::Null);
        assert_eq!(json["time_taken_ms"], 5);
    }
}
