// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Observability configuration types

use core::fmt;
use core::str::FromStr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Invalid observability setting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObservabilityError {
    #[error("unknown log output '{0}' (expected screen, file, both or none)")]
    UnknownLogOutput(String),
}

/// Where log records go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Screen,
    File,
    Both,
    None,
}

impl LogOutput {
    pub fn to_screen(self) -> bool {
        matches!(self, LogOutput::Screen | LogOutput::Both)
    }

    pub fn to_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogOutput::Screen => "screen",
            LogOutput::File => "file",
            LogOutput::Both => "both",
            LogOutput::None => "none",
        })
    }
}

impl FromStr for LogOutput {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "screen" | "console" | "stdout" => Ok(LogOutput::Screen),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            "none" | "off" => Ok(LogOutput::None),
            other => Err(ObservabilityError::UnknownLogOutput(other.to_string())),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level for crates without a debug flag (trace, debug, info, warn, error)
    pub level: String,

    pub output: LogOutput,

    /// Base directory; each run gets its own `run_<timestamp>` folder
    pub log_dir: PathBuf,

    /// Number of most recent run folders to keep
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Screen,
            log_dir: PathBuf::from("./logs"),
            retention_runs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_output_parsing() {
        assert_eq!("Both".parse::<LogOutput>(), Ok(LogOutput::Both));
        assert_eq!("screen".parse::<LogOutput>(), Ok(LogOutput::Screen));
        assert_eq!(" none ".parse::<LogOutput>(), Ok(LogOutput::None));
        assert!(matches!(
            "syslog".parse::<LogOutput>(),
            Err(ObservabilityError::UnknownLogOutput(s)) if s == "syslog"
        ));
    }

    #[test]
    fn test_log_output_destinations() {
        assert!(LogOutput::Both.to_screen() && LogOutput::Both.to_file());
        assert!(!LogOutput::Screen.to_file());
        assert!(!LogOutput::None.to_screen() && !LogOutput::None.to_file());
        assert_eq!(LogOutput::File.to_string(), "file");
    }
}
