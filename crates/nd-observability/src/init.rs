// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output is human-readable. With the `file-logging` feature, each run
//! also writes JSON records into its own timestamped folder:
//!
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       ├── nd-kernel.log
//!       ├── nd-config.log
//!       └── ndcomponents.log (combined)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::LoggingConfig;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// Keeps file writers alive; logs are flushed when this is dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder receiving log files, if file output is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global subscriber
///
/// # Arguments
/// * `debug_flags` - Per-crate debug flags for filtering
/// * `config` - Default level, output destinations and log directory
///
/// # Errors
/// Fails if the log folder cannot be created, if file output is requested
/// without the `file-logging` feature, or if a global subscriber is already set.
pub fn init_logging(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string_with_level(&config.level);

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.output.to_screen() {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_filter(env_filter(&filter)?)
            .boxed();
        layers.push(console_layer);
    }

    let mut guard = LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: Vec::new(),
        log_dir: None,
    };

    if config.output.to_file() {
        let run_folder = config.log_dir.join(run_folder_name(Utc::now()));
        std::fs::create_dir_all(&run_folder)
            .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
        cleanup_old_logs(&config.log_dir, config.retention_runs)?;

        file_layers(&run_folder, &filter, &mut layers, &mut guard)?;
        guard.log_dir = Some(run_folder);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(guard)
}

fn env_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter).with_context(|| format!("Invalid log filter '{}'", filter))
}

/// Initialize console logging at `info` with the given debug flags
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &LoggingConfig::default())
}

#[cfg(feature = "file-logging")]
fn file_layers(
    run_folder: &Path,
    filter: &str,
    layers: &mut Vec<BoxedLayer>,
    guard: &mut LoggingGuard,
) -> Result<()> {
    use tracing_appender::rolling;

    // One file per crate
    for crate_name in crate::KNOWN_CRATES {
        let file_appender = rolling::daily(run_folder, format!("{}.log", crate_name));
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard._file_guards.push(file_guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(EnvFilter::try_new(format!("{}=debug,off", crate_name))?)
            .boxed();
        layers.push(file_layer);
    }

    let combined_appender = rolling::daily(run_folder, "ndcomponents.log");
    let (combined_non_blocking, combined_guard) = tracing_appender::non_blocking(combined_appender);
    guard._file_guards.push(combined_guard);

    let combined_layer = tracing_subscriber::fmt::layer()
        .with_writer(combined_non_blocking)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(env_filter(filter)?)
        .boxed();
    layers.push(combined_layer);

    Ok(())
}

#[cfg(not(feature = "file-logging"))]
fn file_layers(
    _run_folder: &Path,
    _filter: &str,
    _layers: &mut Vec<BoxedLayer>,
    _guard: &mut LoggingGuard,
) -> Result<()> {
    anyhow::bail!("File logging requires the `file-logging` feature")
}

/// Folder name for a run started at `started`
pub fn run_folder_name(started: DateTime<Utc>) -> String {
    format!("{}{}", RUN_PREFIX, started.format(RUN_TIMESTAMP))
}

fn parse_run_folder(name: &str) -> Option<DateTime<Utc>> {
    let timestamp = name.strip_prefix(RUN_PREFIX)?;
    NaiveDateTime::parse_from_str(timestamp, RUN_TIMESTAMP)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Keep only the `retention_runs` most recent run folders under `base_log_dir`.
///
/// Returns the number of folders removed. Entries that are not run folders
/// are left alone.
pub fn cleanup_old_logs(base_log_dir: &Path, retention_runs: usize) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let started = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_run_folder);
        if let Some(started) = started {
            runs.push((path, started));
        }
    }

    // Oldest first
    runs.sort_by_key(|(_, started)| *started);

    let excess = runs.len().saturating_sub(retention_runs);
    let mut removed = 0;
    for (path, _) in runs.iter().take(excess) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_run_folder_name_round_trips() {
        let started = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let name = run_folder_name(started);
        assert_eq!(name, "run_20250102_030405");
        assert_eq!(parse_run_folder(&name), Some(started));
        assert_eq!(parse_run_folder("notes"), None);
    }

    #[test]
    fn test_cleanup_keeps_most_recent_runs() {
        let dir = tempdir().unwrap();
        for day in 1..=5 {
            let started = Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap();
            std::fs::create_dir(dir.path().join(run_folder_name(started))).unwrap();
        }
        std::fs::create_dir(dir.path().join("keep_me")).unwrap();

        let removed = cleanup_old_logs(dir.path(), 2).unwrap();
        assert_eq!(removed, 3);

        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec!["keep_me", "run_20250304_120000", "run_20250305_120000"]
        );
    }

    #[test]
    fn test_cleanup_of_missing_directory() {
        let dir = tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("absent"), 1).unwrap(), 0);
    }
}
