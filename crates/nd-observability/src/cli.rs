// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-nd-kernel` to raise one crate to debug level,
//! and `--debug-all` for every known crate.

use std::collections::HashMap;
use std::env;

use crate::KNOWN_CRATES;

/// Environment variable listing crates to debug
pub const DEBUG_ENV: &str = "ND_DEBUG";

/// Parse debug flags from command-line arguments
///
/// # Example
/// ```rust
/// use nd_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(std::env::args());
/// if flags.is_enabled("nd-kernel") {
///     // kernel cache and dispatch events are logged at debug level
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: HashMap<String, bool>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}`, plus `--debug-all`.
    /// A bare `--debug` is left to the caller.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();

        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
                continue;
            }

            if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enable(crate_name);
            }
        }

        flags
    }

    /// Merge a comma-separated crate list (or `all`)
    pub fn merge_list(&mut self, list: &str) {
        if list.trim() == "all" {
            self.enable_all();
            return;
        }
        for crate_name in list.split(',') {
            let crate_name = crate_name.trim();
            if !crate_name.is_empty() {
                self.enable(crate_name);
            }
        }
    }

    pub fn enable(&mut self, crate_name: &str) {
        self.enabled_crates.insert(crate_name.to_string(), true);
    }

    pub fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enable(crate_name);
        }
    }

    /// Check if debug is enabled for a specific crate
    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains_key(crate_name)
    }

    /// Enabled crate names, sorted
    pub fn enabled_crates(&self) -> Vec<&String> {
        let mut names: Vec<&String> = self.enabled_crates.keys().collect();
        names.sort();
        names
    }

    /// Check if debug is enabled for any crate
    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// `tracing::Level::DEBUG` if enabled, `tracing::Level::INFO` otherwise.
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Filter string for `EnvFilter` with `info` as the default level
    pub fn to_filter_string(&self) -> String {
        self.to_filter_string_with_level("info")
    }

    /// Filter string for `EnvFilter`.
    ///
    /// Format: "nd-kernel=debug,nd-config=debug,{default_level}".
    pub fn to_filter_string_with_level(&self, default_level: &str) -> String {
        let mut filters: Vec<String> = self
            .enabled_crates()
            .into_iter()
            .map(|crate_name| format!("{}=debug", crate_name))
            .collect();
        filters.push(default_level.to_lowercase());
        filters.join(",")
    }
}

/// Parse debug flags from the process arguments and `ND_DEBUG`
///
/// Environment variable format: comma-separated crate names, e.g. "nd-kernel,nd-config",
/// or "all".
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());

    if let Ok(env_var) = env::var(DEBUG_ENV) {
        flags.merge_list(&env_var);
    }

    flags
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  {env}={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  {env}=all                            Enable debug for all crates

Examples:
  --debug-nd-kernel
  --debug-nd-kernel --debug-nd-config
  {env}=nd-kernel,nd-config
"#,
        KNOWN_CRATES.join(", "),
        env = DEBUG_ENV
    )
}
