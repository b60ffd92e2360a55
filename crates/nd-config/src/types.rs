// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to one section of `nd_configuration.toml`. Missing
//! sections and keys fall back to their defaults.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NdConfig {
    pub kernel: KernelConfig,
    pub backend: BackendSettings,
    pub logging: LoggingSettings,
    pub simulation: SimulationSettings,
}

/// Kernel build and launch configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Threads per block
    pub block_size: u32,
    /// Grid cap is `multiprocessors * blocks_per_multiprocessor`
    pub blocks_per_multiprocessor: u32,
    /// Ask the compiler for verbose register and resource output
    pub compile_diagnostics: bool,
    /// Keep generated source and resolved types on each component
    pub debug: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            block_size: 256,
            blocks_per_multiprocessor: 6,
            compile_diagnostics: false,
            debug: false,
        }
    }
}

/// Backend selection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendSettings {
    /// "cpu" or "cuda"
    pub backend: String,
    pub device_id: usize,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            backend: "cpu".to_string(),
            device_id: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// "screen", "file", "both" or "none"
    pub output: String,
    pub log_dir: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "screen".to_string(),
            log_dir: "./logs".to_string(),
        }
    }
}

/// Settings for standalone runs of a component
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Step duration in seconds
    pub dt: f64,
    pub steps: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            dt: 1e-4,
            steps: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: NdConfig = toml::from_str(
            r#"
            [kernel]
            block_size = 128

            [simulation]
            steps = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.kernel.block_size, 128);
        assert_eq!(config.kernel.blocks_per_multiprocessor, 6);
        assert_eq!(config.simulation.steps, 5);
        assert_eq!(config.simulation.dt, 1e-4);
        assert_eq!(config.backend, BackendSettings::default());
    }

    #[test]
    fn test_serializes_back_to_toml() {
        let text = toml::to_string(&NdConfig::default()).unwrap();
        assert!(text.contains("[kernel]"));
        assert!(text.contains("block_size = 256"));
        assert!(text.contains("backend = \"cpu\""));
    }
}
