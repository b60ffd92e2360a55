// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later ones winning:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::validation::validate_config;
use crate::{ConfigError, ConfigResult, NdConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "nd_configuration.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "ND_CONFIG_PATH";

/// Find the configuration file
///
/// Search order:
/// 1. `ND_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to five parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NdConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let config: NdConfig = toml::from_str(&content)?;
    finish(config, cli_args)
}

/// Like [`load_config`], but starts from defaults when no file is found.
///
/// An explicit `config_path` that does not exist is still an error.
pub fn load_config_or_default(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NdConfig> {
    if config_path.is_some() {
        return load_config(config_path, cli_args);
    }
    match find_config_file() {
        Ok(path) => load_config(Some(&path), cli_args),
        Err(ConfigError::FileNotFound(_)) if env::var(CONFIG_PATH_ENV).is_err() => {
            finish(NdConfig::default(), cli_args)
        }
        Err(e) => Err(e),
    }
}

fn finish(mut config: NdConfig, cli_args: Option<&HashMap<String, String>>) -> ConfigResult<NdConfig> {
    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }
    validate_config(&config)?;
    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `ND_KERNEL_BLOCK_SIZE` -> `kernel.block_size`
/// - `ND_KERNEL_BLOCKS_PER_MULTIPROCESSOR` -> `kernel.blocks_per_multiprocessor`
/// - `ND_KERNEL_COMPILE_DIAGNOSTICS` -> `kernel.compile_diagnostics`
/// - `ND_KERNEL_DEBUG` -> `kernel.debug`
/// - `ND_BACKEND` -> `backend.backend`
/// - `ND_DEVICE_ID` -> `backend.device_id`
/// - `ND_LOG_LEVEL` -> `logging.level`
/// - `ND_SIM_DT` -> `simulation.dt`
/// - `ND_SIM_STEPS` -> `simulation.steps`
///
/// Values that fail to parse are ignored.
pub fn apply_environment_overrides(config: &mut NdConfig) {
    if let Ok(value) = env::var("ND_KERNEL_BLOCK_SIZE") {
        if let Ok(size) = value.parse::<u32>() {
            config.kernel.block_size = size;
        }
    }
    if let Ok(value) = env::var("ND_KERNEL_BLOCKS_PER_MULTIPROCESSOR") {
        if let Ok(blocks) = value.parse::<u32>() {
            config.kernel.blocks_per_multiprocessor = blocks;
        }
    }
    if let Ok(value) = env::var("ND_KERNEL_COMPILE_DIAGNOSTICS") {
        config.kernel.compile_diagnostics = parse_flag(&value);
    }
    if let Ok(value) = env::var("ND_KERNEL_DEBUG") {
        config.kernel.debug = parse_flag(&value);
    }

    if let Ok(value) = env::var("ND_BACKEND") {
        config.backend.backend = value;
    }
    if let Ok(value) = env::var("ND_DEVICE_ID") {
        if let Ok(id) = value.parse::<usize>() {
            config.backend.device_id = id;
        }
    }

    if let Ok(value) = env::var("ND_LOG_LEVEL") {
        config.logging.level = value;
    }

    if let Ok(value) = env::var("ND_SIM_DT") {
        if let Ok(dt) = value.parse::<f64>() {
            config.simulation.dt = dt;
        }
    }
    if let Ok(value) = env::var("ND_SIM_STEPS") {
        if let Ok(steps) = value.parse::<u64>() {
            config.simulation.steps = steps;
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - CLI arguments by key (e.g., `{"block_size": "128", "steps": "100"}`)
pub fn apply_cli_overrides(config: &mut NdConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("block_size") {
        if let Ok(size) = value.parse::<u32>() {
            config.kernel.block_size = size;
        }
    }
    if let Some(value) = cli_args.get("blocks_per_multiprocessor") {
        if let Ok(blocks) = value.parse::<u32>() {
            config.kernel.blocks_per_multiprocessor = blocks;
        }
    }
    if let Some(value) = cli_args.get("compile_diagnostics") {
        config.kernel.compile_diagnostics = parse_flag(value);
    }
    if let Some(value) = cli_args.get("debug") {
        config.kernel.debug = parse_flag(value);
    }

    if let Some(value) = cli_args.get("backend") {
        config.backend.backend = value.clone();
    }
    if let Some(value) = cli_args.get("device_id") {
        if let Ok(id) = value.parse::<usize>() {
            config.backend.device_id = id;
        }
    }

    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("log_output") {
        config.logging.output = value.clone();
    }

    if let Some(value) = cli_args.get("dt") {
        if let Ok(dt) = value.parse::<f64>() {
            config.simulation.dt = dt;
        }
    }
    if let Some(value) = cli_args.get("steps") {
        if let Ok(steps) = value.parse::<u64>() {
            config.simulation.steps = steps;
        }
    }
}
