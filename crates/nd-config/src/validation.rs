// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Every problem is collected before reporting, so one run surfaces all of them.

use crate::{ConfigError, ConfigResult, NdConfig};

const WARP_SIZE: u32 = 32;
const MAX_BLOCK_SIZE: u32 = 1024;
const BACKENDS: [&str; 2] = ["cpu", "cuda"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_OUTPUTS: [&str; 4] = ["screen", "file", "both", "none"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    InvalidValue { field: String, reason: String },
    UnknownChoice { field: String, value: String, allowed: &'static [&'static str] },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::UnknownChoice {
                field,
                value,
                allowed,
            } => {
                write!(
                    f,
                    "{} = '{}' is not one of: {}",
                    field,
                    value,
                    allowed.join(", ")
                )
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &NdConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_kernel(config, &mut errors);
    validate_choices(config, &mut errors);
    validate_simulation(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_kernel(config: &NdConfig, errors: &mut Vec<ConfigValidationError>) {
    let block_size = config.kernel.block_size;
    if block_size == 0 || block_size % WARP_SIZE != 0 || block_size > MAX_BLOCK_SIZE {
        errors.push(ConfigValidationError::InvalidValue {
            field: "kernel.block_size".to_string(),
            reason: format!(
                "{} must be a positive multiple of {} not above {}",
                block_size, WARP_SIZE, MAX_BLOCK_SIZE
            ),
        });
    }
    if config.kernel.blocks_per_multiprocessor == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "kernel.blocks_per_multiprocessor".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}

fn validate_choices(config: &NdConfig, errors: &mut Vec<ConfigValidationError>) {
    let checks: [(&str, &str, &'static [&'static str]); 3] = [
        ("backend.backend", &config.backend.backend, &BACKENDS),
        ("logging.level", &config.logging.level, &LOG_LEVELS),
        ("logging.output", &config.logging.output, &LOG_OUTPUTS),
    ];
    for (field, value, allowed) in checks {
        if !allowed.iter().any(|choice| choice.eq_ignore_ascii_case(value)) {
            errors.push(ConfigValidationError::UnknownChoice {
                field: field.to_string(),
                value: value.to_string(),
                allowed,
            });
        }
    }
}

fn validate_simulation(config: &NdConfig, errors: &mut Vec<ConfigValidationError>) {
    let dt = config.simulation.dt;
    if !dt.is_finite() || dt <= 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "simulation.dt".to_string(),
            reason: format!("{} must be a positive number of seconds", dt),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_problems_are_reported() {
        let mut config = NdConfig::default();
        config.kernel.block_size = 48;
        config.kernel.blocks_per_multiprocessor = 0;
        config.backend.backend = "opencl".to_string();
        config.simulation.dt = 0.0;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("kernel.block_size"));
        assert!(err.contains("kernel.blocks_per_multiprocessor"));
        assert!(err.contains("backend.backend = 'opencl'"));
        assert!(err.contains("simulation.dt"));
    }

    #[test]
    fn test_choices_ignore_case() {
        let mut config = NdConfig::default();
        config.backend.backend = "CUDA".to_string();
        config.logging.level = "Debug".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
