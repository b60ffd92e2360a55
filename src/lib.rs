// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ndcomponents
//!
//! Type-specialized, cached parallel kernels for lockstep synapse component
//! models. A component binds one model (such as RotN, `I = V * Vd * weight`)
//! to `N` independent instances and advances all of them once per step.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ndcomponents::prelude::*;
//! use ndcomponents::{run_rotn, RotnRun};
//!
//! let config = ndcomponents::config::load_config_or_default(None, None)?;
//! let run = RotnRun::from_config(&config, 1_000);
//! let summary = run_rotn(Arc::new(HostBackend::new()), &run)?;
//! println!("{} steps in {:?}", summary.steps, summary.elapsed);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Feature Flags
//! - **`cuda`**: CUDA backend (NVRTC runtime compilation)
//! - **`file-logging`**: rolling JSON log files
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  nd-config / nd-observability                           │
//! │  (TOML settings, overrides, logging setup)              │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  nd-kernel                                              │
//! │  (type resolution, codegen, kernel cache, dispatch)     │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  ndcomponents                                           │
//! │  (config glue, run driver, rotn_demo)                   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod driver;

pub use nd_config as config;
pub use nd_kernel as kernel;
pub use nd_observability as observability;

pub use driver::{run_rotn, step_inputs, RotnRun, RunSummary};

use nd_config::{BackendSettings, KernelConfig, LoggingSettings};
use nd_kernel::{BackendType, ComponentOptions, KernelError, LaunchPolicy};
use nd_observability::{LogOutput, LoggingConfig, ObservabilityError};

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use nd_kernel::{
        shared, Backend, BackendType, Component, ComponentModel, ComponentOptions, CudaBackend,
        DeviceBuffer, HostArray, HostBackend, HostBuffer, KernelCache, KernelError, LaunchPolicy,
        ModelRegistry, RawArray, RotN, Scalar, ScalarType, SharedBuffer, SynapseComponent,
        UpdateDestinations,
    };

    pub use nd_config::{load_config, load_config_or_default, NdConfig};
}

/// Component construction flags from the `[kernel]` section
pub fn component_options(kernel: &KernelConfig) -> ComponentOptions {
    ComponentOptions {
        compile_diagnostics: kernel.compile_diagnostics,
        debug: kernel.debug,
        launch: LaunchPolicy {
            block_size: kernel.block_size,
            blocks_per_multiprocessor: kernel.blocks_per_multiprocessor,
        },
    }
}

/// Backend named by the `[backend]` section, if this build and machine can run it
pub fn select_backend(settings: &BackendSettings) -> Result<BackendType, KernelError> {
    let backend: BackendType = settings.backend.parse()?;
    if !backend.is_compiled_in() {
        return Err(KernelError::BackendUnavailable(format!(
            "{} support was not compiled in (enable the `cuda` feature)",
            backend
        )));
    }
    if backend == BackendType::Cuda && !nd_kernel::is_cuda_available() {
        return Err(KernelError::BackendUnavailable(
            "no CUDA device found".to_string(),
        ));
    }
    Ok(backend)
}

/// Logging setup from the `[logging]` section
pub fn logging_config(settings: &LoggingSettings) -> Result<LoggingConfig, ObservabilityError> {
    let output: LogOutput = settings.output.parse()?;
    Ok(LoggingConfig {
        level: settings.level.clone(),
        output,
        log_dir: settings.log_dir.clone().into(),
        ..LoggingConfig::default()
    })
}
