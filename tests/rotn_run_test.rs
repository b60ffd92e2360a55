// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # RotN Run Tests
//!
//! Configuration file to finished run, through the umbrella crate.

use std::fs;
use std::sync::Arc;

use ndcomponents::config::load_config;
use ndcomponents::prelude::*;
use ndcomponents::{run_rotn, select_backend, step_inputs, RotnRun};
use tempfile::tempdir;

#[test]
fn test_configured_run_on_host() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nd_configuration.toml");
    fs::write(
        &path,
        r#"
[kernel]
block_size = 64
blocks_per_multiprocessor = 2
debug = true

[backend]
backend = "cpu"

[simulation]
dt = 1e-3
steps = 4
"#,
    )
    .unwrap();

    let config = load_config(Some(&path), None).unwrap();
    assert_eq!(select_backend(&config.backend).unwrap(), BackendType::Cpu);

    let run = RotnRun::from_config(&config, 3);
    let summary = run_rotn(Arc::new(HostBackend::with_multiprocessors(2)), &run).unwrap();

    assert_eq!(summary.steps, 4);
    assert_eq!(summary.num_comps, 3);
    assert_eq!(summary.output.to_f64_vec(), vec![0.5, 2.0, 4.5]);
    assert_eq!(summary.cache.compilations, 1);

    let debug = summary.debug.expect("debug info was requested");
    assert_eq!(debug.geometry.block_size, 64);
    assert_eq!(debug.geometry.grid_size, 1);
    assert!(debug.source.contains("g_I[i] = V * Vd * weight;"));
}

#[test]
fn test_run_matches_elementwise_product() {
    let mut config = NdConfig::default();
    config.simulation.steps = 2;
    let mut run = RotnRun::from_config(&config, 1000);
    run.weight = 0.25;

    let summary = run_rotn(Arc::new(HostBackend::new()), &run).unwrap();
    assert!(summary.debug.is_none());

    let (v, vd) = step_inputs(1000);
    let expected: Vec<f64> = v
        .to_f64_vec()
        .iter()
        .zip(vd.to_f64_vec())
        .map(|(a, b)| (*a as f32 * b as f32 * 0.25f32) as f64)
        .collect();
    assert_eq!(summary.output.to_f64_vec(), expected);
}

#[test]
fn test_zero_steps_leave_output_untouched() {
    let mut config = NdConfig::default();
    config.simulation.steps = 0;
    let run = RotnRun::from_config(&config, 4);

    let summary = run_rotn(Arc::new(HostBackend::new()), &run).unwrap();
    assert_eq!(summary.output, HostArray::zeros(ScalarType::F32, 4));
    assert_eq!(summary.steps_per_second(), 0.0);
}

#[test]
fn test_invalid_launch_policy_is_reported() {
    let mut config = NdConfig::default();
    config.kernel.block_size = 48;
    let run = RotnRun::from_config(&config, 4);

    let err = run_rotn(Arc::new(HostBackend::new()), &run).unwrap_err();
    let root = err.root_cause().to_string();
    assert!(root.contains("block size 48"), "{}", root);
}
