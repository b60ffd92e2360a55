// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Standalone RotN runs: one component fed by constant step inputs, stepped
//! on a single ordering token until the requested step count.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info};

use nd_config::NdConfig;
use nd_kernel::{
    shared, Backend, CacheStats, Component, ComponentOptions, DebugInfo, HostArray, KernelCache,
    ModelRegistry, RawArray, Scalar, SynapseComponent, UpdateDestinations, ROTN,
};

use crate::component_options;

/// Parameters of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RotnRun {
    pub num_comps: usize,
    pub steps: u64,
    /// Step duration in seconds
    pub dt: f64,
    /// Synaptic weight shared by every instance
    pub weight: f32,
    pub options: ComponentOptions,
}

impl RotnRun {
    pub fn from_config(config: &NdConfig, num_comps: usize) -> Self {
        Self {
            num_comps,
            steps: config.simulation.steps,
            dt: config.simulation.dt,
            weight: 1.0,
            options: component_options(&config.kernel),
        }
    }
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub backend: String,
    pub num_comps: usize,
    pub steps: u64,
    pub elapsed: Duration,
    /// Update `I` after the last step
    pub output: HostArray,
    pub debug: Option<DebugInfo>,
    pub cache: CacheStats,
}

impl RunSummary {
    pub fn steps_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.steps as f64 / secs
        } else {
            0.0
        }
    }
}

/// Constant upstream values: `V[i] = i % 7 + 1`, `Vd[i] = (i % 3 + 1) / 2`
pub fn step_inputs(num_comps: usize) -> (HostArray, HostArray) {
    let v: Vec<f32> = (0..num_comps).map(|i| (i % 7 + 1) as f32).collect();
    let vd: Vec<f32> = (0..num_comps).map(|i| (i % 3 + 1) as f32 * 0.5).collect();
    (HostArray::from(v), HostArray::from(vd))
}

/// Build a RotN component on `backend` and step it `run.steps` times
pub fn run_rotn<B: Backend>(backend: Arc<B>, run: &RotnRun) -> Result<RunSummary> {
    let registry = ModelRegistry::with_builtin_models();
    let model = registry
        .get(ROTN)
        .context("RotN is missing from the model registry")?;

    let (v, vd) = step_inputs(run.num_comps);
    let weight = HostArray::filled(Scalar::F32(run.weight), run.num_comps);

    let accesses = [
        ("V".to_string(), shared::<B>(backend.upload(&v)?)),
        ("Vd".to_string(), shared::<B>(backend.upload(&vd)?)),
    ];
    let params = [("weight".to_string(), RawArray::from(weight))];

    let cache = Arc::new(KernelCache::new());
    let mut component = SynapseComponent::with_cache(
        model,
        Arc::clone(&backend),
        params.into_iter().collect(),
        accesses.into_iter().collect(),
        run.dt,
        run.options,
        Arc::clone(&cache),
    )
    .context("Failed to build the RotN component")?;

    let output_type = component
        .spec()
        .type_of("I")
        .context("RotN declares no 'I' update")?;
    let mut output = backend.alloc_zeros(output_type, run.num_comps)?;
    let mut stream = backend.create_stream()?;

    info!(
        "Running {} steps of {} RotN instances on {}",
        run.steps,
        run.num_comps,
        backend.backend_name()
    );

    let started = Instant::now();
    for step in 0..run.steps {
        let mut destinations = UpdateDestinations::<B>::new().with("I", &mut output);
        component
            .run_step(&mut destinations, &mut stream)
            .with_context(|| format!("Step {} failed", step))?;
        if step % 1000 == 0 {
            debug!("issued step {}", step);
        }
    }
    backend.synchronize(&mut stream)?;
    let elapsed = started.elapsed();

    Ok(RunSummary {
        backend: backend.backend_name().to_string(),
        num_comps: run.num_comps,
        steps: run.steps,
        elapsed,
        output: backend.download(&output)?,
        debug: component.debug_info().cloned(),
        cache: cache.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_inputs_pattern() {
        let (v, vd) = step_inputs(8);
        assert_eq!(
            v.to_f64_vec(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 1.0]
        );
        assert_eq!(
            vd.to_f64_vec(),
            vec![0.5, 1.0, 1.5, 0.5, 1.0, 1.5, 0.5, 1.0]
        );
    }

    #[test]
    fn test_from_config_uses_simulation_section() {
        let mut config = NdConfig::default();
        config.simulation.steps = 3;
        config.kernel.debug = true;
        let run = RotnRun::from_config(&config, 5);
        assert_eq!(run.steps, 3);
        assert_eq!(run.dt, 1e-4);
        assert!(run.options.debug);
        assert_eq!(run.num_comps, 5);
    }
}
