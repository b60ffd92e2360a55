// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
RotN Demo

Builds one RotN synapse component (`I = V * Vd * weight`) fed by constant
step inputs and runs it for a number of steps on the chosen backend.

Usage:
  cargo run --bin rotn_demo -- [--steps N] [--num-comps N] [--log screen|file|both|none]
                               [--debug] [--config PATH] [--device cpu|cuda] [--gpu-dev ID]
                               [--debug-all | --debug-<crate>]

Example:
  cargo run --release --bin rotn_demo -- --steps 1000 --num-comps 100000
  cargo run --release --features cuda --bin rotn_demo -- --device cuda --gpu-dev 0

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ndcomponents::config::load_config_or_default;
use ndcomponents::kernel::{BackendType, HostBackend};
use ndcomponents::observability::{debug_flags_help, init_logging, parse_debug_flags, LoggingGuard};
use ndcomponents::{logging_config, run_rotn, select_backend, RotnRun, RunSummary};

const DEFAULT_NUM_COMPS: usize = 1024;
const PREVIEW: usize = 8;

#[derive(Debug, Default)]
struct DemoArgs {
    steps: Option<u64>,
    num_comps: Option<usize>,
    log: Option<String>,
    debug: bool,
    config: Option<PathBuf>,
    device: Option<String>,
    gpu_dev: Option<usize>,
    help: bool,
}

impl DemoArgs {
    /// Keys understood by `nd_config::apply_cli_overrides`
    fn overrides(&self) -> HashMap<String, String> {
        let mut cli = HashMap::new();
        if let Some(steps) = self.steps {
            cli.insert("steps".to_string(), steps.to_string());
        }
        if let Some(log) = &self.log {
            cli.insert("log_output".to_string(), log.clone());
        }
        if self.debug {
            cli.insert("debug".to_string(), "true".to_string());
        }
        if let Some(device) = &self.device {
            cli.insert("backend".to_string(), device.clone());
        }
        if let Some(id) = self.gpu_dev {
            cli.insert("device_id".to_string(), id.to_string());
        }
        cli
    }
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<DemoArgs> {
    let mut parsed = DemoArgs::default();
    let mut args = args.into_iter().skip(1);

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{} expects a value", flag))
        };
        match arg.as_str() {
            "-s" | "--steps" => {
                let raw = value(arg.as_str())?;
                parsed.steps = Some(raw.parse().with_context(|| format!("invalid step count '{}'", raw))?);
            }
            "-n" | "--num-comps" => {
                let raw = value(arg.as_str())?;
                parsed.num_comps =
                    Some(raw.parse().with_context(|| format!("invalid instance count '{}'", raw))?);
            }
            "-l" | "--log" => parsed.log = Some(value(arg.as_str())?),
            "-c" | "--config" => parsed.config = Some(PathBuf::from(value(arg.as_str())?)),
            "--device" => parsed.device = Some(value(arg.as_str())?),
            "-g" | "--gpu-dev" => {
                let raw = value(arg.as_str())?;
                parsed.gpu_dev = Some(raw.parse().with_context(|| format!("invalid GPU id '{}'", raw))?);
            }
            "--debug" => parsed.debug = true,
            "-h" | "--help" => parsed.help = true,
            other if other.starts_with("--debug-") => {}
            other => bail!("unknown argument '{}' (see --help)", other),
        }
    }

    Ok(parsed)
}

fn print_help() {
    println!("RotN component demo");
    println!();
    println!("Options:");
    println!("  -s, --steps N          Number of steps [default: simulation.steps = 10000]");
    println!("  -n, --num-comps N      Number of RotN instances [default: {}]", DEFAULT_NUM_COMPS);
    println!("  -l, --log MODE         Log output: screen, file, both or none [default: logging.output]");
    println!("      --debug            Retain and print the generated kernel source");
    println!("  -c, --config PATH      Configuration file [default: search for nd_configuration.toml]");
    println!("      --device NAME      Backend: cpu or cuda [default: backend.backend]");
    println!("  -g, --gpu-dev ID       GPU device number [default: 0]");
    println!();
    println!("{}", debug_flags_help());
}

#[cfg(feature = "cuda")]
fn run_on_cuda(device_id: usize, run: &RotnRun) -> Result<RunSummary> {
    use ndcomponents::kernel::CudaBackend;
    let backend = CudaBackend::new(device_id)?;
    run_rotn(Arc::new(backend), run)
}

#[cfg(not(feature = "cuda"))]
fn run_on_cuda(_device_id: usize, _run: &RotnRun) -> Result<RunSummary> {
    bail!("CUDA support not compiled. Rebuild with --features cuda")
}

fn report(summary: &RunSummary) {
    println!();
    println!("📊 RotN run summary");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   Backend:      {}", summary.backend);
    println!("   Instances:    {}", summary.num_comps);
    println!("   Steps:        {}", summary.steps);
    println!("   Elapsed:      {:.3?}", summary.elapsed);
    println!("   Steps/sec:    {:.1}", summary.steps_per_second());
    println!(
        "   Kernel cache: {} compiled, {} hits",
        summary.cache.compilations, summary.cache.hits
    );

    let values = summary.output.to_f64_vec();
    let preview: Vec<String> = values.iter().take(PREVIEW).map(|v| format!("{}", v)).collect();
    let suffix = if values.len() > PREVIEW { ", ..." } else { "" };
    println!("   I:            [{}{}]", preview.join(", "), suffix);
    println!("   sum(I):       {}", values.iter().sum::<f64>());

    if let Some(debug) = &summary.debug {
        println!();
        println!("🔧 Resolved types: {}", debug.types);
        println!("   Packing:        {}", debug.args);
        println!(
            "   Geometry:       grid={} block={}",
            debug.geometry.grid_size, debug.geometry.block_size
        );
        println!("   Generated source:");
        for line in debug.source.lines() {
            println!("   | {}", line);
        }
    }
}

fn main() -> Result<()> {
    let args = parse_args(env::args())?;
    if args.help {
        print_help();
        return Ok(());
    }

    let config = load_config_or_default(args.config.as_deref(), Some(&args.overrides()))
        .context("Failed to load configuration")?;

    let logging = logging_config(&config.logging)?;
    let _guard: Option<LoggingGuard> = if logging.output.to_screen() || logging.output.to_file() {
        Some(init_logging(&parse_debug_flags(), &logging)?)
    } else {
        None
    };

    let backend = select_backend(&config.backend)?;
    let run = RotnRun::from_config(&config, args.num_comps.unwrap_or(DEFAULT_NUM_COMPS));

    println!("🧠 RotN demo");
    println!("   {} instances x {} steps on {} (dt = {} s)", run.num_comps, run.steps, backend, run.dt);

    let summary = match backend {
        BackendType::Cpu => run_rotn(Arc::new(HostBackend::new()), &run)?,
        BackendType::Cuda => run_on_cuda(config.backend.device_id, &run)?,
    };

    report(&summary);
    Ok(())
}
