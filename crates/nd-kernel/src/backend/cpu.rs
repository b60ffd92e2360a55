// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Host Backend
//!
//! Runs component kernels on the host. Each physical lane of the launch
//! geometry becomes a rayon task that walks its grid-stride slice of
//! instances; results are scattered afterwards, one cell per instance.
//!
//! Generated source is still checked at compile time (entry point, argument
//! count, no leftover placeholders) so a template that would fail on a device
//! also fails here. The per-instance arithmetic comes from the model's host
//! body, evaluated with C conversion rules.
//!
//! The stream executes each operation when it is enqueued, which preserves
//! issue order trivially. It keeps a log of the current retrieve-and-launch
//! cycle only: the first operation after a launch starts a fresh log, and
//! `synchronize` empties it.

use rayon::prelude::*;
use tracing::{debug, trace};

use super::{Backend, DeviceBuffer, HostBody, HostFrame, KernelArgs, KernelSource};
use crate::compiler::ArgSignature;
use crate::geometry::LaunchGeometry;
use crate::types::{Error, HostArray, Result, Scalar, ScalarType};

/// Host-resident buffer
#[derive(Debug, Clone, PartialEq)]
pub struct HostBuffer {
    data: HostArray,
}

impl HostBuffer {
    pub fn new(data: HostArray) -> Self {
        Self { data }
    }

    pub fn as_array(&self) -> &HostArray {
        &self.data
    }

    pub fn as_array_mut(&mut self) -> &mut HostArray {
        &mut self.data
    }

    pub fn into_array(self) -> HostArray {
        self.data
    }
}

impl From<HostArray> for HostBuffer {
    fn from(data: HostArray) -> Self {
        Self::new(data)
    }
}

impl DeviceBuffer for HostBuffer {
    fn scalar_type(&self) -> ScalarType {
        self.data.scalar_type()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

/// Checked kernel: entry name, packing signature and the per-instance body
#[derive(Debug, Clone)]
pub struct HostModule {
    entry: &'static str,
    args: ArgSignature,
    body: HostBody,
}

impl HostModule {
    pub fn entry(&self) -> &'static str {
        self.entry
    }

    pub fn args(&self) -> &ArgSignature {
        &self.args
    }
}

/// Operation recorded by a [`HostStream`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOp {
    Copy {
        ty: ScalarType,
        len: usize,
    },
    Launch {
        entry: &'static str,
        grid: u32,
        block: u32,
        num_comps: usize,
    },
}

/// Eager ordering token with a log of the last issued cycle
#[derive(Debug, Default)]
pub struct HostStream {
    ops: Vec<StreamOp>,
}

impl HostStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations since the last completed launch, plus that launch
    pub fn ops(&self) -> &[StreamOp] {
        &self.ops
    }

    fn record(&mut self, op: StreamOp) {
        if matches!(self.ops.last(), Some(StreamOp::Launch { .. })) {
            self.ops.clear();
        }
        self.ops.push(op);
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

/// Host backend with rayon lanes
pub struct HostBackend {
    name: String,
    multiprocessors: usize,
}

impl HostBackend {
    /// Backend sized to the rayon thread pool
    pub fn new() -> Self {
        Self::with_multiprocessors(rayon::current_num_threads())
    }

    /// Backend reporting a fixed multiprocessor count (grid sizing only)
    pub fn with_multiprocessors(multiprocessors: usize) -> Self {
        Self {
            name: format!("Host (rayon, {} multiprocessors)", multiprocessors),
            multiprocessors,
        }
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HostBackend {
    type Buffer = HostBuffer;
    type Stream = HostStream;
    type Module = HostModule;

    fn backend_name(&self) -> &str {
        &self.name
    }

    fn multiprocessor_count(&self) -> usize {
        self.multiprocessors
    }

    fn upload(&self, data: &HostArray) -> Result<HostBuffer> {
        Ok(HostBuffer::new(data.clone()))
    }

    fn alloc_zeros(&self, ty: ScalarType, len: usize) -> Result<HostBuffer> {
        Ok(HostBuffer::new(HostArray::zeros(ty, len)))
    }

    fn download(&self, buffer: &HostBuffer) -> Result<HostArray> {
        Ok(buffer.data.clone())
    }

    fn compile(&self, source: &KernelSource<'_>) -> Result<HostModule> {
        if let Err(diagnostics) = check_source(source) {
            return Err(Error::Compilation {
                diagnostics,
                code: source.code.to_string(),
            });
        }

        if source.options.diagnostics {
            debug!(
                target: "nd-kernel",
                "[HOST-COMPILE] {}: {} bytes of source, args '{}', flags {:?}",
                source.entry,
                source.code.len(),
                source.args,
                source.options.flags()
            );
        }

        Ok(HostModule {
            entry: source.entry,
            args: source.args.clone(),
            body: source.host_body,
        })
    }

    fn create_stream(&self) -> Result<HostStream> {
        Ok(HostStream::new())
    }

    fn copy_async(
        &self,
        src: &HostBuffer,
        dst: &mut HostBuffer,
        stream: &mut HostStream,
    ) -> Result<()> {
        if !dst.data.copy_from(&src.data) {
            return Err(Error::Device(format!(
                "copy of {} x {} into {} x {}",
                src.len(),
                src.scalar_type(),
                dst.len(),
                dst.scalar_type()
            )));
        }
        stream.record(StreamOp::Copy {
            ty: src.scalar_type(),
            len: src.len(),
        });
        Ok(())
    }

    fn launch_async(
        &self,
        module: &HostModule,
        geometry: LaunchGeometry,
        args: KernelArgs<'_, Self>,
        stream: &mut HostStream,
    ) -> Result<()> {
        args.validate(&module.args)?;

        let KernelArgs {
            num_comps,
            dt,
            nsteps,
            reads,
            mut writes,
        } = args;
        let frame = HostFrame { dt, nsteps };
        let body = module.body;
        let out_types: Vec<ScalarType> = writes.iter().map(|b| b.scalar_type()).collect();

        let lanes: Vec<Vec<(usize, Vec<Scalar>)>> = (0..geometry.total_lanes())
            .into_par_iter()
            .map(|lane| {
                geometry
                    .lane_indices(lane, num_comps)
                    .map(|i| {
                        let inputs: Vec<Scalar> = reads
                            .iter()
                            .map(|b| {
                                b.data
                                    .get(i)
                                    .unwrap_or_else(|| b.data.scalar_type().zero())
                            })
                            .collect();
                        let mut outputs: Vec<Scalar> =
                            out_types.iter().map(|ty| ty.zero()).collect();
                        body(&frame, &inputs, &mut outputs);
                        (i, outputs)
                    })
                    .collect()
            })
            .collect();

        for (i, outputs) in lanes.into_iter().flatten() {
            for (dst, value) in writes.iter_mut().zip(outputs) {
                dst.data.set(i, value);
            }
        }

        trace!(
            target: "nd-kernel",
            "[HOST-LAUNCH] {} grid={} block={} n={}",
            module.entry,
            geometry.grid_size,
            geometry.block_size,
            num_comps
        );
        stream.record(StreamOp::Launch {
            entry: module.entry,
            grid: geometry.grid_size,
            block: geometry.block_size,
            num_comps,
        });
        Ok(())
    }

    fn synchronize(&self, stream: &mut HostStream) -> Result<()> {
        stream.clear();
        Ok(())
    }
}

/// Structural checks standing in for a device compiler's front end
fn check_source(source: &KernelSource<'_>) -> core::result::Result<(), String> {
    let code = source.code;

    if let Some(pos) = code.find("{{") {
        return Err(format!("unexpanded placeholder at byte {}", pos));
    }

    let mut depth: i64 = 0;
    for ch in code.chars() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced '}'".to_string());
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced '{'".to_string());
    }

    let declaration = format!("__global__ void {}(", source.entry);
    let start = code
        .find(&declaration)
        .ok_or_else(|| format!("kernel entry '{}' not found", source.entry))?
        + declaration.len();
    let end = code[start..]
        .find(')')
        .ok_or_else(|| format!("parameter list of '{}' is not closed", source.entry))?;
    let params = code[start..start + end]
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .count();
    if params != source.args.arg_count() {
        return Err(format!(
            "'{}' declares {} parameters but the packing signature '{}' has {}",
            source.entry,
            params,
            source.args,
            source.args.arg_count()
        ));
    }

    Ok(())
}
