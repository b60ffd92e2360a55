// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Compute Backend Abstraction
//!
//! Provides a unified interface for the devices a component kernel can run on.
//! Components, the kernel cache and the dispatcher are generic over [`Backend`],
//! so the per-step protocol is identical on the host and on an accelerator.
//!
//! A backend supplies:
//! - device buffers tagged with their element type
//! - runtime compilation of generated kernel source into a module
//! - ordered, asynchronous copy and launch operations on a stream (the
//!   ordering token shared by every component of a simulation step)

mod cpu;
mod cuda_backend;

pub use cpu::{HostBackend, HostBuffer, HostModule, HostStream, StreamOp};
#[cfg(feature = "cuda")]
pub use cuda_backend::{CudaBuffer, CudaModule, CudaStreamToken};
pub use cuda_backend::{enumerate_cuda_devices, is_cuda_available, CudaBackend};

use crate::compiler::{ArgSignature, CompileOptions};
use crate::geometry::LaunchGeometry;
use crate::types::{Error, HostArray, Result, Scalar, ScalarType};

/// Device-resident dense array of one element type
pub trait DeviceBuffer: Send + Sync {
    fn scalar_type(&self) -> ScalarType;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scalars every lane of a launch sees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostFrame {
    /// Scaled time-step, in the kernel's `dt` type
    pub dt: Scalar,
    /// Inner iterations per step
    pub nsteps: i32,
}

/// Per-instance body executed by the host backend.
///
/// `inputs` holds one value per access then per parameter; `outputs` one slot per
/// update, pre-filled with zero of the update's type.
pub type HostBody = fn(&HostFrame, &[Scalar], &mut [Scalar]);

/// Everything a backend needs to build a module
#[derive(Debug, Clone, Copy)]
pub struct KernelSource<'a> {
    pub entry: &'static str,
    pub code: &'a str,
    pub host_body: HostBody,
    pub args: &'a ArgSignature,
    pub options: &'a CompileOptions,
}

/// Argument list of one launch, in packing order
pub struct KernelArgs<'a, B: Backend + ?Sized> {
    pub num_comps: usize,
    pub dt: Scalar,
    pub nsteps: i32,
    /// Inputs then parameters
    pub reads: Vec<&'a B::Buffer>,
    /// Update destinations
    pub writes: Vec<&'a mut B::Buffer>,
}

impl<B: Backend + ?Sized> KernelArgs<'_, B> {
    /// Check the argument list against the module's packing signature
    pub fn validate(&self, signature: &ArgSignature) -> Result<()> {
        if self.dt.scalar_type() != signature.dt_type() {
            return Err(Error::Device(format!(
                "dt passed as {} but kernel expects {}",
                self.dt.scalar_type(),
                signature.dt_type()
            )));
        }
        let pointers = self.reads.len() + self.writes.len();
        if pointers != signature.pointer_count() {
            return Err(Error::Device(format!(
                "{} buffer arguments for signature '{}'",
                pointers, signature
            )));
        }
        let short = self
            .reads
            .iter()
            .map(|b| b.len())
            .chain(self.writes.iter().map(|b| b.len()))
            .find(|&len| len < self.num_comps);
        if let Some(len) = short {
            return Err(Error::Device(format!(
                "buffer of {} elements cannot serve {} instances",
                len, self.num_comps
            )));
        }
        Ok(())
    }
}

/// Compute backend trait (host, CUDA)
pub trait Backend: Send + Sync + 'static {
    type Buffer: DeviceBuffer;
    /// Ordering token: operations issued on one stream execute in issue order
    type Stream: Send;
    type Module: Send + Sync;

    /// Get backend name for logging/debugging
    fn backend_name(&self) -> &str;

    /// Multiprocessor count used to cap grid sizes
    fn multiprocessor_count(&self) -> usize;

    fn upload(&self, data: &HostArray) -> Result<Self::Buffer>;

    fn alloc_zeros(&self, ty: ScalarType, len: usize) -> Result<Self::Buffer>;

    /// Blocking copy back to the host
    fn download(&self, buffer: &Self::Buffer) -> Result<HostArray>;

    /// Compile generated source. Failures carry diagnostics and the source.
    fn compile(&self, source: &KernelSource<'_>) -> Result<Self::Module>;

    fn create_stream(&self) -> Result<Self::Stream>;

    /// Enqueue a same-type, same-length device-to-device copy
    fn copy_async(
        &self,
        src: &Self::Buffer,
        dst: &mut Self::Buffer,
        stream: &mut Self::Stream,
    ) -> Result<()>;

    /// Enqueue a kernel launch; returns once issued
    fn launch_async(
        &self,
        module: &Self::Module,
        geometry: LaunchGeometry,
        args: KernelArgs<'_, Self>,
        stream: &mut Self::Stream,
    ) -> Result<()>;

    /// Wait for everything issued on `stream`
    fn synchronize(&self, stream: &mut Self::Stream) -> Result<()>;
}

/// Backend type enum for construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Host execution with rayon lanes
    #[default]
    Cpu,

    /// NVIDIA GPU via CUDA (NVRTC runtime compilation)
    Cuda,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Cpu => write!(f, "CPU"),
            BackendType::Cuda => write!(f, "CUDA"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" | "host" => Ok(BackendType::Cpu),
            "cuda" | "gpu" => Ok(BackendType::Cuda),
            _ => Err(Error::BackendUnavailable(format!("unknown backend '{}'", s))),
        }
    }
}

impl BackendType {
    /// Whether this build can construct the backend at all
    pub fn is_compiled_in(&self) -> bool {
        match self {
            BackendType::Cpu => true,
            BackendType::Cuda => cfg!(feature = "cuda"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!("cpu".parse::<BackendType>().unwrap(), BackendType::Cpu);
        assert_eq!("CUDA".parse::<BackendType>().unwrap(), BackendType::Cuda);
        assert!("wgpu".parse::<BackendType>().is_err());
        assert_eq!(BackendType::default().to_string(), "CPU");
        assert!(BackendType::Cpu.is_compiled_in());
    }
}
