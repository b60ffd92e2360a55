// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! CUDA Backend for component kernels
//!
//! Generated kernel source is compiled at runtime with NVRTC and loaded as a
//! PTX module on the selected device. Copies and launches are issued on a
//! stream forked from the device's default stream, so a simulation step's
//! retrievals and launches execute in issue order without blocking the host.
//!
//! # Minimum Requirements
//! - NVIDIA GPU with a CUDA 11.8+ driver
//! - NVRTC available at runtime

use crate::types::{Error, Result};

#[cfg(feature = "cuda")]
use super::{Backend, DeviceBuffer, KernelArgs, KernelSource};
#[cfg(feature = "cuda")]
use crate::compiler::ArgSignature;
#[cfg(feature = "cuda")]
use crate::geometry::LaunchGeometry;
#[cfg(feature = "cuda")]
use crate::types::{HostArray, ScalarType};
#[cfg(feature = "cuda")]
use cudarc::driver::{
    result as driver_result, sys, CudaDevice, CudaFunction, CudaSlice, CudaStream, DevicePtr,
    DriverError, LaunchAsync, LaunchConfig,
};
#[cfg(feature = "cuda")]
use std::ffi::c_void;
#[cfg(feature = "cuda")]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "cuda")]
use std::sync::Arc;
#[cfg(feature = "cuda")]
use tracing::{debug, info, trace};

/// Device memory of one supported element type
#[cfg(feature = "cuda")]
pub enum CudaBuffer {
    F32(CudaSlice<f32>),
    F64(CudaSlice<f64>),
    I32(CudaSlice<i32>),
    U32(CudaSlice<u32>),
    I64(CudaSlice<i64>),
    U64(CudaSlice<u64>),
}

#[cfg(feature = "cuda")]
macro_rules! each_slice {
    ($buffer:expr, $slice:ident => $body:expr) => {
        match $buffer {
            CudaBuffer::F32($slice) => $body,
            CudaBuffer::F64($slice) => $body,
            CudaBuffer::I32($slice) => $body,
            CudaBuffer::U32($slice) => $body,
            CudaBuffer::I64($slice) => $body,
            CudaBuffer::U64($slice) => $body,
        }
    };
}

#[cfg(feature = "cuda")]
impl CudaBuffer {
    fn device_ptr_value(&self) -> sys::CUdeviceptr {
        each_slice!(self, s => *s.device_ptr())
    }
}

#[cfg(feature = "cuda")]
impl DeviceBuffer for CudaBuffer {
    fn scalar_type(&self) -> ScalarType {
        match self {
            CudaBuffer::F32(_) => ScalarType::F32,
            CudaBuffer::F64(_) => ScalarType::F64,
            CudaBuffer::I32(_) => ScalarType::I32,
            CudaBuffer::U32(_) => ScalarType::U32,
            CudaBuffer::I64(_) => ScalarType::I64,
            CudaBuffer::U64(_) => ScalarType::U64,
        }
    }

    fn len(&self) -> usize {
        each_slice!(self, s => s.len())
    }
}

/// Loaded kernel function plus its packing signature
#[cfg(feature = "cuda")]
pub struct CudaModule {
    function: CudaFunction,
    args: ArgSignature,
    name: String,
}

// SAFETY: the function handle belongs to a module loaded in the device's
// primary context; cudarc binds that context before every launch.
#[cfg(feature = "cuda")]
unsafe impl Send for CudaModule {}
#[cfg(feature = "cuda")]
unsafe impl Sync for CudaModule {}

/// Stream used as the ordering token for one execution context
#[cfg(feature = "cuda")]
pub struct CudaStreamToken {
    stream: CudaStream,
}

// SAFETY: a stream handle may be used from any thread bound to its context.
#[cfg(feature = "cuda")]
unsafe impl Send for CudaStreamToken {}

/// CUDA backend on one device
#[cfg(feature = "cuda")]
pub struct CudaBackend {
    name: String,
    device: Arc<CudaDevice>,
    device_id: usize,
    multiprocessors: usize,
    next_module: AtomicUsize,
}

#[cfg(feature = "cuda")]
impl CudaBackend {
    /// Create a CUDA backend on the given device
    pub fn new(device_id: usize) -> Result<Self> {
        info!(target: "nd-kernel", "🔧 Initializing CUDA backend on GPU {}...", device_id);

        let device = CudaDevice::new(device_id).map_err(|e| {
            Error::BackendUnavailable(format!("Failed to create CUDA device {}: {}", device_id, e))
        })?;

        let multiprocessors = device
            .attribute(sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)
            .map_err(|e| Error::Device(format!("Failed to query multiprocessor count: {}", e)))?;
        let multiprocessors = usize::try_from(multiprocessors).unwrap_or(0);

        let device_name = device
            .name()
            .unwrap_or_else(|_| format!("NVIDIA GPU {}", device_id));
        let name = format!("{} (GPU {})", device_name, device_id);

        info!(
            target: "nd-kernel",
            "✅ Created CUDA backend: {} with {} multiprocessors",
            name,
            multiprocessors
        );

        Ok(Self {
            name,
            device,
            device_id,
            multiprocessors,
            next_module: AtomicUsize::new(0),
        })
    }

    pub fn device_id(&self) -> usize {
        self.device_id
    }

    fn device_err(context: &str, e: impl std::fmt::Display) -> Error {
        Error::Device(format!("{}: {}", context, e))
    }
}

#[cfg(feature = "cuda")]
impl Backend for CudaBackend {
    type Buffer = CudaBuffer;
    type Stream = CudaStreamToken;
    type Module = CudaModule;

    fn backend_name(&self) -> &str {
        &self.name
    }

    fn multiprocessor_count(&self) -> usize {
        self.multiprocessors
    }

    fn upload(&self, data: &HostArray) -> Result<CudaBuffer> {
        let upload_err = |e: DriverError| Self::device_err("Failed to upload array", e);
        Ok(match data {
            HostArray::F32(v) => CudaBuffer::F32(self.device.htod_copy(v.clone()).map_err(upload_err)?),
            HostArray::F64(v) => CudaBuffer::F64(self.device.htod_copy(v.clone()).map_err(upload_err)?),
            HostArray::I32(v) => CudaBuffer::I32(self.device.htod_copy(v.clone()).map_err(upload_err)?),
            HostArray::U32(v) => CudaBuffer::U32(self.device.htod_copy(v.clone()).map_err(upload_err)?),
            HostArray::I64(v) => CudaBuffer::I64(self.device.htod_copy(v.clone()).map_err(upload_err)?),
            HostArray::U64(v) => CudaBuffer::U64(self.device.htod_copy(v.clone()).map_err(upload_err)?),
        })
    }

    fn alloc_zeros(&self, ty: ScalarType, len: usize) -> Result<CudaBuffer> {
        let alloc_err = |e: DriverError| Self::device_err("Failed to allocate device buffer", e);
        Ok(match ty {
            ScalarType::F32 => CudaBuffer::F32(self.device.alloc_zeros(len).map_err(alloc_err)?),
            ScalarType::F64 => CudaBuffer::F64(self.device.alloc_zeros(len).map_err(alloc_err)?),
            ScalarType::I32 => CudaBuffer::I32(self.device.alloc_zeros(len).map_err(alloc_err)?),
            ScalarType::U32 => CudaBuffer::U32(self.device.alloc_zeros(len).map_err(alloc_err)?),
            ScalarType::I64 => CudaBuffer::I64(self.device.alloc_zeros(len).map_err(alloc_err)?),
            ScalarType::U64 => CudaBuffer::U64(self.device.alloc_zeros(len).map_err(alloc_err)?),
        })
    }

    fn download(&self, buffer: &CudaBuffer) -> Result<HostArray> {
        let download_err = |e: DriverError| Self::device_err("Failed to download buffer", e);
        Ok(each_slice!(buffer, s => HostArray::from(
            self.device.dtoh_sync_copy(s).map_err(download_err)?
        )))
    }

    fn compile(&self, source: &KernelSource<'_>) -> Result<CudaModule> {
        let options = cudarc::nvrtc::CompileOptions {
            options: source.options.flags(),
            ..Default::default()
        };

        let ptx = cudarc::nvrtc::compile_ptx_with_opts(source.code, options).map_err(|e| {
            Error::Compilation {
                diagnostics: format!("{:?}", e),
                code: source.code.to_string(),
            }
        })?;

        let name = format!(
            "{}_{}",
            source.entry,
            self.next_module.fetch_add(1, Ordering::Relaxed)
        );
        self.device
            .load_ptx(ptx, &name, &[source.entry])
            .map_err(|e| Error::Compilation {
                diagnostics: format!("Failed to load PTX module '{}': {}", name, e),
                code: source.code.to_string(),
            })?;

        let function = self.device.get_func(&name, source.entry).ok_or_else(|| {
            Error::Compilation {
                diagnostics: format!("Module '{}' has no function '{}'", name, source.entry),
                code: source.code.to_string(),
            }
        })?;

        debug!(target: "nd-kernel", "📦 Loaded CUDA module {} ({})", name, source.args);

        Ok(CudaModule {
            function,
            args: source.args.clone(),
            name,
        })
    }

    fn create_stream(&self) -> Result<CudaStreamToken> {
        let stream = self
            .device
            .fork_default_stream()
            .map_err(|e| Self::device_err("Failed to create stream", e))?;
        Ok(CudaStreamToken { stream })
    }

    fn copy_async(
        &self,
        src: &CudaBuffer,
        dst: &mut CudaBuffer,
        stream: &mut CudaStreamToken,
    ) -> Result<()> {
        if src.scalar_type() != dst.scalar_type() || src.len() != dst.len() {
            return Err(Error::Device(format!(
                "copy of {} x {} into {} x {}",
                src.len(),
                src.scalar_type(),
                dst.len(),
                dst.scalar_type()
            )));
        }

        let num_bytes = src.len() * src.scalar_type().size_bytes();
        self.device
            .bind_to_thread()
            .map_err(|e| Self::device_err("Failed to bind context", e))?;
        // SAFETY: both allocations are live for the duration of the call and
        // hold `num_bytes` bytes; the copy is ordered on `stream`.
        unsafe {
            driver_result::memcpy_dtod_async(
                dst.device_ptr_value(),
                src.device_ptr_value(),
                num_bytes,
                stream.stream.stream,
            )
        }
        .map_err(|e| Self::device_err("Device-to-device copy failed", e))
    }

    fn launch_async(
        &self,
        module: &CudaModule,
        geometry: LaunchGeometry,
        args: KernelArgs<'_, Self>,
        stream: &mut CudaStreamToken,
    ) -> Result<()> {
        args.validate(&module.args)?;

        let config = LaunchConfig {
            grid_dim: (geometry.grid_size, 1, 1),
            block_dim: (geometry.block_size, 1, 1),
            shared_mem_bytes: 0,
        };

        let mut num_comps = i32::try_from(args.num_comps)
            .map_err(|_| Error::Device(format!("{} instances exceed int range", args.num_comps)))?;
        let mut dt = args.dt.to_ne_bytes();
        let mut nsteps = args.nsteps;
        let mut pointers: Vec<sys::CUdeviceptr> = args
            .reads
            .iter()
            .map(|b| b.device_ptr_value())
            .chain(args.writes.iter().map(|b| b.device_ptr_value()))
            .collect();

        let mut params: Vec<*mut c_void> = Vec::with_capacity(module.args.arg_count());
        params.push(&mut num_comps as *mut i32 as *mut c_void);
        params.push(dt.as_mut_ptr() as *mut c_void);
        params.push(&mut nsteps as *mut i32 as *mut c_void);
        params.extend(
            pointers
                .iter_mut()
                .map(|p| p as *mut sys::CUdeviceptr as *mut c_void),
        );

        // SAFETY: `params` matches the module's packing signature (validated
        // above) and every pointee outlives the call.
        unsafe {
            module
                .function
                .clone()
                .launch_on_stream(&stream.stream, config, &mut params[..])
        }
        .map_err(|e| Self::device_err("Kernel launch failed", e))?;

        trace!(
            target: "nd-kernel",
            "[CUDA-LAUNCH] {} grid={} block={} n={}",
            module.name,
            geometry.grid_size,
            geometry.block_size,
            num_comps
        );
        Ok(())
    }

    fn synchronize(&self, stream: &mut CudaStreamToken) -> Result<()> {
        self.device
            .bind_to_thread()
            .map_err(|e| Self::device_err("Failed to bind context", e))?;
        // SAFETY: the stream handle is live while `stream` is borrowed.
        unsafe { driver_result::stream::synchronize(stream.stream.stream) }
            .map_err(|e| Self::device_err("Failed to synchronize stream", e))
    }
}

#[cfg(feature = "cuda")]
impl Drop for CudaBackend {
    fn drop(&mut self) {
        debug!(target: "nd-kernel", "Releasing CUDA backend on GPU {}", self.device_id);
    }
}

// Stub implementation when CUDA feature is disabled
#[cfg(not(feature = "cuda"))]
pub struct CudaBackend;

#[cfg(not(feature = "cuda"))]
impl CudaBackend {
    pub fn new(_device_id: usize) -> Result<Self> {
        Err(Error::BackendUnavailable(
            "CUDA support not compiled. Rebuild with --features cuda".to_string(),
        ))
    }
}

/// Check if CUDA is available on this system
pub fn is_cuda_available() -> bool {
    #[cfg(feature = "cuda")]
    {
        CudaDevice::new(0).is_ok()
    }

    #[cfg(not(feature = "cuda"))]
    {
        false
    }
}

/// Enumerate CUDA devices as `(device id, name, multiprocessor count)`
#[cfg(feature = "cuda")]
pub fn enumerate_cuda_devices() -> Vec<(usize, String, usize)> {
    let mut devices = Vec::new();

    for device_id in 0..16 {
        match CudaBackend::new(device_id) {
            Ok(backend) => devices.push((device_id, backend.name.clone(), backend.multiprocessors)),
            Err(_) => break,
        }
    }

    devices
}

#[cfg(not(feature = "cuda"))]
pub fn enumerate_cuda_devices() -> Vec<(usize, String, usize)> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_stub_reports_unavailable() {
        assert!(matches!(
            CudaBackend::new(0),
            Err(Error::BackendUnavailable(_))
        ));
        assert!(!is_cuda_available());
        assert!(enumerate_cuda_devices().is_empty());
    }
}
