// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # ND Kernel
//!
//! Compiled, cached, per-type-signature kernels for lockstep component models.
//!
//! ## Flow
//! - **Construct once**: resolve types -> expand template -> compile (cached
//!   per signature) -> size the launch -> upload parameters
//! - **Every step**: copy upstream buffers into dense inputs -> launch the
//!   kernel into caller-owned destinations, all on the caller's stream
//!
//! ## Architecture
//! - [`resolver`]: element-type descriptors to canonical scalar types
//! - [`template`]: `{{name}}` kernel templates
//! - [`compiler`]: signature-keyed kernel cache and argument packing
//! - [`backend`]: host (rayon) and CUDA (NVRTC, feature `cuda`) backends
//! - [`retriever`] / [`dispatcher`]: the per-step protocol
//! - [`component`] / [`models`]: component construction and the model registry

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod compiler;
pub mod component;
pub mod dispatcher;
pub mod geometry;
pub mod models;
pub mod resolver;
pub mod retriever;
pub mod template;
pub mod types;

pub use backend::{
    enumerate_cuda_devices, is_cuda_available, Backend, BackendType, CudaBackend, DeviceBuffer,
    HostBackend, HostBuffer, HostStream, StreamOp,
};
pub use compiler::{ArgSignature, CacheStats, CompileOptions, CompiledKernel, KernelCache};
pub use component::{Component, ComponentOptions, ComponentSpec, DebugInfo, SynapseComponent};
pub use dispatcher::{Dispatcher, StepState, UpdateDestinations};
pub use geometry::{LaunchGeometry, LaunchPolicy};
pub use models::{ComponentModel, ModelRegistry, RotN, ROTN};
pub use resolver::{parse_descriptor, RawArray, ResolvedTypes, TypeResolver, TypeSignature};
pub use retriever::{shared, BufferRetriever, SharedBuffer};
pub use template::KernelTemplate;
pub use types::{Error, HostArray, KernelError, Result, Scalar, ScalarType};
