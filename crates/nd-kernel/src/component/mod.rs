// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Components
//!
//! A component binds one model to `N` instances on a backend. Construction
//! runs once and in a fixed order:
//!
//! 1. validate the declaration and resolve every quantity's type
//! 2. fetch the compiled kernel from the cache (compiling on a miss)
//! 3. compute launch geometry for `N`
//! 4. upload parameters and allocate the dense input buffers
//!
//! Any failure before step 4 leaves nothing allocated; buffers allocated in
//! step 4 are owned values released on drop, including on an early return.
//!
//! Each step then runs the dispatcher's retrieve-and-launch cycle against the
//! caller's destinations and stream.

pub mod spec;

pub use spec::{ComponentSpec, DecodedSpec};

use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, info};

use crate::backend::{Backend, DeviceBuffer};
use crate::compiler::{ArgSignature, CompileOptions, CompiledKernel, KernelCache};
use crate::dispatcher::{Dispatcher, StepState, UpdateDestinations};
use crate::geometry::{LaunchGeometry, LaunchPolicy};
use crate::models::ComponentModel;
use crate::resolver::{RawArray, TypeSignature};
use crate::retriever::{BufferRetriever, SharedBuffer};
use crate::types::{KernelError, Result, Scalar};

/// Construction flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentOptions {
    /// Emit low-level compiler output while building the kernel
    pub compile_diagnostics: bool,
    /// Retain generated source and resolved types for inspection
    pub debug: bool,
    pub launch: LaunchPolicy,
}

impl ComponentOptions {
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            diagnostics: self.compile_diagnostics,
            extra: Vec::new(),
        }
    }
}

/// Intermediate structures kept when `debug` is set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub source: String,
    pub types: TypeSignature,
    pub args: ArgSignature,
    pub geometry: LaunchGeometry,
}

/// Interface the surrounding engine drives every component through
pub trait Component<B: Backend>: Send {
    fn name(&self) -> &str;

    fn accesses(&self) -> &[&'static str];

    fn params(&self) -> &[&'static str];

    fn updates(&self) -> &[&'static str];

    fn num_comps(&self) -> usize;

    /// Issue one step: refresh inputs, then launch into `destinations`.
    ///
    /// Returns once the work is enqueued on `stream`.
    fn run_step(
        &mut self,
        destinations: &mut UpdateDestinations<'_, B>,
        stream: &mut B::Stream,
    ) -> Result<()>;
}

/// Stateless synapse-style component driven by a [`ComponentModel`]
pub struct SynapseComponent<B: Backend> {
    model: Arc<dyn ComponentModel>,
    backend: Arc<B>,
    spec: ComponentSpec,
    params: Vec<B::Buffer>,
    dispatcher: Dispatcher<B>,
    cache: Arc<KernelCache<B>>,
    debug: Option<DebugInfo>,
    dt: f64,
}

impl<B: Backend> SynapseComponent<B> {
    /// Build a component with its own kernel cache
    pub fn new(
        model: Arc<dyn ComponentModel>,
        backend: Arc<B>,
        params: AHashMap<String, RawArray>,
        access_buffers: AHashMap<String, SharedBuffer<B>>,
        dt: f64,
        options: ComponentOptions,
    ) -> Result<Self> {
        Self::with_cache(
            model,
            backend,
            params,
            access_buffers,
            dt,
            options,
            Arc::new(KernelCache::new()),
        )
    }

    /// Build a component that shares `cache` with others
    ///
    /// # Arguments
    /// * `params` - one array per declared parameter; the first fixes `N`
    /// * `access_buffers` - upstream buffer per declared access
    /// * `dt` - step duration in seconds
    pub fn with_cache(
        model: Arc<dyn ComponentModel>,
        backend: Arc<B>,
        params: AHashMap<String, RawArray>,
        mut access_buffers: AHashMap<String, SharedBuffer<B>>,
        dt: f64,
        options: ComponentOptions,
        cache: Arc<KernelCache<B>>,
    ) -> Result<Self> {
        options.launch.validate()?;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(KernelError::InvalidSpec(format!(
                "step duration must be positive, got {}",
                dt
            )));
        }
        let nsteps = model.inner_steps();
        if nsteps < 1 {
            return Err(KernelError::InvalidSpec(format!(
                "model '{}' declares {} inner steps",
                model.name(),
                nsteps
            )));
        }

        let access_descriptors: AHashMap<String, String> = access_buffers
            .iter()
            .map(|(name, buffer)| {
                (
                    name.clone(),
                    buffer.read().scalar_type().descriptor().to_string(),
                )
            })
            .collect();
        let DecodedSpec {
            spec,
            params: host_params,
        } = ComponentSpec::decode(model.as_ref(), &params, &access_descriptors)?;
        let num_comps = spec.num_comps();

        info!(
            target: "nd-kernel",
            "🔧 Building {} component: {} instances, types {}",
            model.name(),
            num_comps,
            spec.types().signature
        );

        let kernel: CompiledKernel<B> = cache.get_kernel(
            backend.as_ref(),
            model.as_ref(),
            spec.types(),
            num_comps,
            &options.launch,
            &options.compile_options(),
        )?;

        debug!(
            target: "nd-kernel",
            "   geometry grid={} block={} args '{}'",
            kernel.geometry().grid_size,
            kernel.geometry().block_size,
            kernel.args()
        );

        let device_params = host_params
            .iter()
            .map(|array| backend.upload(array))
            .collect::<Result<Vec<_>>>()?;

        let mut inputs = Vec::with_capacity(spec.accesses().len());
        let mut sources = Vec::with_capacity(spec.accesses().len());
        for access in spec.accesses() {
            let ty = spec.type_of(access).ok_or_else(|| {
                KernelError::InvalidSpec(format!("access '{}' has no resolved type", access))
            })?;
            inputs.push(backend.alloc_zeros(ty, num_comps)?);
            let upstream = access_buffers.remove(*access).ok_or_else(|| {
                KernelError::InvalidSpec(format!("no upstream buffer for access '{}'", access))
            })?;
            sources.push((access.to_string(), upstream));
        }

        let updates = spec
            .updates()
            .iter()
            .map(|update| {
                spec.type_of(update)
                    .map(|ty| (update.to_string(), ty))
                    .ok_or_else(|| {
                        KernelError::InvalidSpec(format!("update '{}' has no resolved type", update))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let dt_type = spec.types().dt_type();
        let ddt = dt / f64::from(nsteps);
        let scaled_dt = Scalar::from_f64(dt_type, ddt * 1000.0);

        let debug_info = options.debug.then(|| DebugInfo {
            source: kernel.source().to_string(),
            types: spec.types().signature.clone(),
            args: kernel.args().clone(),
            geometry: kernel.geometry(),
        });

        let dispatcher = Dispatcher::new(
            kernel,
            BufferRetriever::new(sources, num_comps),
            inputs,
            updates,
            num_comps,
            scaled_dt,
            nsteps,
        );

        info!(
            target: "nd-kernel",
            "✅ {} component ready on {}",
            model.name(),
            backend.backend_name()
        );

        Ok(Self {
            model,
            backend,
            spec,
            params: device_params,
            dispatcher,
            cache,
            debug: debug_info,
            dt,
        })
    }

    pub fn spec(&self) -> &ComponentSpec {
        &self.spec
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn cache(&self) -> &Arc<KernelCache<B>> {
        &self.cache
    }

    pub fn compiled_kernel(&self) -> &CompiledKernel<B> {
        self.dispatcher.kernel()
    }

    /// Retained intermediates, `None` unless built with `debug`
    pub fn debug_info(&self) -> Option<&DebugInfo> {
        self.debug.as_ref()
    }

    /// Step duration in seconds as given at construction
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Time-step scalar passed to the kernel (`dt / nsteps`, in milliseconds)
    pub fn scaled_dt(&self) -> Scalar {
        self.dispatcher.scaled_dt()
    }

    pub fn parameter(&self, name: &str) -> Option<&B::Buffer> {
        let pos = self.spec.params().iter().position(|p| *p == name)?;
        self.params.get(pos)
    }

    /// Parameters may be overwritten between steps; shape and type must stay
    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut B::Buffer> {
        let pos = self.spec.params().iter().position(|p| *p == name)?;
        self.params.get_mut(pos)
    }

    /// Dense input buffer of an access, as of the last retrieval
    pub fn input(&self, access: &str) -> Option<&B::Buffer> {
        let pos = self.spec.accesses().iter().position(|a| *a == access)?;
        self.dispatcher.inputs().get(pos)
    }

    pub fn state(&self) -> StepState {
        self.dispatcher.state()
    }

    pub fn steps_issued(&self) -> u64 {
        self.dispatcher.steps_issued()
    }
}

impl<B: Backend> Component<B> for SynapseComponent<B> {
    fn name(&self) -> &str {
        self.model.name()
    }

    fn accesses(&self) -> &[&'static str] {
        self.spec.accesses()
    }

    fn params(&self) -> &[&'static str] {
        self.spec.params()
    }

    fn updates(&self) -> &[&'static str] {
        self.spec.updates()
    }

    fn num_comps(&self) -> usize {
        self.spec.num_comps()
    }

    fn run_step(
        &mut self,
        destinations: &mut UpdateDestinations<'_, B>,
        stream: &mut B::Stream,
    ) -> Result<()> {
        for (name, buffer) in self.spec.params().iter().zip(&self.params) {
            if buffer.len() != self.spec.num_comps()
                || Some(buffer.scalar_type()) != self.spec.type_of(name)
            {
                return Err(KernelError::InvalidSpec(format!(
                    "parameter '{}' was replaced by {} x {}",
                    name,
                    buffer.len(),
                    buffer.scalar_type()
                )));
            }
        }
        self.dispatcher
            .run_step(self.backend.as_ref(), &self.params, destinations, stream)
    }
}
