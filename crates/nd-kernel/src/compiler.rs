// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Kernel Compilation Cache
//!
//! Generated source is compiled at most once per `(model, type signature,
//! compile options)` for the lifetime of a [`KernelCache`]. Options are part of
//! the key so a diagnostics build always reaches the compiler. Launch geometry depends on the instance
//! count, so it lives in the per-component [`CompiledKernel`] handle rather than
//! in the shared cache entry.
//!
//! Compilation only ever happens at component construction; the step path
//! holds an `Arc` to the cached program.

use core::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::{Backend, KernelSource};
use crate::geometry::{LaunchGeometry, LaunchPolicy};
use crate::models::ComponentModel;
use crate::resolver::{ResolvedTypes, TypeSignature};
use crate::template::bindings_for;
use crate::types::{Result, ScalarType};

/// Number of scalar arguments ahead of the buffer pointers (count, dt, nsteps)
pub const SCALAR_ARGS: usize = 3;

/// Argument-packing signature: count, time-step, inner iterations, then pointers.
///
/// Renders as `i`, the time-step code, `i`, then one `P` per pointer
/// (e.g. `ifiPPPP`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgSignature {
    dt: ScalarType,
    pointers: usize,
}

impl ArgSignature {
    pub fn new(dt: ScalarType, pointers: usize) -> Self {
        Self { dt, pointers }
    }

    pub fn dt_type(&self) -> ScalarType {
        self.dt
    }

    pub fn pointer_count(&self) -> usize {
        self.pointers
    }

    pub fn arg_count(&self) -> usize {
        SCALAR_ARGS + self.pointers
    }
}

impl fmt::Display for ArgSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}i{}", self.dt.packing_code(), "P".repeat(self.pointers))
    }
}

/// Options forwarded to the backend compiler
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompileOptions {
    /// Emit low-level compiler output (register/resource usage)
    pub diagnostics: bool,
    pub extra: Vec<String>,
}

impl CompileOptions {
    pub fn flags(&self) -> Vec<String> {
        let mut flags = Vec::with_capacity(self.extra.len() + 1);
        if self.diagnostics {
            flags.push("--ptxas-options=-v".to_string());
        }
        flags.extend(self.extra.iter().cloned());
        flags
    }
}

/// Compiled module for one type signature, shared by every component using it
pub struct KernelProgram<B: Backend> {
    model: &'static str,
    entry: &'static str,
    module: B::Module,
    source: String,
    args: ArgSignature,
    types: ResolvedTypes,
}

impl<B: Backend> KernelProgram<B> {
    pub fn model(&self) -> &'static str {
        self.model
    }

    pub fn entry(&self) -> &'static str {
        self.entry
    }

    pub fn module(&self) -> &B::Module {
        &self.module
    }

    /// Generated source the module was built from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn args(&self) -> &ArgSignature {
        &self.args
    }

    pub fn types(&self) -> &ResolvedTypes {
        &self.types
    }
}

/// A cached program plus the geometry for one component's instance count
pub struct CompiledKernel<B: Backend> {
    program: Arc<KernelProgram<B>>,
    geometry: LaunchGeometry,
}

impl<B: Backend> Clone for CompiledKernel<B> {
    fn clone(&self) -> Self {
        Self {
            program: Arc::clone(&self.program),
            geometry: self.geometry,
        }
    }
}

impl<B: Backend> CompiledKernel<B> {
    pub fn program(&self) -> &Arc<KernelProgram<B>> {
        &self.program
    }

    pub fn module(&self) -> &B::Module {
        self.program.module()
    }

    pub fn geometry(&self) -> LaunchGeometry {
        self.geometry
    }

    pub fn args(&self) -> &ArgSignature {
        self.program.args()
    }

    pub fn source(&self) -> &str {
        self.program.source()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub compilations: u64,
    pub hits: u64,
}

type CacheKey = (&'static str, TypeSignature, CompileOptions);

struct CacheInner<B: Backend> {
    programs: AHashMap<CacheKey, Arc<KernelProgram<B>>>,
    stats: CacheStats,
}

/// Signature-keyed compiled-kernel cache.
///
/// The lock is held across compilation so concurrent constructions of the same
/// signature compile once.
pub struct KernelCache<B: Backend> {
    inner: Mutex<CacheInner<B>>,
}

impl<B: Backend> Default for KernelCache<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> KernelCache<B> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                programs: AHashMap::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Return the cached program for `resolved`, compiling it on a miss
    pub fn get_or_compile(
        &self,
        backend: &B,
        model: &dyn ComponentModel,
        resolved: &ResolvedTypes,
        options: &CompileOptions,
    ) -> Result<Arc<KernelProgram<B>>> {
        let key = (model.name(), resolved.signature.clone(), options.clone());
        let mut inner = self.inner.lock();

        if let Some(program) = inner.programs.get(&key) {
            let program = Arc::clone(program);
            inner.stats.hits += 1;
            debug!(
                target: "nd-kernel",
                "[CACHE] hit for {} {}",
                model.name(),
                resolved.signature
            );
            return Ok(program);
        }

        let template = model.template();
        let code = template.expand(&bindings_for(resolved))?;
        let pointers = model.accesses().len() + model.params().len() + model.updates().len();
        let args = ArgSignature::new(resolved.dt_type(), pointers);

        let module = backend.compile(&KernelSource {
            entry: template.entry(),
            code: &code,
            host_body: model.host_body(),
            args: &args,
            options,
        })?;

        info!(
            target: "nd-kernel",
            "[CACHE] compiled {} for {} on {} (args '{}')",
            model.name(),
            resolved.signature,
            backend.backend_name(),
            args
        );

        let program = Arc::new(KernelProgram {
            model: model.name(),
            entry: template.entry(),
            module,
            source: code,
            args,
            types: resolved.clone(),
        });
        inner.programs.insert(key, Arc::clone(&program));
        inner.stats.compilations += 1;
        Ok(program)
    }

    /// Cached program plus geometry for `num_comps` instances
    pub fn get_kernel(
        &self,
        backend: &B,
        model: &dyn ComponentModel,
        resolved: &ResolvedTypes,
        num_comps: usize,
        policy: &LaunchPolicy,
        options: &CompileOptions,
    ) -> Result<CompiledKernel<B>> {
        let geometry = policy.geometry(num_comps, backend.multiprocessor_count())?;
        let program = self.get_or_compile(backend, model, resolved, options)?;
        Ok(CompiledKernel { program, geometry })
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    pub fn len(&self) -> usize {
        self.inner.lock().programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached program (components keep the ones they hold)
    pub fn clear(&self) {
        self.inner.lock().programs.clear();
    }
}
