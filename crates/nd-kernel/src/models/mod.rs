// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Component Model Architecture
//!
//! A component model declares the quantities its kernel touches and supplies
//! the kernel template plus the equivalent per-instance host body.
//!
//! ## Adding a New Model
//!
//! 1. Create `src/models/your_model.rs`
//! 2. Implement `ComponentModel`
//! 3. Register it in `ModelRegistry::with_builtin_models`
//! 4. Add tests

pub mod rotn;

pub use rotn::{RotN, ROTN};

use std::sync::Arc;

use ahash::AHashMap;
use tracing::debug;

use crate::backend::{Backend, HostBody};
use crate::compiler::KernelCache;
use crate::component::{Component, ComponentOptions, SynapseComponent};
use crate::resolver::RawArray;
use crate::retriever::SharedBuffer;
use crate::template::KernelTemplate;
use crate::types::{KernelError, Result};

/// Declarative description of a component kind
pub trait ComponentModel: Send + Sync {
    /// Class name used by the graph translation layer
    fn name(&self) -> &'static str;

    /// Input access names, in kernel argument order
    fn accesses(&self) -> &'static [&'static str];

    /// Parameter names, in kernel argument order. The first one fixes `N` and
    /// the type of `dt` and every update.
    fn params(&self) -> &'static [&'static str];

    /// Output update names, in kernel argument order
    fn updates(&self) -> &'static [&'static str];

    /// Inner iterations per step
    fn inner_steps(&self) -> i32 {
        1
    }

    fn template(&self) -> KernelTemplate;

    fn host_body(&self) -> HostBody;
}

/// Component kinds by class name
pub struct ModelRegistry {
    models: AHashMap<&'static str, Arc<dyn ComponentModel>>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_builtin_models()
    }
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self {
            models: AHashMap::new(),
        }
    }

    pub fn with_builtin_models() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(RotN));
        registry
    }

    /// Add or replace a model under its own name
    pub fn register(&mut self, model: Arc<dyn ComponentModel>) {
        debug!(target: "nd-kernel", "Registered component model {}", model.name());
        self.models.insert(model.name(), model);
    }

    pub fn get(&self, class: &str) -> Option<Arc<dyn ComponentModel>> {
        self.models.get(class).cloned()
    }

    /// Registered class names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.models.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Construct a component of `class`, sharing `cache` when given
    #[allow(clippy::too_many_arguments)]
    pub fn build<B: Backend>(
        &self,
        class: &str,
        backend: Arc<B>,
        params: AHashMap<String, RawArray>,
        access_buffers: AHashMap<String, SharedBuffer<B>>,
        dt: f64,
        options: ComponentOptions,
        cache: Option<Arc<KernelCache<B>>>,
    ) -> Result<Box<dyn Component<B>>> {
        let model = self
            .get(class)
            .ok_or_else(|| KernelError::InvalidSpec(format!("unknown component class '{}'", class)))?;
        let cache = cache.unwrap_or_default();
        let component =
            SynapseComponent::with_cache(model, backend, params, access_buffers, dt, options, cache)?;
        Ok(Box::new(component))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_models() {
        let registry = ModelRegistry::with_builtin_models();
        assert_eq!(registry.names(), vec!["RotN"]);
        assert!(registry.get("RotN").is_some());
        assert!(registry.get("LIN").is_none());
    }
}
