// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Step Dispatch
//!
//! One simulation step of a component is a fixed cycle:
//!
//! ```text
//! Idle -> Retrieving -> Dispatched -> Idle
//! ```
//!
//! - **Retrieving**: every access buffer is refreshed from its upstream source
//! - **Dispatched**: the compiled kernel is launched with
//!   `(N, scaled dt, nsteps, inputs.., params.., updates..)`
//!
//! Both phases only enqueue work on the caller's stream. The dispatcher never
//! waits for the device; it returns to `Idle` as soon as the launch is issued,
//! and also when any phase fails.

use tracing::trace;

use crate::backend::{Backend, DeviceBuffer, KernelArgs};
use crate::compiler::CompiledKernel;
use crate::retriever::BufferRetriever;
use crate::types::{KernelError, Result, Scalar, ScalarType};

/// Position in the per-step cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    #[default]
    Idle,
    Retrieving,
    Dispatched,
}

/// Caller-owned destinations for one step, keyed by update name.
///
/// Destinations are borrowed for the call only; the component writes through
/// them and never retains or frees them.
pub struct UpdateDestinations<'a, B: Backend> {
    entries: Vec<(String, &'a mut B::Buffer)>,
}

impl<B: Backend> Default for UpdateDestinations<'_, B> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<'a, B: Backend> UpdateDestinations<'a, B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, update: impl Into<String>, buffer: &'a mut B::Buffer) -> Self {
        self.insert(update, buffer);
        self
    }

    /// Set the destination for `update`, replacing any earlier one
    pub fn insert(&mut self, update: impl Into<String>, buffer: &'a mut B::Buffer) {
        let update = update.into();
        match self.entries.iter_mut().find(|(name, _)| *name == update) {
            Some(entry) => entry.1 = buffer,
            None => self.entries.push((update, buffer)),
        }
    }

    pub fn contains(&self, update: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == update)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reborrow the destinations in `updates` order. Undeclared names are ignored.
    fn ordered(&mut self, updates: &[(String, ScalarType)]) -> Result<Vec<&mut B::Buffer>> {
        let mut slots: Vec<Option<&mut B::Buffer>> = updates.iter().map(|_| None).collect();
        for (name, buffer) in self.entries.iter_mut() {
            if let Some(pos) = updates.iter().position(|(update, _)| *update == *name) {
                slots[pos] = Some(&mut **buffer);
            }
        }
        slots
            .into_iter()
            .zip(updates)
            .map(|(slot, (update, _))| {
                slot.ok_or_else(|| KernelError::MissingUpdateDestination(update.clone()))
            })
            .collect()
    }
}

/// Per-component step driver: owns the dense inputs, the retriever and the
/// compiled kernel handle
pub struct Dispatcher<B: Backend> {
    kernel: CompiledKernel<B>,
    retriever: BufferRetriever<B>,
    inputs: Vec<B::Buffer>,
    updates: Vec<(String, ScalarType)>,
    num_comps: usize,
    dt: Scalar,
    nsteps: i32,
    state: StepState,
    steps_issued: u64,
}

impl<B: Backend> Dispatcher<B> {
    /// # Arguments
    /// * `inputs` - one dense buffer per access, in the retriever's order
    /// * `updates` - declared update names and their resolved types
    /// * `dt` - time-step scalar as passed to the kernel
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kernel: CompiledKernel<B>,
        retriever: BufferRetriever<B>,
        inputs: Vec<B::Buffer>,
        updates: Vec<(String, ScalarType)>,
        num_comps: usize,
        dt: Scalar,
        nsteps: i32,
    ) -> Self {
        Self {
            kernel,
            retriever,
            inputs,
            updates,
            num_comps,
            dt,
            nsteps,
            state: StepState::Idle,
            steps_issued: 0,
        }
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn steps_issued(&self) -> u64 {
        self.steps_issued
    }

    pub fn kernel(&self) -> &CompiledKernel<B> {
        &self.kernel
    }

    pub fn scaled_dt(&self) -> Scalar {
        self.dt
    }

    pub fn inputs(&self) -> &[B::Buffer] {
        &self.inputs
    }

    /// Issue retrieval and launch for one step on `stream`
    pub fn run_step(
        &mut self,
        backend: &B,
        params: &[B::Buffer],
        destinations: &mut UpdateDestinations<'_, B>,
        stream: &mut B::Stream,
    ) -> Result<()> {
        let result = self.issue(backend, params, destinations, stream);
        self.state = StepState::Idle;
        if result.is_ok() {
            self.steps_issued += 1;
        }
        result
    }

    fn issue(
        &mut self,
        backend: &B,
        params: &[B::Buffer],
        destinations: &mut UpdateDestinations<'_, B>,
        stream: &mut B::Stream,
    ) -> Result<()> {
        let writes = destinations.ordered(&self.updates)?;
        for ((update, ty), buffer) in self.updates.iter().zip(&writes) {
            if buffer.len() != self.num_comps {
                return Err(KernelError::DestinationMismatch {
                    update: update.clone(),
                    reason: format!("length {} but {} instances", buffer.len(), self.num_comps),
                });
            }
            if buffer.scalar_type() != *ty {
                return Err(KernelError::DestinationMismatch {
                    update: update.clone(),
                    reason: format!("element type {} but update is {}", buffer.scalar_type(), ty),
                });
            }
        }

        self.state = StepState::Retrieving;
        self.retriever.retrieve(backend, &mut self.inputs, stream)?;

        self.state = StepState::Dispatched;
        let reads = self.inputs.iter().chain(params.iter()).collect();
        backend.launch_async(
            self.kernel.module(),
            self.kernel.geometry(),
            KernelArgs {
                num_comps: self.num_comps,
                dt: self.dt,
                nsteps: self.nsteps,
                reads,
                writes,
            },
            stream,
        )?;

        trace!(
            target: "nd-kernel",
            "[DISPATCH] step {} issued ({} instances)",
            self.steps_issued,
            self.num_comps
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HostBackend, HostBuffer};
    use crate::types::HostArray;

    fn declared() -> Vec<(String, ScalarType)> {
        vec![
            ("a".to_string(), ScalarType::F32),
            ("b".to_string(), ScalarType::F64),
        ]
    }

    #[test]
    fn test_destinations_follow_declaration_order() {
        let mut a = HostBuffer::from(HostArray::zeros(ScalarType::F32, 1));
        let mut b = HostBuffer::from(HostArray::zeros(ScalarType::F64, 1));
        let mut extra = HostBuffer::from(HostArray::zeros(ScalarType::I32, 1));
        let mut destinations = UpdateDestinations::<HostBackend>::new()
            .with("extra", &mut extra)
            .with("b", &mut b)
            .with("a", &mut a);

        let ordered = destinations.ordered(&declared()).unwrap();
        assert_eq!(ordered[0].scalar_type(), ScalarType::F32);
        assert_eq!(ordered[1].scalar_type(), ScalarType::F64);
    }

    #[test]
    fn test_missing_destination_is_named() {
        let mut a = HostBuffer::from(HostArray::zeros(ScalarType::F32, 1));
        let mut destinations = UpdateDestinations::<HostBackend>::new().with("a", &mut a);
        assert!(destinations.contains("a"));
        assert!(!destinations.contains("b"));

        match destinations.ordered(&declared()) {
            Err(KernelError::MissingUpdateDestination(name)) => assert_eq!(name, "b"),
            _ => panic!("expected a missing destination"),
        }
    }

    #[test]
    fn test_insert_replaces_existing_destination() {
        let mut first = HostBuffer::from(HostArray::zeros(ScalarType::F32, 1));
        let mut second = HostBuffer::from(HostArray::zeros(ScalarType::F32, 3));
        let mut destinations = UpdateDestinations::<HostBackend>::new();
        destinations.insert("a", &mut first);
        destinations.insert("a", &mut second);
        assert_eq!(destinations.len(), 1);

        let ordered = destinations
            .ordered(&[("a".to_string(), ScalarType::F32)])
            .unwrap();
        assert_eq!(ordered[0].len(), 3);
    }
}
