// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-step gathering of upstream values into a component's dense input buffers.
//!
//! Every source is checked before the first copy of a step is issued, so a
//! length or type mismatch never leaves the inputs half refreshed.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::backend::{Backend, DeviceBuffer};
use crate::types::{KernelError, Result, ScalarType};

/// Upstream buffer maintained by the surrounding scheduler
pub type SharedBuffer<B> = Arc<RwLock<<B as Backend>::Buffer>>;

/// Wrap a device buffer for sharing between a producer and its readers
pub fn shared<B: Backend>(buffer: B::Buffer) -> SharedBuffer<B> {
    Arc::new(RwLock::new(buffer))
}

struct Source<B: Backend> {
    access: String,
    buffer: SharedBuffer<B>,
    expected: ScalarType,
}

/// Copies one upstream buffer per access into the matching input buffer
pub struct BufferRetriever<B: Backend> {
    sources: Vec<Source<B>>,
    num_comps: usize,
}

impl<B: Backend> BufferRetriever<B> {
    /// `sources` in access declaration order. Element types are pinned here.
    pub fn new(sources: Vec<(String, SharedBuffer<B>)>, num_comps: usize) -> Self {
        let sources = sources
            .into_iter()
            .map(|(access, buffer)| {
                let expected = buffer.read().scalar_type();
                Source {
                    access,
                    buffer,
                    expected,
                }
            })
            .collect();
        Self { sources, num_comps }
    }

    pub fn accesses(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.access.as_str())
    }

    pub fn num_comps(&self) -> usize {
        self.num_comps
    }

    /// Enqueue one copy per access on `stream`, in declaration order
    pub fn retrieve(
        &self,
        backend: &B,
        inputs: &mut [B::Buffer],
        stream: &mut B::Stream,
    ) -> Result<()> {
        if inputs.len() != self.sources.len() {
            return Err(KernelError::InvalidSpec(format!(
                "{} input buffers for {} accesses",
                inputs.len(),
                self.sources.len()
            )));
        }

        // the same upstream buffer may back several accesses
        let guards: Vec<_> = self
            .sources
            .iter()
            .map(|s| s.buffer.read_recursive())
            .collect();

        for (source, guard) in self.sources.iter().zip(&guards) {
            if guard.len() != self.num_comps {
                return Err(KernelError::BufferLengthMismatch {
                    access: source.access.clone(),
                    expected: self.num_comps,
                    actual: guard.len(),
                });
            }
            if guard.scalar_type() != source.expected {
                return Err(KernelError::BufferTypeMismatch {
                    access: source.access.clone(),
                    expected: source.expected,
                    actual: guard.scalar_type(),
                });
            }
        }

        for ((source, guard), input) in self.sources.iter().zip(&guards).zip(inputs.iter_mut()) {
            backend.copy_async(guard, input, stream)?;
            trace!(target: "nd-kernel", "[RETRIEVE] {} ({} x {})", source.access, self.num_comps, source.expected);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HostBackend, HostBuffer, StreamOp};
    use crate::types::HostArray;

    fn host(values: Vec<f32>) -> SharedBuffer<HostBackend> {
        shared::<HostBackend>(HostBuffer::from(HostArray::from(values)))
    }

    #[test]
    fn test_retrieve_copies_in_declaration_order() {
        let backend = HostBackend::with_multiprocessors(1);
        let v = host(vec![1.0, 2.0]);
        let vd = host(vec![3.0, 4.0]);
        let retriever = BufferRetriever::new(vec![("V".into(), v), ("Vd".into(), vd)], 2);
        let mut inputs = vec![
            backend.alloc_zeros(ScalarType::F32, 2).unwrap(),
            backend.alloc_zeros(ScalarType::F32, 2).unwrap(),
        ];
        let mut stream = backend.create_stream().unwrap();

        retriever.retrieve(&backend, &mut inputs, &mut stream).unwrap();

        assert_eq!(inputs[0].as_array().to_f64_vec(), vec![1.0, 2.0]);
        assert_eq!(inputs[1].as_array().to_f64_vec(), vec![3.0, 4.0]);
        assert_eq!(stream.ops().len(), 2);
        assert!(matches!(stream.ops()[0], StreamOp::Copy { len: 2, .. }));
        assert_eq!(retriever.accesses().collect::<Vec<_>>(), vec!["V", "Vd"]);
    }

    #[test]
    fn test_length_mismatch_issues_nothing() {
        let backend = HostBackend::with_multiprocessors(1);
        let good = host(vec![1.0, 2.0]);
        let short = host(vec![1.0, 2.0]);
        let retriever = BufferRetriever::new(
            vec![("V".into(), good), ("Vd".into(), Arc::clone(&short))],
            2,
        );
        *short.write() = HostBuffer::from(HostArray::from(vec![1.0f32]));

        let mut inputs = vec![
            backend.alloc_zeros(ScalarType::F32, 2).unwrap(),
            backend.alloc_zeros(ScalarType::F32, 2).unwrap(),
        ];
        let mut stream = backend.create_stream().unwrap();

        match retriever.retrieve(&backend, &mut inputs, &mut stream) {
            Err(KernelError::BufferLengthMismatch {
                access,
                expected,
                actual,
            }) => {
                assert_eq!(access, "Vd");
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }
        assert!(stream.ops().is_empty());
    }

    #[test]
    fn test_type_change_is_rejected() {
        let backend = HostBackend::with_multiprocessors(1);
        let v = host(vec![1.0, 2.0]);
        let retriever = BufferRetriever::new(vec![("V".into(), Arc::clone(&v))], 2);
        *v.write() = HostBuffer::from(HostArray::from(vec![1.0f64, 2.0]));

        let mut inputs = vec![backend.alloc_zeros(ScalarType::F32, 2).unwrap()];
        let mut stream = backend.create_stream().unwrap();
        assert!(matches!(
            retriever.retrieve(&backend, &mut inputs, &mut stream),
            Err(KernelError::BufferTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_one_upstream_may_back_two_accesses() {
        let backend = HostBackend::with_multiprocessors(1);
        let both = host(vec![5.0, 6.0]);
        let retriever = BufferRetriever::new(
            vec![("V".into(), Arc::clone(&both)), ("Vd".into(), both)],
            2,
        );
        let mut inputs = vec![
            backend.alloc_zeros(ScalarType::F32, 2).unwrap(),
            backend.alloc_zeros(ScalarType::F32, 2).unwrap(),
        ];
        let mut stream = backend.create_stream().unwrap();
        retriever.retrieve(&backend, &mut inputs, &mut stream).unwrap();
        assert_eq!(inputs[1].as_array().to_f64_vec(), vec![5.0, 6.0]);
    }
}
