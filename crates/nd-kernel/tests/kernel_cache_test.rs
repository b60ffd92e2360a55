// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Kernel Cache Tests
//!
//! Components that share a cache compile each (model, type signature,
//! options) combination once, while geometry stays per component.

use std::sync::Arc;

use ahash::AHashMap;
use nd_kernel::*;

fn rotn_component(
    backend: &Arc<HostBackend>,
    cache: &Arc<KernelCache<HostBackend>>,
    weight: HostArray,
    access: HostArray,
) -> Result<SynapseComponent<HostBackend>> {
    let params = AHashMap::from_iter([("weight".to_string(), RawArray::from(weight))]);
    let accesses = AHashMap::from_iter([
        (
            "V".to_string(),
            shared::<HostBackend>(HostBuffer::from(access.clone())),
        ),
        (
            "Vd".to_string(),
            shared::<HostBackend>(HostBuffer::from(access)),
        ),
    ]);
    SynapseComponent::with_cache(
        Arc::new(RotN),
        Arc::clone(backend),
        params,
        accesses,
        1e-4,
        ComponentOptions::default(),
        Arc::clone(cache),
    )
}

#[test]
fn test_same_signature_compiles_once() {
    let backend = Arc::new(HostBackend::with_multiprocessors(2));
    let cache = Arc::new(KernelCache::new());

    let small = rotn_component(
        &backend,
        &cache,
        HostArray::from(vec![1.0f32; 3]),
        HostArray::from(vec![2.0f32; 3]),
    )
    .unwrap();
    let large = rotn_component(
        &backend,
        &cache,
        HostArray::from(vec![1.0f32; 10_000]),
        HostArray::from(vec![2.0f32; 10_000]),
    )
    .unwrap();

    assert_eq!(
        cache.stats(),
        CacheStats {
            compilations: 1,
            hits: 1
        }
    );
    assert_eq!(cache.len(), 1);

    // one program, two geometries
    assert!(Arc::ptr_eq(
        small.compiled_kernel().program(),
        large.compiled_kernel().program()
    ));
    assert_eq!(small.compiled_kernel().geometry().grid_size, 1);
    assert_eq!(large.compiled_kernel().geometry().grid_size, 12);
}

#[test]
fn test_distinct_signatures_compile_separately() {
    let backend = Arc::new(HostBackend::with_multiprocessors(1));
    let cache = Arc::new(KernelCache::new());

    let single = rotn_component(
        &backend,
        &cache,
        HostArray::from(vec![1.0f32]),
        HostArray::from(vec![1.0f32]),
    )
    .unwrap();
    let double = rotn_component(
        &backend,
        &cache,
        HostArray::from(vec![1.0f64]),
        HostArray::from(vec![1.0f64]),
    )
    .unwrap();
    let mixed = rotn_component(
        &backend,
        &cache,
        HostArray::from(vec![1.0f32]),
        HostArray::from(vec![1.0f64]),
    )
    .unwrap();

    assert_eq!(cache.stats().compilations, 3);
    assert_eq!(cache.stats().hits, 0);

    assert_eq!(single.compiled_kernel().args().to_string(), "ifiPPPP");
    assert_eq!(double.compiled_kernel().args().to_string(), "idiPPPP");
    assert_eq!(mixed.compiled_kernel().args().to_string(), "ifiPPPP");
    let source = mixed.compiled_kernel().source();
    assert!(source.contains("double* g_V, double* g_Vd"));
    assert!(source.contains("float* g_weight, float* g_I"));
}

#[test]
fn test_failed_construction_is_not_cached() {
    let backend = Arc::new(HostBackend::with_multiprocessors(1));
    let cache = Arc::new(KernelCache::new());

    let mismatched = rotn_component(
        &backend,
        &cache,
        HostArray::from(Vec::<f32>::new()),
        HostArray::from(Vec::<f32>::new()),
    );
    assert!(mismatched.is_err());
    assert!(cache.is_empty());
    assert_eq!(cache.stats(), CacheStats::default());
}

#[test]
fn test_concurrent_construction_compiles_once() {
    let backend = Arc::new(HostBackend::with_multiprocessors(4));
    let cache = Arc::new(KernelCache::new());

    std::thread::scope(|scope| {
        for n in 1..=8usize {
            let backend = &backend;
            let cache = &cache;
            scope.spawn(move || {
                rotn_component(
                    backend,
                    cache,
                    HostArray::from(vec![1u32; n]),
                    HostArray::from(vec![2u32; n]),
                )
                .unwrap()
            });
        }
    });

    let stats = cache.stats();
    assert_eq!(stats.compilations, 1);
    assert_eq!(stats.hits, 7);
}

#[test]
fn test_cleared_cache_keeps_live_programs() {
    let backend = Arc::new(HostBackend::with_multiprocessors(1));
    let cache = Arc::new(KernelCache::new());

    let mut component = rotn_component(
        &backend,
        &cache,
        HostArray::from(vec![3i64, 4]),
        HostArray::from(vec![5i64, 6]),
    )
    .unwrap();
    cache.clear();
    assert!(cache.is_empty());

    let mut output = HostBuffer::from(HostArray::zeros(ScalarType::I64, 2));
    let mut stream = HostStream::new();
    let mut destinations = UpdateDestinations::<HostBackend>::new().with("I", &mut output);
    component.run_step(&mut destinations, &mut stream).unwrap();
    drop(destinations);
    assert_eq!(output.as_array(), &HostArray::from(vec![75i64, 144]));
}
