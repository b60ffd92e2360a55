// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * CUDA Backend Correctness Validation
 *
 * Runs the same RotN components on the host and on the GPU and compares the
 * downloaded updates. Skips quietly on machines without a CUDA device.
 */

#[cfg(all(test, feature = "cuda"))]
mod cuda_correctness_tests {
    use std::sync::Arc;

    use ahash::AHashMap;
    use nd_kernel::*;

    fn run_rotn<B: Backend>(
        backend: Arc<B>,
        v: &HostArray,
        vd: &HostArray,
        weight: &HostArray,
    ) -> HostArray {
        let v_buf = shared::<B>(backend.upload(v).unwrap());
        let vd_buf = shared::<B>(backend.upload(vd).unwrap());

        let mut component = SynapseComponent::new(
            Arc::new(RotN),
            Arc::clone(&backend),
            AHashMap::from_iter([("weight".to_string(), RawArray::from(weight.clone()))]),
            AHashMap::from_iter([("V".to_string(), v_buf), ("Vd".to_string(), vd_buf)]),
            1e-4,
            ComponentOptions {
                compile_diagnostics: true,
                ..Default::default()
            },
        )
        .unwrap();

        let ty = component.spec().type_of("I").unwrap();
        let mut output = backend.alloc_zeros(ty, component.num_comps()).unwrap();
        let mut stream = backend.create_stream().unwrap();
        let mut destinations = UpdateDestinations::<B>::new().with("I", &mut output);
        component.run_step(&mut destinations, &mut stream).unwrap();
        drop(destinations);
        backend.synchronize(&mut stream).unwrap();
        backend.download(&output).unwrap()
    }

    #[test]
    fn test_cuda_matches_host_for_rotn() {
        if !is_cuda_available() {
            println!("⚠️  CUDA not available, skipping test");
            return;
        }
        let gpu = Arc::new(CudaBackend::new(0).unwrap());
        let host = Arc::new(HostBackend::new());

        for n in [3usize, 257, 100_000] {
            let v = HostArray::from((0..n).map(|i| (i % 17) as f32 * 0.25).collect::<Vec<_>>());
            let vd = HostArray::from((0..n).map(|i| 1.0 - (i % 5) as f32).collect::<Vec<_>>());
            let w = HostArray::from(vec![0.5f32; n]);

            let expected = run_rotn(Arc::clone(&host), &v, &vd, &w);
            let actual = run_rotn(Arc::clone(&gpu), &v, &vd, &w);
            assert_eq!(actual, expected, "n={}", n);
        }
    }

    #[test]
    fn test_cuda_three_instance_scenario() {
        if !is_cuda_available() {
            println!("⚠️  CUDA not available, skipping test");
            return;
        }
        let gpu = Arc::new(CudaBackend::new(0).unwrap());
        let out = run_rotn(
            gpu,
            &HostArray::from(vec![1.0f64, 2.0, 3.0]),
            &HostArray::from(vec![4.0f64, 5.0, 6.0]),
            &HostArray::from(vec![1.0f64, 1.0, 1.0]),
        );
        assert_eq!(out, HostArray::from(vec![4.0f64, 10.0, 18.0]));
    }

    #[test]
    fn test_cuda_integer_kernel() {
        if !is_cuda_available() {
            println!("⚠️  CUDA not available, skipping test");
            return;
        }
        let gpu = Arc::new(CudaBackend::new(0).unwrap());
        let out = run_rotn(
            gpu,
            &HostArray::from(vec![2i32, -3, 7]),
            &HostArray::from(vec![5i32, 5, 5]),
            &HostArray::from(vec![1i32, 2, 3]),
        );
        assert_eq!(out, HostArray::from(vec![10i32, -30, 105]));
    }
}
