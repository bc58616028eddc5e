//! Pipeline tests against a real adapter.
//!
//! Hosts without a GPU (or a software adapter) skip the device-backed tests.

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use vecmul_backend::buffer::{self, OperandBuffers};
    use vecmul_backend::dispatch;
    use vecmul_backend::kernel::{self, Kernel, KernelPipeline, BINDING_LAYOUT};
    use vecmul_backend::{
        run_vector_multiply, run_with_fill, run_with_inputs, verify_upload, Error, NoBackendProbe,
        Outcome, PipelineConfig, SkipReason, UnsupportedProbe, WgpuContext, WgpuProbe,
    };

    fn setup() -> Option<(WgpuContext, PipelineConfig)> {
        let _ = env_logger::builder().is_test(true).try_init();
        let config = PipelineConfig::default();
        match pollster::block_on(WgpuContext::acquire(&WgpuProbe, &config)) {
            Ok(ctx) => Some((ctx, config)),
            Err(e) => {
                eprintln!("skipping: {}", e);
                None
            }
        }
    }

    #[test]
    fn test_multiply_four_elements() {
        let Some((ctx, config)) = setup() else { return };
        let result = pollster::block_on(run_with_fill(&ctx, &config, 4, |i| i, |i| i)).unwrap();
        assert_eq!(result, vec![0, 1, 4, 9]);
    }

    #[test]
    fn test_multiply_distinct_fillers() {
        let Some((ctx, config)) = setup() else { return };
        let len = 1000;
        let fa = |i: u32| i + 3;
        let fb = |i: u32| 2 * i + 1;
        let result = pollster::block_on(run_with_fill(&ctx, &config, len, fa, fb)).unwrap();

        assert_eq!(result.len(), len as usize);
        for (i, value) in result.iter().enumerate() {
            let i = i as u32;
            assert_eq!(*value, fa(i).wrapping_mul(fb(i)), "mismatch at {}", i);
        }
    }

    #[test]
    fn test_products_wrap_like_u32() {
        let Some((ctx, config)) = setup() else { return };
        let a = [u32::MAX, 1 << 16, 7];
        let b = [2, 1 << 16, 6];
        let result = pollster::block_on(run_with_inputs(&ctx, &config, &a, &b)).unwrap();
        assert_eq!(result, vec![u32::MAX.wrapping_mul(2), 0, 42]);
    }

    #[test]
    fn test_empty_input_returns_empty() {
        let Some((ctx, config)) = setup() else { return };
        let result = pollster::block_on(run_with_fill(&ctx, &config, 0, |i| i, |i| i)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_over_provisioned_dispatch_stays_in_bounds() {
        let Some((ctx, config)) = setup() else { return };
        pollster::block_on(async {
            let buffers = OperandBuffers::from_slices(&ctx, &[1, 2, 3, 4], &[5, 6, 7, 8])
                .await
                .unwrap();
            let pipeline = KernelPipeline::new(&ctx, Kernel::Multiply).await.unwrap();
            let bind_group = pipeline.bind(&ctx, &buffers).await.unwrap();

            let workgroups = dispatch::workgroup_count(buffers.len()) * 16;
            let result = dispatch::dispatch_with_count(
                &ctx,
                &pipeline,
                &bind_group,
                &buffers,
                workgroups,
                &config,
            )
            .await
            .unwrap();

            assert_eq!(result, vec![5, 12, 21, 32]);
        });
    }

    #[test]
    fn test_mismatched_operands_rejected() {
        let Some((ctx, config)) = setup() else { return };
        let err = pollster::block_on(run_with_inputs(&ctx, &config, &[1, 2, 3], &[1, 2]))
            .unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { a: 3, b: 2 }));
    }

    #[test]
    fn test_mismatched_device_buffers_rejected() {
        let Some((ctx, _config)) = setup() else { return };
        pollster::block_on(async {
            let a = buffer::create_input_buffer(&ctx, "InputA", 8, |i| i).await.unwrap();
            let b = buffer::create_input_buffer(&ctx, "InputB", 5, |i| i).await.unwrap();
            let err = OperandBuffers::new(&ctx, a, b).await.unwrap_err();
            assert!(matches!(err, Error::SizeMismatch { a: 8, b: 5 }));
        });
    }

    #[test]
    fn test_upload_round_trip() {
        let Some((ctx, config)) = setup() else { return };
        let data: Vec<u32> = (0..257).collect();
        let seen = pollster::block_on(verify_upload(&ctx, &config, &data)).unwrap();
        assert_eq!(seen, data);
    }

    #[test]
    fn test_repeated_runs_match() {
        let Some((ctx, config)) = setup() else { return };
        let first = pollster::block_on(run_with_fill(&ctx, &config, 64, |i| i, |i| i + 1)).unwrap();
        let second =
            pollster::block_on(run_with_fill(&ctx, &config, 64, |i| i, |i| i + 1)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_full_run_is_idempotent() {
        let config = PipelineConfig::default();
        let first = pollster::block_on(run_vector_multiply(&WgpuProbe, &config, 16)).unwrap();
        let second = pollster::block_on(run_vector_multiply(&WgpuProbe, &config, 16)).unwrap();
        assert_eq!(first, second);
        if let Outcome::Completed(values) = first {
            let expected: Vec<u32> = (0..16).map(|i| i * i).collect();
            assert_eq!(values, expected);
        }
    }

    #[test]
    fn test_bad_kernel_source_is_compile_error() {
        let Some((ctx, _config)) = setup() else { return };
        let source = "@compute @workgroup_size(1) fn main() { let x: u32 = ; }";
        let err = pollster::block_on(kernel::build_pipeline(
            &ctx,
            source,
            "main",
            &BINDING_LAYOUT,
        ))
        .unwrap_err();
        assert!(matches!(err, Error::KernelCompile(_)));
    }

    #[test]
    fn test_missing_entry_point_is_compile_error() {
        let Some((ctx, _config)) = setup() else { return };
        let err = pollster::block_on(kernel::build_pipeline(
            &ctx,
            kernel::KERNELS_WGSL,
            "does_not_exist",
            &BINDING_LAYOUT,
        ))
        .unwrap_err();
        assert!(matches!(err, Error::KernelCompile(_)));
    }

    #[test]
    fn test_dispatch_over_device_limit_rejected() {
        let Some((ctx, config)) = setup() else { return };
        pollster::block_on(async {
            let buffers = OperandBuffers::from_slices(&ctx, &[1], &[1]).await.unwrap();
            let pipeline = KernelPipeline::new(&ctx, Kernel::Multiply).await.unwrap();
            let bind_group = pipeline.bind(&ctx, &buffers).await.unwrap();
            let limit = ctx.limits().max_compute_workgroups_per_dimension;

            let err = dispatch::dispatch_with_count(
                &ctx,
                &pipeline,
                &bind_group,
                &buffers,
                limit + 1,
                &config,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, Error::DispatchTooLarge { .. }));
        });
    }

    #[test]
    fn test_run_longer_than_workgroup_limit_rejected() {
        let Some((ctx, config)) = setup() else { return };
        let limit = ctx.limits().max_compute_workgroups_per_dimension;
        let err = pollster::block_on(run_with_fill(&ctx, &config, limit + 1, |i| i, |i| i))
            .unwrap_err();
        match err {
            Error::DispatchTooLarge { requested, limit: l } => {
                assert_eq!(requested, limit + 1);
                assert_eq!(l, limit);
            }
            // Adapters with a tiny binding limit refuse the buffers first.
            Error::BufferTooLarge { .. } => {}
            other => panic!("expected DispatchTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_unmapped_readback_times_out() {
        let Some((ctx, _)) = setup() else { return };
        let config = PipelineConfig {
            readback_timeout_ms: 20,
            ..Default::default()
        };
        let never_mapped = AtomicBool::new(false);
        let err = dispatch::wait_for_map(&ctx, &never_mapped, &config).unwrap_err();
        assert!(matches!(err, Error::ReadbackTimeout(t) if t.as_millis() == 20));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_destroyed_device_reports_lost() {
        let Some((ctx, config)) = setup() else { return };
        pollster::block_on(async {
            let buffers = OperandBuffers::from_slices(&ctx, &[1, 2], &[3, 4]).await.unwrap();
            let pipeline = KernelPipeline::new(&ctx, Kernel::Multiply).await.unwrap();
            let bind_group = pipeline.bind(&ctx, &buffers).await.unwrap();

            ctx.device.destroy();
            // Polling drives the lost callback; the flag is never set.
            let err = dispatch::wait_for_map(&ctx, &AtomicBool::new(false), &config).unwrap_err();
            assert!(matches!(err, Error::DeviceLost(_)), "got {:?}", err);
            assert!(ctx.lost_reason().is_some());

            let err = dispatch::dispatch(&ctx, &pipeline, &bind_group, &buffers, &config)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::DeviceLost(_)), "got {:?}", err);
        });
    }

    #[test]
    fn test_unsupported_host_is_skipped() {
        let probe = UnsupportedProbe {
            reason: "webgpu disabled".into(),
        };
        let outcome =
            pollster::block_on(run_vector_multiply(&probe, &PipelineConfig::default(), 4))
                .unwrap();
        assert_eq!(
            outcome,
            Outcome::Skipped(SkipReason::Unsupported("webgpu disabled".into()))
        );
    }

    #[test]
    fn test_no_adapter_is_skipped() {
        let outcome = pollster::block_on(run_vector_multiply(
            &NoBackendProbe,
            &PipelineConfig::default(),
            4,
        ))
        .unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::NoAdapter));
    }

    #[test]
    fn test_acquire_reports_typed_errors() {
        let config = PipelineConfig::default();
        let err = pollster::block_on(WgpuContext::acquire(&NoBackendProbe, &config)).unwrap_err();
        assert!(matches!(err, Error::NoAdapter));

        let probe = UnsupportedProbe {
            reason: "none".into(),
        };
        let err = pollster::block_on(WgpuContext::acquire(&probe, &config)).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
