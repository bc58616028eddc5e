use vecmul_backend::{run_with_inputs, verify_upload, PipelineConfig, WgpuContext, WgpuProbe};

fn main() {
    env_logger::init();
    pollster::block_on(async {
        let config = PipelineConfig::default();
        let ctx = match WgpuContext::acquire(&WgpuProbe, &config).await {
            Ok(ctx) => ctx,
            Err(e) => {
                println!("No device: {}", e);
                return;
            }
        };

        let a = vec![1, 2, 3, 4];
        let b = vec![5, 6, 7, 8];

        println!("Checking upload...");
        let seen = verify_upload(&ctx, &config, &a).await.unwrap();
        assert_eq!(seen, a);

        println!("Executing A * B...");
        let result = run_with_inputs(&ctx, &config, &a, &b).await.unwrap();
        println!("Result: {:?}", result);

        // 1*5=5, 2*6=12, 3*7=21, 4*8=32
        assert_eq!(result, vec![5, 12, 21, 32]);
        println!("Verification Successful!");
    });
}
