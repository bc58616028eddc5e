use vecmul_backend::{PipelineConfig, WgpuContext, WgpuProbe};

fn main() {
    env_logger::init();
    pollster::block_on(async {
        println!("Acquiring GPU device...");
        match WgpuContext::acquire(&WgpuProbe, &PipelineConfig::default()).await {
            Ok(ctx) => {
                println!("Device ready: {}", ctx.adapter_info());
                let limits = ctx.limits();
                println!(
                    "Max storage binding: {} bytes, max work-groups per dimension: {}",
                    limits.max_storage_buffer_binding_size,
                    limits.max_compute_workgroups_per_dimension
                );
            }
            Err(e) => println!("No device: {}", e),
        }
    });
}
