//! Command encoding, submission and readback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wgpu::BindGroup;

use crate::buffer::{self, DeviceBuffer, OperandBuffers};
use crate::config::PipelineConfig;
use crate::context::WgpuContext;
use crate::error::{Error, Result};
use crate::kernel::{KernelPipeline, WORKGROUP_SIZE};

/// Work-groups needed to cover `len` elements.
pub fn workgroup_count(len: u32) -> u32 {
    len.div_ceil(WORKGROUP_SIZE)
}

/// Run `pipeline` over every element of `buffers` and return the result.
pub async fn dispatch(
    ctx: &WgpuContext,
    pipeline: &KernelPipeline,
    bind_group: &BindGroup,
    buffers: &OperandBuffers,
    config: &PipelineConfig,
) -> Result<Vec<u32>> {
    let workgroups = workgroup_count(buffers.len());
    dispatch_with_count(ctx, pipeline, bind_group, buffers, workgroups, config).await
}

/// Like [`dispatch`] but with an explicit work-group count, which may exceed
/// what the element count needs.
pub async fn dispatch_with_count(
    ctx: &WgpuContext,
    pipeline: &KernelPipeline,
    bind_group: &BindGroup,
    buffers: &OperandBuffers,
    workgroups: u32,
    config: &PipelineConfig,
) -> Result<Vec<u32>> {
    if let Some(reason) = ctx.lost_reason() {
        return Err(Error::DeviceLost(reason));
    }

    let limit = ctx.limits().max_compute_workgroups_per_dimension;
    if workgroups > limit {
        return Err(Error::DispatchTooLarge {
            requested: workgroups,
            limit,
        });
    }

    let readback = buffer::create_readback_buffer(ctx, buffers.len()).await?;

    ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Vecmul Encoder"),
        });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(pipeline.entry_point()),
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups, 1, 1);
    }
    // Same encoder as the pass, so the copy observes the kernel's writes.
    encoder.copy_buffer_to_buffer(
        buffers.output.buffer(),
        0,
        readback.buffer(),
        0,
        buffers.output.size_in_bytes(),
    );
    ctx.queue.submit(Some(encoder.finish()));
    if let Some(err) = ctx.device.pop_error_scope().await {
        return Err(Error::Validation(err.to_string()));
    }
    log::debug!(
        "submitted {} work-group(s) for {} element(s)",
        workgroups,
        buffers.len()
    );

    read_back(ctx, &readback, config).await
}

/// Map `readback` and copy its logical contents out.
///
/// This is the only point where a run yields. A mapped buffer is unmapped
/// before returning; on the failure paths the buffer is destroyed when
/// `readback` drops.
async fn read_back(
    ctx: &WgpuContext,
    readback: &DeviceBuffer,
    config: &PipelineConfig,
) -> Result<Vec<u32>> {
    let slice = readback.buffer().slice(..);
    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    let mapped = Arc::new(AtomicBool::new(false));
    let mapped_flag = mapped.clone();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        mapped_flag.store(true, Ordering::Release);
        let _ = tx.send(result);
    });

    wait_for_map(ctx, &mapped, config)?;

    match rx.receive().await {
        Some(result) => result?,
        None => return Err(Error::DeviceLost("map callback dropped".into())),
    }

    let values = {
        let view = slice.get_mapped_range();
        let elements: &[u32] = bytemuck::cast_slice(&view);
        elements[..readback.len() as usize].to_vec()
    };
    readback.buffer().unmap();
    Ok(values)
}

/// Drive the device until `mapped` is set.
///
/// Fails with [`Error::DeviceLost`] once the device-lost callback has fired
/// and with [`Error::ReadbackTimeout`] after `config.readback_timeout()`.
#[cfg(not(target_arch = "wasm32"))]
pub fn wait_for_map(
    ctx: &WgpuContext,
    mapped: &AtomicBool,
    config: &PipelineConfig,
) -> Result<()> {
    let timeout = config.readback_timeout();
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let _ = ctx.device.poll(wgpu::Maintain::Poll);
        if let Some(reason) = ctx.lost_reason() {
            return Err(Error::DeviceLost(reason));
        }
        if mapped.load(Ordering::Acquire) {
            return Ok(());
        }
        if std::time::Instant::now() >= deadline {
            return Err(Error::ReadbackTimeout(timeout));
        }
        std::thread::sleep(config.poll_interval());
    }
}

// The browser resolves the map on its own event loop; blocking here would
// keep the callback from ever running, so the receiver is awaited directly.
#[cfg(target_arch = "wasm32")]
pub fn wait_for_map(
    ctx: &WgpuContext,
    _mapped: &AtomicBool,
    _config: &PipelineConfig,
) -> Result<()> {
    match ctx.lost_reason() {
        Some(reason) => Err(Error::DeviceLost(reason)),
        None => Ok(()),
    }
}
