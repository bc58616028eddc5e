//! End-to-end runs: acquire, upload, bind, dispatch, read back.

use std::fmt;

use crate::buffer::{self, OperandBuffers};
use crate::config::PipelineConfig;
use crate::context::WgpuContext;
use crate::dispatch;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelPipeline};
use crate::probe::CapabilityProbe;

/// Why a run ended without a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unsupported(String),
    NoAdapter,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unsupported(reason) => write!(
                f,
                "GPU compute is not supported ({}). Install a Vulkan, Metal or DX12 capable driver.",
                reason
            ),
            SkipReason::NoAdapter => write!(f, "Failed to get GPU adapter."),
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(Vec<u32>),
    /// The host can't run the pipeline; one warning has been logged.
    Skipped(SkipReason),
}

impl Outcome {
    pub fn into_values(self) -> Option<Vec<u32>> {
        match self {
            Outcome::Completed(values) => Some(values),
            Outcome::Skipped(_) => None,
        }
    }
}

/// Multiply `[0, 1, .., len)` by itself elementwise on a freshly acquired
/// device.
///
/// `len` is an element count. A host without GPU compute, or without an
/// adapter matching `config`, yields [`Outcome::Skipped`] after logging one
/// warning; every other failure is returned as an error.
///
/// The kernel runs one element per work-group, so `len` may not exceed the
/// device's `max_compute_workgroups_per_dimension` (65535 on most adapters);
/// larger requests fail with [`Error::DispatchTooLarge`].
pub async fn run_vector_multiply(
    probe: &dyn CapabilityProbe,
    config: &PipelineConfig,
    len: u32,
) -> Result<Outcome> {
    let ctx = match WgpuContext::acquire(probe, config).await {
        Ok(ctx) => ctx,
        Err(Error::Unsupported(reason)) => return Ok(skip(SkipReason::Unsupported(reason))),
        Err(Error::NoAdapter) => return Ok(skip(SkipReason::NoAdapter)),
        Err(e) => return Err(e),
    };

    let values = run_with_fill(&ctx, config, len, |i| i, |i| i).await?;
    Ok(Outcome::Completed(values))
}

fn skip(reason: SkipReason) -> Outcome {
    log::warn!("{}", reason);
    Outcome::Skipped(reason)
}

/// Multiply two generated operands of `len` elements each.
pub async fn run_with_fill<FA, FB>(
    ctx: &WgpuContext,
    config: &PipelineConfig,
    len: u32,
    fill_a: FA,
    fill_b: FB,
) -> Result<Vec<u32>>
where
    FA: Fn(u32) -> u32,
    FB: Fn(u32) -> u32,
{
    let input_a = buffer::create_input_buffer(ctx, "InputA", len, fill_a).await?;
    let input_b = buffer::create_input_buffer(ctx, "InputB", len, fill_b).await?;
    let buffers = OperandBuffers::new(ctx, input_a, input_b).await?;
    execute(ctx, config, Kernel::Multiply, &buffers).await
}

/// Multiply two host slices elementwise. Products wrap on overflow.
pub async fn run_with_inputs(
    ctx: &WgpuContext,
    config: &PipelineConfig,
    a: &[u32],
    b: &[u32],
) -> Result<Vec<u32>> {
    let buffers = OperandBuffers::from_slices(ctx, a, b).await?;
    execute(ctx, config, Kernel::Multiply, &buffers).await
}

/// Upload `data` as operand A and return what the kernel read from it.
pub async fn verify_upload(
    ctx: &WgpuContext,
    config: &PipelineConfig,
    data: &[u32],
) -> Result<Vec<u32>> {
    let buffers = OperandBuffers::from_slices(ctx, data, data).await?;
    execute(ctx, config, Kernel::EchoFirst, &buffers).await
}

/// Compile `kernel`, bind `buffers` and dispatch once.
pub async fn execute(
    ctx: &WgpuContext,
    config: &PipelineConfig,
    kernel: Kernel,
    buffers: &OperandBuffers,
) -> Result<Vec<u32>> {
    let pipeline = KernelPipeline::new(ctx, kernel).await?;
    let bind_group = pipeline.bind(ctx, buffers).await?;
    dispatch::dispatch(ctx, &pipeline, &bind_group, buffers, config).await
}
