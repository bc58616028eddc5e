//! Device buffers for the two operands, the result and the readback copy.
//!
//! All sizes at this boundary are element counts of `u32`. Byte sizes are
//! derived here and nowhere else.

use wgpu::{Buffer, BufferDescriptor, BufferUsages};

use crate::context::WgpuContext;
use crate::error::{Error, Result};

/// Width of one element in bytes.
pub const ELEMENT_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// Byte size backing `len` elements.
///
/// wgpu cannot map or bind an empty range, so an empty buffer still gets one
/// element of backing store. The kernel never reads it because nothing is
/// dispatched for an empty run.
pub fn byte_size(len: u32) -> u64 {
    u64::from(len.max(1)) * ELEMENT_SIZE
}

/// A device allocation that is destroyed when dropped.
#[derive(Debug)]
pub struct DeviceBuffer {
    buffer: Buffer,
    len: u32,
}

impl DeviceBuffer {
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Logical element count.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn usage(&self) -> BufferUsages {
        self.buffer.usage()
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.buffer.size()
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

fn check_binding_limit(ctx: &WgpuContext, len: u32) -> Result<u64> {
    let requested = byte_size(len);
    let limit = u64::from(ctx.limits().max_storage_buffer_binding_size);
    if requested > limit {
        return Err(Error::BufferTooLarge { requested, limit });
    }
    Ok(requested)
}

async fn allocate(
    ctx: &WgpuContext,
    label: &str,
    len: u32,
    usage: BufferUsages,
    mapped_at_creation: bool,
) -> Result<DeviceBuffer> {
    let size = check_binding_limit(ctx, len)?;

    ctx.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let buffer = ctx.device.create_buffer(&BufferDescriptor {
        label: Some(label),
        size,
        usage,
        mapped_at_creation,
    });
    if let Some(err) = ctx.device.pop_error_scope().await {
        return Err(Error::OutOfMemory(err.to_string()));
    }

    log::debug!("allocated {} ({} bytes, {:?})", label, size, usage);
    Ok(DeviceBuffer { buffer, len })
}

/// Create a read-only storage buffer of `len` elements, filling element `i`
/// with `fill(i)` while the buffer is still mapped from creation.
pub async fn create_input_buffer<F>(
    ctx: &WgpuContext,
    label: &str,
    len: u32,
    fill: F,
) -> Result<DeviceBuffer>
where
    F: Fn(u32) -> u32,
{
    let input = allocate(ctx, label, len, BufferUsages::STORAGE, true).await?;
    {
        let mut view = input.buffer.slice(..).get_mapped_range_mut();
        let elements: &mut [u32] = bytemuck::cast_slice_mut(&mut view[..]);
        for (i, slot) in elements.iter_mut().take(len as usize).enumerate() {
            *slot = fill(i as u32);
        }
    }
    // Host write access ends here.
    input.buffer.unmap();
    Ok(input)
}

/// Element count of a host slice, or [`Error::BufferTooLarge`] when it does
/// not fit in `u32`.
pub fn checked_len(len: usize, limit: u64) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::BufferTooLarge {
        requested: (len as u64).saturating_mul(ELEMENT_SIZE),
        limit,
    })
}

fn slice_len(ctx: &WgpuContext, len: usize) -> Result<u32> {
    checked_len(len, u64::from(ctx.limits().max_storage_buffer_binding_size))
}

/// Create an input buffer holding a copy of `data`.
pub async fn create_input_buffer_from_slice(
    ctx: &WgpuContext,
    label: &str,
    data: &[u32],
) -> Result<DeviceBuffer> {
    let len = slice_len(ctx, data.len())?;
    create_input_buffer(ctx, label, len, |i| data[i as usize]).await
}

/// Device-only read-write storage that can be copied out.
pub async fn create_output_buffer(ctx: &WgpuContext, len: u32) -> Result<DeviceBuffer> {
    allocate(
        ctx,
        "Output",
        len,
        BufferUsages::STORAGE | BufferUsages::COPY_SRC,
        false,
    )
    .await
}

/// Host-mappable copy destination. Not bindable to the kernel.
pub async fn create_readback_buffer(ctx: &WgpuContext, len: u32) -> Result<DeviceBuffer> {
    allocate(
        ctx,
        "Readback",
        len,
        BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        false,
    )
    .await
}

/// Reject operands whose element counts differ.
pub fn check_operand_lengths(a: u32, b: u32) -> Result<u32> {
    if a != b {
        return Err(Error::SizeMismatch { a, b });
    }
    Ok(a)
}

/// The three buffers bound to the kernel, with equal lengths guaranteed.
#[derive(Debug)]
pub struct OperandBuffers {
    pub input_a: DeviceBuffer,
    pub input_b: DeviceBuffer,
    pub output: DeviceBuffer,
}

impl OperandBuffers {
    /// Pair up two input buffers and allocate a matching output.
    pub async fn new(
        ctx: &WgpuContext,
        input_a: DeviceBuffer,
        input_b: DeviceBuffer,
    ) -> Result<Self> {
        let len = check_operand_lengths(input_a.len(), input_b.len())?;
        let output = create_output_buffer(ctx, len).await?;
        Ok(Self {
            input_a,
            input_b,
            output,
        })
    }

    /// Upload both host slices and allocate the output.
    pub async fn from_slices(ctx: &WgpuContext, a: &[u32], b: &[u32]) -> Result<Self> {
        check_operand_lengths(slice_len(ctx, a.len())?, slice_len(ctx, b.len())?)?;
        let input_a = create_input_buffer_from_slice(ctx, "InputA", a).await?;
        let input_b = create_input_buffer_from_slice(ctx, "InputB", b).await?;
        Self::new(ctx, input_a, input_b).await
    }

    /// Element count shared by all three buffers.
    pub fn len(&self) -> u32 {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }
}
