//! Kernel compilation and binding.
//!
//! The binding contract between host and kernel lives in [`BINDING_LAYOUT`]:
//! slot 0 and 1 are read-only operands, slot 2 is the read-write result, all
//! visible to the compute stage only. The WGSL declarations in
//! `kernels.wgsl` must agree with it slot for slot.

use std::borrow::Cow;
use wgpu::{BindGroup, BindGroupLayout, ComputePipeline};

use crate::buffer::OperandBuffers;
use crate::context::WgpuContext;
use crate::error::{Error, Result};

pub const KERNELS_WGSL: &str = include_str!("kernels.wgsl");

/// Invocations per work-group, matching `@workgroup_size` in the WGSL.
pub const WORKGROUP_SIZE: u32 = 1;

/// Entry points compiled from [`KERNELS_WGSL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    /// `result[i] = a[i] * b[i]`
    Multiply,
    /// `result[i] = a[i]`, used to check what the device sees after upload.
    EchoFirst,
}

impl Kernel {
    pub fn entry_point(&self) -> &'static str {
        match self {
            Kernel::Multiply => "main",
            Kernel::EchoFirst => "echo_first",
        }
    }
}

/// How a kernel argument may be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// One (slot, access) pair of the binding layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSlot {
    pub binding: u32,
    pub access: Access,
}

/// Operand A, operand B, result.
pub const BINDING_LAYOUT: [BindingSlot; 3] = [
    BindingSlot {
        binding: 0,
        access: Access::ReadOnly,
    },
    BindingSlot {
        binding: 1,
        access: Access::ReadOnly,
    },
    BindingSlot {
        binding: 2,
        access: Access::ReadWrite,
    },
];

fn layout_entry(slot: &BindingSlot) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: slot.binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage {
                read_only: slot.access == Access::ReadOnly,
            },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// A compiled entry point together with the layout its bind groups must use.
#[derive(Debug)]
pub struct KernelPipeline {
    pub pipeline: ComputePipeline,
    pub bind_group_layout: BindGroupLayout,
    entry_point: String,
}

impl KernelPipeline {
    /// Compile one of the built-in kernels.
    pub async fn new(ctx: &WgpuContext, kernel: Kernel) -> Result<Self> {
        build_pipeline(ctx, KERNELS_WGSL, kernel.entry_point(), &BINDING_LAYOUT).await
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Bind `InputA`, `InputB` and `Output` to slots 0, 1 and 2.
    pub async fn bind(&self, ctx: &WgpuContext, buffers: &OperandBuffers) -> Result<BindGroup> {
        let resources = [&buffers.input_a, &buffers.input_b, &buffers.output];

        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Vecmul Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: BINDING_LAYOUT[0].binding,
                    resource: resources[0].buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_LAYOUT[1].binding,
                    resource: resources[1].buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_LAYOUT[2].binding,
                    resource: resources[2].buffer().as_entire_binding(),
                },
            ],
        });
        if let Some(err) = ctx.device.pop_error_scope().await {
            return Err(Error::Validation(err.to_string()));
        }
        Ok(bind_group)
    }
}

/// Compile `source`, build a bind group layout from `layout` and combine
/// them into a compute pipeline for `entry_point`.
///
/// Any shader or pipeline validation failure is reported as
/// [`Error::KernelCompile`]; nothing partial is returned.
pub async fn build_pipeline(
    ctx: &WgpuContext,
    source: &str,
    entry_point: &str,
    layout: &[BindingSlot],
) -> Result<KernelPipeline> {
    let device = &ctx.device;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Vecmul Kernels"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    });
    if let Some(err) = device.pop_error_scope().await {
        return Err(Error::KernelCompile(err.to_string()));
    }

    let entries: Vec<wgpu::BindGroupLayoutEntry> = layout.iter().map(layout_entry).collect();

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Vecmul Layout"),
        entries: &entries,
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(entry_point),
        layout: Some(
            &device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            }),
        ),
        module: &module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    });
    if let Some(err) = device.pop_error_scope().await {
        return Err(Error::KernelCompile(err.to_string()));
    }

    log::debug!("compiled pipeline for entry point '{}'", entry_point);
    Ok(KernelPipeline {
        pipeline,
        bind_group_layout,
        entry_point: entry_point.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_slots_are_positional() {
        for (i, slot) in BINDING_LAYOUT.iter().enumerate() {
            assert_eq!(slot.binding, i as u32);
        }
        assert_eq!(BINDING_LAYOUT[2].access, Access::ReadWrite);
    }

    #[test]
    fn test_wgsl_declares_every_slot() {
        for slot in BINDING_LAYOUT {
            let access = match slot.access {
                Access::ReadOnly => "read>",
                Access::ReadWrite => "read_write>",
            };
            let decl = KERNELS_WGSL
                .lines()
                .find(|l| l.contains(&format!("@binding({})", slot.binding)))
                .unwrap_or_else(|| panic!("binding {} missing", slot.binding));
            assert!(decl.contains(access), "binding {} access mismatch", slot.binding);
        }
    }

    #[test]
    fn test_entry_points_exist_in_source() {
        for kernel in [Kernel::Multiply, Kernel::EchoFirst] {
            assert!(KERNELS_WGSL.contains(&format!("fn {}(", kernel.entry_point())));
        }
    }

    #[test]
    fn test_layout_entry_visibility() {
        let entry = layout_entry(&BINDING_LAYOUT[0]);
        assert_eq!(entry.visibility, wgpu::ShaderStages::COMPUTE);
        match entry.ty {
            wgpu::BindingType::Buffer { ty, .. } => assert_eq!(
                ty,
                wgpu::BufferBindingType::Storage { read_only: true }
            ),
            _ => panic!("expected buffer binding"),
        }
    }
}
