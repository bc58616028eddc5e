//! # vecmul-backend
//!
//! Elementwise multiplication of two `u32` arrays on a GPU via wgpu.
//!
//! One run walks a fixed pipeline: probe for a GPU API, acquire a device,
//! upload both operands, compile and bind the kernel, dispatch a single
//! compute pass, copy the result into a mappable buffer and read it back.
//! Nothing is cached between runs.
//!
//! ```rust,no_run
//! use vecmul_backend::{run_vector_multiply, Outcome, PipelineConfig, WgpuProbe};
//!
//! let config = PipelineConfig::default();
//! let outcome = pollster::block_on(run_vector_multiply(&WgpuProbe, &config, 4)).unwrap();
//! if let Outcome::Completed(values) = outcome {
//!     assert_eq!(values, vec![0, 1, 4, 9]);
//! }
//! ```

pub use wgpu; // Re-export wgpu for downstream crates

pub mod buffer;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod kernel;
pub mod pipeline;
pub mod probe;

pub use buffer::{DeviceBuffer, OperandBuffers};
pub use config::{PipelineConfig, PowerPreference};
pub use context::WgpuContext;
pub use error::{Error, Result};
pub use kernel::{Kernel, KernelPipeline};
pub use pipeline::{
    run_vector_multiply, run_with_fill, run_with_inputs, verify_upload, Outcome, SkipReason,
};
pub use probe::{Capability, CapabilityProbe, NoBackendProbe, UnsupportedProbe, WgpuProbe};
