//! Error types for the vecmul pipeline.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between probing for a GPU and reading results back.
#[derive(Error, Debug)]
pub enum Error {
    /// No usable GPU API on this host.
    #[error("GPU compute is not supported on this host: {0}")]
    Unsupported(String),

    /// The API is present but no physical adapter matched the request.
    #[error("Failed to get GPU adapter")]
    NoAdapter,

    /// The adapter refused to hand out a logical device.
    #[error("Failed to create GPU device: {0}")]
    DeviceInitFailed(#[from] wgpu::RequestDeviceError),

    /// WGSL source failed validation.
    #[error("Kernel compilation failed: {0}")]
    KernelCompile(String),

    /// The two input operands do not hold the same number of elements.
    #[error("Operand length mismatch: a has {a} elements, b has {b} elements")]
    SizeMismatch {
        /// Elements in the first operand.
        a: u32,
        /// Elements in the second operand.
        b: u32,
    },

    /// A buffer would exceed the device's storage binding limit.
    #[error("Buffer of {requested} bytes exceeds device limit of {limit} bytes")]
    BufferTooLarge {
        /// Requested byte size.
        requested: u64,
        /// `max_storage_buffer_binding_size` of the device.
        limit: u64,
    },

    /// The device could not satisfy an allocation.
    #[error("GPU out of memory: {0}")]
    OutOfMemory(String),

    /// The work-group count does not fit in one dispatch dimension.
    #[error("Dispatch of {requested} work-groups exceeds device limit of {limit}")]
    DispatchTooLarge {
        /// Requested work-groups along x.
        requested: u32,
        /// `max_compute_workgroups_per_dimension` of the device.
        limit: u32,
    },

    /// A device call was rejected by wgpu validation.
    #[error("GPU validation error: {0}")]
    Validation(String),

    /// The readback map did not complete in time.
    #[error("Readback did not complete within {0:?}")]
    ReadbackTimeout(Duration),

    /// The device went away while work was in flight.
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    /// `map_async` reported failure.
    #[error("Failed to map readback buffer: {0}")]
    MapFailed(#[from] wgpu::BufferAsyncError),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed or invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Only a timed out readback is worth trying again; everything else is
    /// either a host property or a programming error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ReadbackTimeout(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
