//! Capability probing.
//!
//! Whether the host can run GPU compute at all is decided here, before any
//! adapter is requested. Device acquisition takes the probe as a parameter so
//! tests can substitute a fake that reports whatever they need.

use wgpu::Instance;

use crate::config::PipelineConfig;

/// Result of probing the host for a GPU API.
#[derive(Debug)]
pub enum Capability {
    /// A usable instance; adapter selection happens next.
    Available(Instance),
    /// The API is absent; carries a human readable reason.
    Unsupported(String),
}

pub trait CapabilityProbe {
    fn probe(&self, config: &PipelineConfig) -> Capability;
}

/// Probes the real wgpu runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct WgpuProbe;

impl CapabilityProbe for WgpuProbe {
    fn probe(&self, config: &PipelineConfig) -> Capability {
        let backends = match config.wgpu_backends() {
            Ok(b) if !b.is_empty() => b,
            Ok(_) => return Capability::Unsupported("no backends enabled".into()),
            Err(e) => return Capability::Unsupported(e.to_string()),
        };

        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        // An instance with zero adapters on every backend means no driver is
        // installed, which is different from "nothing matched the request".
        #[cfg(not(target_arch = "wasm32"))]
        {
            let adapters = instance.enumerate_adapters(backends);
            if adapters.is_empty() {
                return Capability::Unsupported(format!(
                    "no adapters exposed by backends {:?}",
                    backends
                ));
            }
            log::debug!("probe found {} adapter(s)", adapters.len());
        }

        Capability::Available(instance)
    }
}

/// Reports the host as unsupported unconditionally.
#[derive(Debug, Clone)]
pub struct UnsupportedProbe {
    pub reason: String,
}

impl CapabilityProbe for UnsupportedProbe {
    fn probe(&self, _config: &PipelineConfig) -> Capability {
        Capability::Unsupported(self.reason.clone())
    }
}

/// Hands out an instance with no backends, so adapter selection always
/// comes back empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackendProbe;

impl CapabilityProbe for NoBackendProbe {
    fn probe(&self, _config: &PipelineConfig) -> Capability {
        Capability::Available(Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::empty(),
            ..Default::default()
        }))
    }
}
