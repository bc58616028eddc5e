//! Device acquisition.

use std::sync::{Arc, Mutex};
use wgpu::{Adapter, Device, Instance, Queue};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::probe::{Capability, CapabilityProbe};

/// Everything needed to talk to one GPU: instance, adapter, device and queue.
///
/// Acquired once per pipeline run; dropping it releases the device.
#[derive(Debug)]
pub struct WgpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    lost: Arc<Mutex<Option<String>>>,
}

impl WgpuContext {
    /// Probe for a GPU API, pick an adapter and open a device on it.
    ///
    /// Fails with [`Error::Unsupported`] when the probe finds no API,
    /// [`Error::NoAdapter`] when no adapter matches `config`, and
    /// [`Error::DeviceInitFailed`] when the adapter refuses a device.
    pub async fn acquire(probe: &dyn CapabilityProbe, config: &PipelineConfig) -> Result<Self> {
        let instance = match probe.probe(config) {
            Capability::Available(instance) => instance,
            Capability::Unsupported(reason) => return Err(Error::Unsupported(reason)),
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference.into(),
                force_fallback_adapter: config.force_fallback_adapter,
                compatible_surface: None,
            })
            .await
            .ok_or(Error::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Vecmul Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            log::error!("uncaptured GPU error: {}", err);
        }));

        let lost = Arc::new(Mutex::new(None));
        let lost_slot = lost.clone();
        device.set_device_lost_callback(move |reason: wgpu::DeviceLostReason, msg: String| {
            // Destroyed is what an orderly drop of the context reports.
            let level = match reason {
                wgpu::DeviceLostReason::Destroyed => log::Level::Debug,
                _ => log::Level::Error,
            };
            log::log!(level, "device lost ({:?}): {}", reason, msg);
            if let Ok(mut slot) = lost_slot.lock() {
                *slot = Some(format!("{:?}: {}", reason, msg));
            }
        });

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            lost,
        })
    }

    pub fn adapter_info(&self) -> String {
        let info = self.adapter.get_info();
        format!("{} ({:?})", info.name, info.backend)
    }

    /// The device-lost message, if the device has gone away.
    pub fn lost_reason(&self) -> Option<String> {
        self.lost.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }
}
