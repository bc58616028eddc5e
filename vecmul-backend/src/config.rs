//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Adapter power preference as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    #[default]
    HighPerformance,
    LowPower,
    None,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(pref: PowerPreference) -> Self {
        match pref {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::None => wgpu::PowerPreference::None,
        }
    }
}

/// Knobs for device selection and readback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Backend names to enable (`vulkan`, `metal`, `dx12`, `gl`, `webgpu`,
    /// `primary`, `secondary`). Empty means every backend wgpu was built with.
    pub backends: Vec<String>,

    pub power_preference: PowerPreference,

    /// Ask for a software adapter instead of real hardware.
    pub force_fallback_adapter: bool,

    /// Upper bound on waiting for the readback map.
    pub readback_timeout_ms: u64,

    /// Sleep between device polls while waiting on the readback.
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            power_preference: PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            readback_timeout_ms: 5_000,
            poll_interval_ms: 1,
        }
    }
}

impl PipelineConfig {
    /// Load config from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        if self.readback_timeout_ms == 0 {
            return Err(Error::Config("readback_timeout_ms must be non-zero".into()));
        }
        self.wgpu_backends().map(|_| ())
    }

    /// Resolve the backend names into a wgpu backend mask.
    pub fn wgpu_backends(&self) -> Result<wgpu::Backends> {
        if self.backends.is_empty() {
            return Ok(wgpu::Backends::all());
        }
        self.backends
            .iter()
            .try_fold(wgpu::Backends::empty(), |acc, name| {
                parse_backend(name).map(|b| acc | b)
            })
    }

    pub fn readback_timeout(&self) -> Duration {
        Duration::from_millis(self.readback_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_backend(name: &str) -> Result<wgpu::Backends> {
    match name.trim().to_ascii_lowercase().as_str() {
        "vulkan" | "vk" => Ok(wgpu::Backends::VULKAN),
        "metal" | "mtl" => Ok(wgpu::Backends::METAL),
        "dx12" | "d3d12" => Ok(wgpu::Backends::DX12),
        "gl" | "gles" | "opengl" => Ok(wgpu::Backends::GL),
        "webgpu" => Ok(wgpu::Backends::BROWSER_WEBGPU),
        "primary" => Ok(wgpu::Backends::PRIMARY),
        "secondary" => Ok(wgpu::Backends::SECONDARY),
        other => Err(Error::Config(format!("unknown backend '{}'", other))),
    }
}
