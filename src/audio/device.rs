//! Audio input device selection and enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use crate::error::AudioError;

/// Name fragments that indicate a device captures the host's output mix
/// rather than a microphone. "monitor" covers PulseAudio/PipeWire loopback
/// sources.
const LOOPBACK_HINTS: [&str; 6] = [
    "loopback",
    "stereo mix",
    "what u hear",
    "wasapi",
    "system",
    "monitor",
];

/// Case-insensitive check against the loopback keyword set
pub fn looks_like_loopback(name: &str) -> bool {
    let name = name.to_lowercase();
    LOOPBACK_HINTS.iter().any(|hint| name.contains(hint))
}

/// Wrapper around a selected cpal input device
pub struct AudioDevice {
    inner: cpal::Device,
    pub name: String,
}

impl AudioDevice {
    fn from_cpal(device: cpal::Device) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Self {
            inner: device,
            name,
        }
    }

    pub fn into_inner(self) -> cpal::Device {
        self.inner
    }

    pub fn default_input_config(&self) -> Result<cpal::SupportedStreamConfig, AudioError> {
        self.inner
            .default_input_config()
            .map_err(|e| AudioError::StreamOpen(e.to_string()))
    }
}

/// How the sampler picks its input device
#[derive(Debug, Clone)]
pub enum DeviceStrategy {
    /// Prefer a loopback-capable device, fall back to the default input
    SystemLoopback,
    /// Exact device name, no fallback
    Named(String),
    /// Platform default input
    DefaultInput,
}

impl DeviceStrategy {
    pub fn from_override(name: Option<&str>) -> Self {
        match name {
            Some(name) => Self::Named(name.to_string()),
            None => Self::SystemLoopback,
        }
    }

    pub fn select(&self) -> Result<AudioDevice, AudioError> {
        let host = cpal::default_host();
        match self {
            Self::Named(wanted) => {
                let devices = host
                    .input_devices()
                    .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;
                for device in devices {
                    if device.name().is_ok_and(|name| name == *wanted) {
                        return Ok(AudioDevice::from_cpal(device));
                    }
                }
                Err(AudioError::DeviceNotFound(wanted.clone()))
            }
            Self::SystemLoopback => {
                if let Ok(devices) = host.input_devices() {
                    for device in devices {
                        if let Ok(name) = device.name() {
                            if looks_like_loopback(&name) {
                                tracing::info!(device = %name, "selected loopback-capable input");
                                return Ok(AudioDevice::from_cpal(device));
                            }
                        }
                    }
                }
                tracing::info!("no loopback-capable input found, using default input");
                Self::DefaultInput.select()
            }
            Self::DefaultInput => host
                .default_input_device()
                .map(AudioDevice::from_cpal)
                .ok_or_else(|| AudioError::DeviceNotFound("no default input device".to_string())),
        }
    }
}

/// Diagnostics view of one input device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub loopback_candidate: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// Enumerate input devices for the startup log and the diagnostics endpoint
pub fn list_devices() -> Vec<DeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                let (sample_rates, channels) = device_capabilities(&device);
                devices.push(DeviceInfo {
                    is_default: default_name.as_ref() == Some(&name),
                    loopback_candidate: looks_like_loopback(&name),
                    name,
                    sample_rates,
                    channels,
                });
            }
        }
    }
    devices
}

fn device_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_input_configs() {
        for config in configs {
            for rate in [44_100u32, 48_000, 88_200, 96_000, 176_400, 192_000] {
                let rate = cpal::SampleRate(rate);
                if rate >= config.min_sample_rate()
                    && rate <= config.max_sample_rate()
                    && !sample_rates.contains(&rate.0)
                {
                    sample_rates.push(rate.0);
                }
            }
            if !channels.contains(&config.channels()) {
                channels.push(config.channels());
            }
        }
    }

    sample_rates.sort_unstable();
    channels.sort_unstable();
    (sample_rates, channels)
}
