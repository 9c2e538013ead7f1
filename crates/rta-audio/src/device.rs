use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

use rta_foundation::AudioError;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    /// Human-readable summary of the device's default input config.
    pub default_config: Option<String>,
}

/// Enumerate input devices on the default host for `--list-devices`.
pub fn list_input_devices() -> Result<Vec<DeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host.input_devices()? {
        let Ok(name) = device.name() else {
            continue;
        };
        let default_config = device.default_input_config().ok().map(|cfg| {
            format!(
                "{} Hz, {} ch, {:?}",
                cfg.sample_rate().0,
                cfg.channels(),
                cfg.sample_format()
            )
        });
        devices.push(DeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            default_config,
        });
    }
    Ok(devices)
}

/// Open the named input device, or the host default when no name is given.
pub fn open_input_device(name: Option<&str>) -> Result<Device, AudioError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                name: Some(wanted.to_string()),
            }),
        None => host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice),
    }
}
