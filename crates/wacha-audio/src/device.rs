//! Device selection. One microphone, one speaker; names come from config
//! and fall back to the host defaults.

use cpal::traits::{DeviceTrait, HostTrait};
use wacha_foundation::AudioError;

pub fn input_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .input_devices()
            .map_err(|e| AudioError::Fatal(format!("Cannot enumerate input devices: {}", e)))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or(AudioError::InputDeviceNotFound {
                name: Some(wanted.to_string()),
            }),
        None => host
            .default_input_device()
            .ok_or(AudioError::InputDeviceNotFound { name: None }),
    }
}

pub fn output_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .output_devices()
            .map_err(|e| AudioError::Fatal(format!("Cannot enumerate output devices: {}", e)))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or(AudioError::OutputDeviceNotFound {
                name: Some(wanted.to_string()),
            }),
        None => host
            .default_output_device()
            .ok_or(AudioError::OutputDeviceNotFound { name: None }),
    }
}

/// Input and output device names, for `--list-devices`.
pub fn device_names() -> (Vec<String>, Vec<String>) {
    let host = cpal::default_host();
    let inputs = host
        .input_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default();
    let outputs = host
        .output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default();
    (inputs, outputs)
}
