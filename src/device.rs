//! Device selection and enumeration on the default cpal host

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use crate::error::{AudioError, Result};

/// Audio device information
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: u32,
}

/// One line per device for diagnostics.
fn format_device(info: &DeviceInfo) -> String {
    format!(
        "  {:2}: {}{} [in {}ch, out {}ch, {} Hz]",
        info.index,
        info.name,
        if info.is_default { " (default)" } else { "" },
        info.max_input_channels,
        info.max_output_channels,
        info.default_sample_rate
    )
}

/// List every device on the default host with its input/output capability.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for (index, device) in host
        .devices()
        .map_err(|e| AudioError::device(format!("Failed to enumerate devices: {}", e)))?
        .enumerate()
    {
        let name = device
            .name()
            .unwrap_or_else(|_| format!("Unknown Device {}", index));

        let input = device.default_input_config().ok();
        let output = device.default_output_config().ok();

        devices.push(DeviceInfo {
            index,
            is_default: default_input.as_deref() == Some(name.as_str())
                || default_output.as_deref() == Some(name.as_str()),
            max_input_channels: input.as_ref().map(|c| c.channels()).unwrap_or(0),
            max_output_channels: output.as_ref().map(|c| c.channels()).unwrap_or(0),
            default_sample_rate: input
                .or(output)
                .map(|c| c.sample_rate().0)
                .unwrap_or(0),
            name,
        });
    }

    Ok(devices)
}

/// Print the device list.
pub fn print_devices() -> Result<()> {
    println!("Available audio devices:");
    for device in list_devices()? {
        println!("{}", format_device(&device));
    }
    Ok(())
}

/// Best-effort device dump when selection fails, so the diagnostic that
/// follows has something to point at.
fn dump_devices() {
    let _ = print_devices();
}

/// Select an input device: by index into the host's input list, or the
/// default input device.
pub fn select_input_device(host: &Host, index: Option<usize>) -> Result<Device> {
    match index {
        Some(index) => {
            let mut devices = host
                .input_devices()
                .map_err(|e| AudioError::device(format!("Failed to enumerate devices: {}", e)))?;
            devices.nth(index).ok_or_else(|| {
                dump_devices();
                AudioError::device(format!("Device index {} not found", index))
            })
        }
        None => host.default_input_device().ok_or_else(|| {
            dump_devices();
            AudioError::device("No default input device found")
        }),
    }
}

/// Select an output device: by index into the host's output list, or the
/// default output device.
pub fn select_output_device(host: &Host, index: Option<usize>) -> Result<Device> {
    match index {
        Some(index) => {
            let mut devices = host
                .output_devices()
                .map_err(|e| AudioError::device(format!("Failed to enumerate devices: {}", e)))?;
            devices.nth(index).ok_or_else(|| {
                dump_devices();
                AudioError::device(format!("Device index {} not found", index))
            })
        }
        None => host.default_output_device().ok_or_else(|| {
            dump_devices();
            AudioError::device("No default output device found")
        }),
    }
}

/// Frames per device period for a period length in milliseconds, with a
/// floor of one frame so tiny periods at low rates stay valid.
pub fn period_frames(sample_rate: u32, period_ms: u32) -> u32 {
    (sample_rate * period_ms / 1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_device() {
        let info = DeviceInfo {
            index: 3,
            name: "USB Mic".to_string(),
            is_default: true,
            max_input_channels: 1,
            max_output_channels: 0,
            default_sample_rate: 44100,
        };
        assert_eq!(
            format_device(&info),
            "   3: USB Mic (default) [in 1ch, out 0ch, 44100 Hz]"
        );

        let info = DeviceInfo {
            index: 0,
            name: "Speakers".to_string(),
            is_default: false,
            max_input_channels: 0,
            max_output_channels: 2,
            default_sample_rate: 48000,
        };
        assert_eq!(
            format_device(&info),
            "   0: Speakers [in 0ch, out 2ch, 48000 Hz]"
        );
    }

    // Needs an audio host with at least the default devices.
    #[test]
    #[ignore]
    fn test_list_and_print_devices() {
        let devices = list_devices().unwrap();
        for device in &devices {
            println!("{}", format_device(device));
        }
        print_devices().unwrap();
    }

    #[test]
    fn test_period_frames() {
        assert_eq!(period_frames(48000, 4), 192);
        assert_eq!(period_frames(48000, 2), 96);
        assert_eq!(period_frames(44100, 10), 441);
        // Never zero, even for degenerate inputs.
        assert_eq!(period_frames(8000, 0), 1);
    }
}
