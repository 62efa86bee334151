//! Audio device enumeration and lookup
//!
//! Devices are enumerated from ALL available audio hosts (JACK, ALSA,
//! PulseAudio, etc.). Multichannel capture interfaces are frequently only
//! visible through one of them, e.g. as an ALSA `hw:` device while the
//! desktop routes through PulseAudio.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, HostId, SupportedStreamConfigRange};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Sample rates reported for a device when they fall within its ranges
const COMMON_SAMPLE_RATES: [u32; 6] = [44100, 48000, 88200, 96000, 176400, 192000];

/// Stream direction of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Get a human-readable name for a host ID
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// Get a host by its name string
fn get_host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|&host_id| host_name(host_id) == name)
        .and_then(|host_id| cpal::host_from_id(host_id).ok())
}

fn host_devices(host: &Host, direction: Direction) -> Option<Vec<Device>> {
    let devices = match direction {
        Direction::Input => host.input_devices().map(|d| d.collect::<Vec<_>>()),
        Direction::Output => host.output_devices().map(|d| d.collect::<Vec<_>>()),
    };
    match devices {
        Ok(devices) => Some(devices),
        Err(e) => {
            log::debug!("Could not enumerate {:?} devices: {}", direction, e);
            None
        }
    }
}

fn default_host_device(host: &Host, direction: Direction) -> Option<Device> {
    match direction {
        Direction::Input => host.default_input_device(),
        Direction::Output => host.default_output_device(),
    }
}

/// Supported stream configurations of a device in one direction
pub(crate) fn supported_configs(
    device: &Device,
    direction: Direction,
) -> AudioResult<Vec<SupportedStreamConfigRange>> {
    let configs = match direction {
        Direction::Input => device
            .supported_input_configs()
            .map(|c| c.collect::<Vec<_>>()),
        Direction::Output => device
            .supported_output_configs()
            .map(|c| c.collect::<Vec<_>>()),
    };
    configs.map_err(|e| AudioError::ConfigError(e.to_string()))
}

/// Information about an audio device
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Device identifier for configuration (includes host info)
    pub id: DeviceId,
    /// Human-readable device name
    pub name: String,
    /// Host backend name (e.g., "ALSA", "JACK")
    pub host: String,
    /// Whether this is the system default device for its host
    pub is_default: bool,
    /// Supported sample rates (common ones)
    pub sample_rates: Vec<u32>,
    /// Maximum channels in this direction
    pub max_channels: u16,
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show host prefix for clarity, e.g., "[ALSA] hw:0,0"
        write!(f, "[{}] {}", self.host, self.name)
    }
}

/// Get all devices for `direction` from ALL hosts
pub fn get_devices(direction: Direction) -> AudioResult<Vec<AudioDevice>> {
    let mut all_devices: Vec<AudioDevice> = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };

        let host_name_str = host_name(host_id);
        let default_device_name =
            default_host_device(&host, direction).and_then(|d| d.name().ok());

        let Some(devices) = host_devices(&host, direction) else {
            continue;
        };

        for device in devices {
            let name = match device.name() {
                Ok(n) => n,
                Err(_) => continue,
            };

            let configs = match supported_configs(&device, direction) {
                Ok(c) if !c.is_empty() => c,
                _ => continue,
            };

            let mut sample_rates: Vec<u32> = Vec::new();
            let mut max_channels: u16 = 0;
            for config in &configs {
                max_channels = max_channels.max(config.channels());
                for rate in COMMON_SAMPLE_RATES {
                    if rate >= config.min_sample_rate().0
                        && rate <= config.max_sample_rate().0
                        && !sample_rates.contains(&rate)
                    {
                        sample_rates.push(rate);
                    }
                }
            }
            sample_rates.sort();

            all_devices.push(AudioDevice {
                id: DeviceId::with_host(&name, &host_name_str),
                is_default: default_device_name.as_ref() == Some(&name),
                name,
                host: host_name_str.clone(),
                sample_rates,
                max_channels,
            });
        }
    }

    if all_devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    // Sort: default devices first, then by host, then by name
    all_devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.name.cmp(&b.name))
    });

    log::info!(
        "Enumerated {} {:?} devices from {} hosts",
        all_devices.len(),
        direction,
        cpal::available_hosts().len()
    );

    Ok(all_devices)
}

/// Find a device by its ID
///
/// Uses the host specified in the DeviceId if available, otherwise
/// searches all available hosts.
pub fn find_device(id: &DeviceId, direction: Direction) -> AudioResult<Device> {
    let matches = |d: &Device| d.name().ok().as_ref() == Some(&id.name);

    if let Some(host) = id.host.as_deref().and_then(get_host_by_name) {
        return host_devices(&host, direction)
            .and_then(|devices| devices.into_iter().find(matches))
            .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
    }

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        if let Some(device) =
            host_devices(&host, direction).and_then(|devices| devices.into_iter().find(matches))
        {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(id.display_label()))
}

/// Resolve a configured device, falling back to the default host's default
pub fn resolve_device(id: Option<&DeviceId>, direction: Direction) -> AudioResult<Device> {
    match id {
        Some(id) => find_device(id, direction),
        None => default_host_device(&cpal::default_host(), direction).ok_or_else(|| {
            AudioError::NoDefaultDevice(format!("No default {:?} device", direction))
        }),
    }
}
