//! Audio host configuration
//!
//! Device selection and buffer settings for a capture session. The array
//! geometry and the processing parameters live in
//! [`SessionConfig`](crate::config::SessionConfig); this part only says which
//! interface to talk to.

use serde::{Deserialize, Serialize};

/// Preferred device buffer size
///
/// Independent from the processing block size: device buffers are regrouped
/// into processing blocks by the
/// [`BlockAssembler`](crate::stream::BlockAssembler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the system choose the default buffer size
    #[default]
    Default,
    /// Request a specific buffer size in frames (may be adjusted by the system)
    Fixed(u32),
}

impl BufferSize {
    /// Get the buffer size in frames, or None for system default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some(*frames),
        }
    }

    /// Calculate latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.as_frames()
            .map(|frames| (frames as f32 / sample_rate as f32) * 1000.0)
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (JACK, ALSA, etc.)
/// This allows selecting devices from different hosts on systems with multiple
/// audio backends available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "JACK", "ALSA", "CoreAudio")
    /// If None, every host is searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio host
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture device carrying the array channels (None = system default)
    pub input_device: Option<DeviceId>,

    /// Monitor output for the steered signal (None = system default)
    pub output_device: Option<DeviceId>,

    /// Play the steered signal while capturing
    /// When disabled, only the input stream is opened.
    pub monitor: bool,

    /// Preferred device buffer size
    pub buffer_size: BufferSize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_latency() {
        assert_eq!(BufferSize::Default.latency_ms(48000), None);
        assert_eq!(BufferSize::Fixed(480).latency_ms(48000), Some(10.0));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: AudioConfig =
            serde_yaml::from_str("output_device:\n  name: hw:1\n  host: ALSA\nmonitor: true\n")
                .unwrap();
        assert!(config.monitor);
        assert_eq!(config.input_device, None);
        assert_eq!(config.buffer_size, BufferSize::Default);
        assert_eq!(
            config.output_device.map(|d| d.display_label()),
            Some("[ALSA] hw:1".to_string())
        );
    }
}
