//! Live audio I/O for the array
//!
//! Captures the microphone channels through CPAL, steers them with a
//! [`StreamProcessor`](crate::stream::StreamProcessor) inside the input
//! callback and optionally monitors the result on an output device.
//!
//! # Example Usage
//!
//! ```ignore
//! use cma_core::audio::{start_session, AudioConfig};
//!
//! let settings = session_config.stream_settings()?;
//! let session = start_session(&AudioConfig::default(), &settings, duration)?;
//! session.wait(duration);
//! let recordings = session.finish()?;
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DeviceId};
pub use cpal_backend::{start_session, SessionHandle};
pub use device::{find_device, get_devices, resolve_device, AudioDevice, Direction};
pub use error::{AudioError, AudioResult};
