//! Configuration for beamforming sessions
//!
//! - Generic YAML config loading/saving
//! - Default data, config and recording paths
//! - The [`SessionConfig`] describing array, steering and capture
//!
//! # Usage
//!
//! ```ignore
//! use cma_core::config::{default_config_path, load_config, save_config, SessionConfig};
//!
//! let config: SessionConfig = load_config(&default_config_path("session.yaml"));
//! let settings = config.stream_settings()?;
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;
mod session;

pub use io::{load_config, save_config};
pub use paths::{default_config_path, default_data_path, default_recordings_path};
pub use session::SessionConfig;
