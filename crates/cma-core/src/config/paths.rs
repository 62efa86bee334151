//! Standard locations for configuration and recordings

use std::path::PathBuf;

/// Get the default data directory
///
/// Returns: `~/cma-beamformer`
pub fn default_data_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cma-beamformer")
}

/// Get the default config file path
///
/// # Arguments
/// * `filename` - Config file name (e.g., "session.yaml")
///
/// Returns: `~/cma-beamformer/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_data_path().join(filename)
}

/// Where session recordings go unless configured otherwise
///
/// Returns: `~/cma-beamformer/recordings`
pub fn default_recordings_path() -> PathBuf {
    default_data_path().join("recordings")
}
