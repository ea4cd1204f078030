//! Configuration loading and the remembered-radio file

use anyhow::Result;
use meshport_core::LinkConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

fn state_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("meshport"))
}

/// BLE address of the last radio we connected to, if remembered.
pub fn remembered_ble_address() -> Option<String> {
    let path = state_dir()?.join("default_address");
    let address = std::fs::read_to_string(path).ok()?;
    let address = address.trim();
    if address.is_empty() {
        None
    } else {
        Some(address.to_string())
    }
}

/// Remember a BLE address for the next unattended start. Failures are
/// logged and swallowed; a read-only home directory must not break the
/// session that just connected.
pub fn remember_ble_address(address: &str) {
    let Some(dir) = state_dir() else {
        return;
    };
    let result = std::fs::create_dir_all(&dir)
        .and_then(|_| std::fs::write(dir.join("default_address"), format!("{address}\n")));
    if let Err(err) = result {
        debug!(error = %err, "Could not persist default BLE address");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_link_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.link.identify_timeout_ms, 5000);
        assert_eq!(config.link.identify_retries, 2);
        assert_eq!(config.link.baudrate, 115200);
    }

    #[test]
    fn test_partial_link_section_overrides() {
        let config: Config = toml::from_str("[link]\nbaudrate = 921600\n").unwrap();
        assert_eq!(config.link.baudrate, 921600);
        assert_eq!(config.link.identify_retries, 2);
    }

    #[test]
    fn test_default_config_round_trips() {
        let content = toml::to_string_pretty(&Config::default()).unwrap();
        let config: Config = toml::from_str(&content).unwrap();
        assert_eq!(config.link.identify_timeout_ms, 5000);
    }
}
