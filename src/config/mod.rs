//! Configuration module
//!
//! Handles loading and validating the relay configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::dma::DEFAULT_DEVICE_PATH;
use crate::transfer::{TransferLimits, MAX_CHUNK_TRANSFER, MAX_TOTAL_TRANSFER};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// DMA device settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Transfer size limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

/// DMA device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device node of the XDMA driver
    #[serde(default = "default_device_path")]
    pub path: PathBuf,
    /// Length of the mapped scratch buffer
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_device_path() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE_PATH)
}

fn default_buffer_size() -> usize {
    MAX_CHUNK_TRANSFER
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: default_device_path(),
            buffer_size: default_buffer_size(),
        }
    }
}

/// Transfer limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest single DMA transfer, and the largest accepted write
    #[serde(default = "default_max_chunk_transfer")]
    pub max_chunk_transfer: usize,
    /// Largest accepted read
    #[serde(default = "default_max_total_transfer")]
    pub max_total_transfer: usize,
    /// Reject transfer lengths that are not a multiple of 16 bytes instead
    /// of passing them on to the driver
    #[serde(default)]
    pub enforce_alignment: bool,
}

fn default_max_chunk_transfer() -> usize {
    MAX_CHUNK_TRANSFER
}

fn default_max_total_transfer() -> usize {
    MAX_TOTAL_TRANSFER
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_chunk_transfer: default_max_chunk_transfer(),
            max_total_transfer: default_max_total_transfer(),
            enforce_alignment: false,
        }
    }
}

impl LimitsConfig {
    pub fn transfer_limits(&self) -> TransferLimits {
        TransferLimits {
            max_chunk: self.max_chunk_transfer,
            max_total: self.max_total_transfer,
            enforce_alignment: self.enforce_alignment,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address to bind to (default: IPv6 wildcard)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V6(Ipv6Addr::UNSPECIFIED)
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl NetworkConfig {
    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_address, port)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("xdma-relay/config.toml")),
            Some(PathBuf::from("./xdma-relay.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Check that the limits fit the mapped buffer
    pub fn validate(&self) -> ConfigResult<()> {
        let limits = &self.limits;

        if limits.max_chunk_transfer == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_chunk_transfer must be non-zero".to_string(),
            ));
        }
        if limits.max_chunk_transfer > self.device.buffer_size {
            return Err(ConfigError::Invalid(format!(
                "limits.max_chunk_transfer ({}) exceeds device.buffer_size ({})",
                limits.max_chunk_transfer, self.device.buffer_size
            )));
        }
        if limits.max_total_transfer < limits.max_chunk_transfer {
            return Err(ConfigError::Invalid(format!(
                "limits.max_total_transfer ({}) is below limits.max_chunk_transfer ({})",
                limits.max_total_transfer, limits.max_chunk_transfer
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.path, PathBuf::from("/dev/xdma"));
        assert_eq!(config.device.buffer_size, 8 * 1024 * 1024);
        assert_eq!(config.limits.transfer_limits(), TransferLimits::default());
        assert_eq!(
            config.network.socket_addr(1337).to_string(),
            "[::]:1337"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[device]
path = "/dev/xdma1"

[limits]
max_total_transfer = 16777216
enforce_alignment = true

[network]
bind_address = "127.0.0.1"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.device.path, PathBuf::from("/dev/xdma1"));
        assert_eq!(config.device.buffer_size, MAX_CHUNK_TRANSFER);
        assert_eq!(config.limits.max_chunk_transfer, MAX_CHUNK_TRANSFER);
        assert_eq!(config.limits.max_total_transfer, 16 * 1024 * 1024);
        assert!(config.limits.enforce_alignment);
        assert_eq!(config.network.socket_addr(80).to_string(), "127.0.0.1:80");
        assert!(!config.general.verbose);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(Config::load(&path), Err(ConfigError::NotFound(p)) if p == path));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmax_chunk_transfer = \"lots\"").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_limits() {
        let mut config = Config::default();
        config.limits.max_chunk_transfer = 16 * 1024 * 1024;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.limits.max_total_transfer = 1024;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.limits.max_chunk_transfer = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.device.buffer_size = 16 * 1024 * 1024;
        config.limits.max_chunk_transfer = 16 * 1024 * 1024;
        assert!(config.validate().is_ok());
    }
}
