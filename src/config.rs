//! Configuration for the Launchpad gateway
//!
//! Loads and validates the YAML file describing which Launchpads to drive
//! and how they combine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::fs;

use crate::combination::CombineFlags;
use crate::launchpad::address::DeviceVariant;
use crate::launchpad::handshake::Challenge;
use crate::launchpad::selector::DEFAULT_SESSION_WIDTH;
use crate::launchpad::DEFAULT_PROBE_DELAY_TICKS;

/// Widest session box a single surface may claim
pub const MAX_SESSION_WIDTH: u32 = 64;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub combine: CombineFlags,
    #[serde(default)]
    pub handshake: HandshakeConfig,
    pub devices: Vec<DeviceConfig>,
}

/// Activation timing and challenge/response setup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandshakeConfig {
    #[serde(default = "default_probe_delay_ticks")]
    pub probe_delay_ticks: u64,
    /// Wall-clock length of one scheduler tick
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Pin the challenge instead of drawing one (bench use)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_challenge: Option<u32>,
    /// CSV of `challenge,response` pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_table: Option<String>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            probe_delay_ticks: default_probe_delay_ticks(),
            tick_ms: default_tick_ms(),
            fixed_challenge: None,
            response_table: None,
        }
    }
}

impl HandshakeConfig {
    /// Pinned challenge after masking to 7-bit bytes
    pub fn fixed_challenge(&self) -> Option<Challenge> {
        self.fixed_challenge.map(Challenge::from_raw)
    }
}

/// One physical Launchpad
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub name: String,
    pub variant: DeviceVariant,
    /// Port name pattern; the variant's suggested names when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,
    #[serde(default = "default_session_width")]
    pub session_width: u32,
    #[serde(default)]
    pub device_component: bool,
}

impl DeviceConfig {
    /// Patterns to try when looking for the input port
    pub fn input_patterns(&self) -> Vec<String> {
        Self::patterns(self.input_port.as_deref(), self.variant)
    }

    /// Patterns to try when looking for the output port
    pub fn output_patterns(&self) -> Vec<String> {
        Self::patterns(self.output_port.as_deref(), self.variant)
    }

    fn patterns(configured: Option<&str>, variant: DeviceVariant) -> Vec<String> {
        match configured {
            Some(port) => vec![port.to_string()],
            None => variant
                .suggested_ports()
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

fn default_probe_delay_ticks() -> u64 {
    DEFAULT_PROBE_DELAY_TICKS
}

fn default_tick_ms() -> u64 {
    100
}

fn default_session_width() -> u32 {
    DEFAULT_SESSION_WIDTH
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path))?;

        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            anyhow::bail!("At least one device must be defined");
        }

        if self.handshake.tick_ms == 0 {
            anyhow::bail!("handshake.tick_ms must be greater than 0");
        }

        let mut names = HashSet::new();
        for (idx, device) in self.devices.iter().enumerate() {
            if device.name.is_empty() {
                anyhow::bail!("Device {} name cannot be empty", idx);
            }
            if !names.insert(device.name.as_str()) {
                anyhow::bail!("Device name '{}' is used more than once", device.name);
            }
            if device.session_width == 0 || device.session_width > MAX_SESSION_WIDTH {
                anyhow::bail!(
                    "Device '{}' has invalid session_width {} (must be 1-{})",
                    device.name,
                    device.session_width,
                    MAX_SESSION_WIDTH
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
devices:
  - name: left
    variant: mk2
"#;

    #[test]
    fn test_defaults_apply() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();

        assert_eq!(config.combine, CombineFlags::default());
        assert_eq!(config.handshake.probe_delay_ticks, 5);
        assert_eq!(config.handshake.tick_ms, 100);
        assert!(config.handshake.fixed_challenge().is_none());

        let device = &config.devices[0];
        assert_eq!(device.variant, DeviceVariant::Mk2Rgb);
        assert_eq!(device.session_width, 8);
        assert!(!device.device_component);
        assert_eq!(device.output_patterns(), vec!["Launchpad MK2".to_string()]);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
combine:
  enabled: true
  session_link: true
  stepseq_link: false
handshake:
  probe_delay_ticks: 3
  tick_ms: 50
  fixed_challenge: 0x12345678
  response_table: responses.csv
devices:
  - name: left
    variant: classic
    input_port: "Launchpad S"
    session_width: 4
    device_component: true
  - name: right
    variant: mk2
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();

        assert!(!config.combine.stepseq_link);
        assert_eq!(config.handshake.probe_delay_ticks, 3);
        assert_eq!(
            config.handshake.fixed_challenge().map(|c| c.value()),
            Some(0x1234_5678)
        );
        assert_eq!(config.devices[0].input_patterns(), vec!["Launchpad S".to_string()]);
        assert_eq!(config.devices[0].output_patterns().len(), 3);
        assert_eq!(config.devices[1].session_width, 8);
    }

    #[test]
    fn test_fixed_challenge_is_masked() {
        let yaml = r#"
handshake:
  fixed_challenge: 0xFFFFFFFF
devices:
  - name: left
    variant: mk2
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.handshake.fixed_challenge().map(|c| c.value()),
            Some(0x7F7F_7F7F)
        );
    }

    #[test]
    fn test_validation_failures() {
        let no_devices = "devices: []\n";
        assert!(AppConfig::from_yaml(no_devices).is_err());

        let duplicate = r#"
devices:
  - name: pad
    variant: mk2
  - name: pad
    variant: classic
"#;
        assert!(AppConfig::from_yaml(duplicate).is_err());

        let empty_name = r#"
devices:
  - name: ""
    variant: mk2
"#;
        assert!(AppConfig::from_yaml(empty_name).is_err());

        let zero_width = r#"
devices:
  - name: pad
    variant: mk2
    session_width: 0
"#;
        assert!(AppConfig::from_yaml(zero_width).is_err());

        let zero_tick = r#"
handshake:
  tick_ms: 0
devices:
  - name: pad
    variant: mk2
"#;
        assert!(AppConfig::from_yaml(zero_tick).is_err());

        let bad_variant = r#"
devices:
  - name: pad
    variant: mk3
"#;
        assert!(AppConfig::from_yaml(bad_variant).is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.devices[0].name, "left");
    }

    #[tokio::test]
    async fn test_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");

        let err = AppConfig::load(path.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
