use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{CHIP_ID_HIGH, FACTORY_CONFIG, FIRMWARE_VERSIONS};
use crate::error::ConfigError;

/// Per-step deadlines, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepTimeouts {
    /// Acknowledgement wait for every send.
    pub ack_ms: u64,
    pub ping_ms: u64,
    pub firmware_ms: u64,
    pub enable_ms: u64,
    pub otp_ms: u64,
    pub psk_read_ms: u64,
    pub psk_write_ms: u64,
    pub config_ms: u64,
    pub fdt_ms: u64,
    pub image_ms: u64,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            ack_ms: 500,
            ping_ms: 500,
            firmware_ms: 2000,
            enable_ms: 200,
            otp_ms: 200,
            psk_read_ms: 1000,
            psk_write_ms: 1000,
            config_ms: 500,
            fdt_ms: 500,
            image_ms: 1000,
        }
    }
}

impl StepTimeouts {
    pub fn ack(&self) -> Duration {
        Duration::from_millis(self.ack_ms)
    }
}

/// Tunables for one bring-up run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BringupConfig {
    pub timeouts: StepTimeouts,
    /// Firmware version strings accepted by the firmware check.
    pub accepted_firmware: Vec<String>,
    /// Expected value of `chip_id >> 8`.
    pub chip_id_high: u32,
    /// Configuration blob uploaded before baseline capture.
    pub factory_config: Vec<u8>,
    /// Replaces the OTP-derived image threshold when set.
    pub image_threshold_override: Option<u32>,
}

impl Default for BringupConfig {
    fn default() -> Self {
        Self {
            timeouts: StepTimeouts::default(),
            accepted_firmware: FIRMWARE_VERSIONS.iter().map(|v| v.to_string()).collect(),
            chip_id_high: CHIP_ID_HIGH,
            factory_config: FACTORY_CONFIG.to_vec(),
            image_threshold_override: None,
        }
    }
}

impl BringupConfig {
    /// Load a config from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn accepts_firmware(&self, version: &str) -> bool {
        self.accepted_firmware.iter().any(|v| v == version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = BringupConfig::default();
        assert!(config.accepts_firmware("GF5288_HTSEC_APP_10011"));
        assert!(config.accepts_firmware("GF5288_HTSEC_APP_10020"));
        assert!(!config.accepts_firmware("GF5288_HTSEC_APP_10012"));
        assert_eq!(config.chip_id_high, 0x220C);
        assert_eq!(config.timeouts.firmware_ms, 2000);
        assert_eq!(config.timeouts.enable_ms, 200);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: BringupConfig =
            serde_json::from_str(r#"{"timeouts":{"firmware_ms":50},"image_threshold_override":12}"#)
                .unwrap();
        assert_eq!(config.timeouts.firmware_ms, 50);
        assert_eq!(config.timeouts.otp_ms, 200);
        assert_eq!(config.image_threshold_override, Some(12));
        assert_eq!(config.accepted_firmware.len(), 2);
    }

    #[test]
    fn factory_config_is_replaceable() {
        let config: BringupConfig =
            serde_json::from_str(r#"{"factory_config":[1,2,3,4,5,6]}"#).unwrap();
        assert_eq!(config.factory_config, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(BringupConfig::default().factory_config, FACTORY_CONFIG.to_vec());
    }

    #[test]
    fn from_json_file_reports_path() {
        let dir = std::env::temp_dir().join(format!("fpsensor-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bringup.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = BringupConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bringup.json"));

        let missing = BringupConfig::from_json_file(dir.join("absent.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
